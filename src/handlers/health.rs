use axum::{extract::State, response::Json};
use serde_json::json;

use crate::{errors::Result, handlers::AppState};

pub async fn liveness() -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Always 200; `status` turns `ready` once usage and buckets have been polled.
pub async fn readiness(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let usage = state.store.usage().is_populated();
    let buckets = state.store.buckets().is_populated();
    let users = state.store.users().is_populated();

    let overall_status = if usage && buckets { "ready" } else { "not_ready" };

    Ok(Json(json!({
        "status": overall_status,
        "checks": {
            "usage": usage,
            "buckets": buckets,
            "users": users
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
