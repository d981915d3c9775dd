pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use handlers::AppState;

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .route("/health", get(handlers::health::liveness))
        .route("/ready", get(handlers::health::readiness))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
