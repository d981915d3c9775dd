use prometheus::Registry;
use std::sync::Arc;

use crate::services::SnapshotStore;

pub mod health;
pub mod metrics;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub registry: Arc<Registry>,
}
