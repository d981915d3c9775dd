pub mod admin_client;
pub mod aggregator;
pub mod enricher;
pub mod metrics;
pub mod poller;
pub mod snapshot_store;

pub use admin_client::*;
pub use aggregator::*;
pub use enricher::*;
pub use metrics::*;
pub use poller::*;
pub use snapshot_store::*;
