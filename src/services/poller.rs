use chrono::Utc;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::{
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    errors::Result,
    models::UsageQuery,
    services::{
        admin_client::AdminApi, aggregator::aggregate_usage, enricher::enrich_user,
        snapshot_store::SnapshotStore,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSource {
    Usage,
    Buckets,
    Users,
}

impl PollSource {
    pub fn name(&self) -> &'static str {
        match self {
            PollSource::Usage => "usage",
            PollSource::Buckets => "buckets",
            PollSource::Users => "users",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub usage_interval: Duration,
    pub buckets_interval: Duration,
    pub users_interval: Duration,
    pub skip_without_bucket: bool,
    pub users_enabled: bool,
}

impl From<&Config> for PollerSettings {
    fn from(config: &Config) -> Self {
        Self {
            usage_interval: config.usage_interval(),
            buckets_interval: config.buckets_interval(),
            users_interval: config.users_interval(),
            skip_without_bucket: config.skip_without_bucket,
            users_enabled: config.users_collector_enable,
        }
    }
}

/// Fetches today's usage report and replaces the usage slot.
pub async fn poll_usage(
    client: &dyn AdminApi,
    store: &SnapshotStore,
    skip_without_bucket: bool,
) -> Result<()> {
    let start = Instant::now();
    let query = UsageQuery {
        start: Utc::now().format("%Y-%m-%d").to_string(),
        show_summary: false,
    };

    let report = client.get_usage(&query).await?;
    let usage = aggregate_usage(&report, skip_without_bucket);

    store.replace_usage(usage, start.elapsed());
    Ok(())
}

pub async fn poll_buckets(client: &dyn AdminApi, store: &SnapshotStore) -> Result<()> {
    let start = Instant::now();
    let buckets = client.list_buckets_with_stat().await?;

    store.replace_buckets(buckets, start.elapsed());
    Ok(())
}

/// Lists users and fetches each one. A user whose details cannot be fetched
/// is left out of the snapshot; only a failed listing fails the poll.
pub async fn poll_users(client: &dyn AdminApi, store: &SnapshotStore, enabled: bool) -> Result<()> {
    if !enabled {
        store.clear_users();
        return Ok(());
    }

    let start = Instant::now();
    let uids = client.get_users().await?;

    let mut users = Vec::with_capacity(uids.len());
    for uid in &uids {
        match client.get_user(uid).await {
            Ok(user) => users.push(enrich_user(&user)),
            Err(e) => warn!(uid = %uid, "Unable to get user info: {}", e),
        }
    }

    store.replace_users(users, start.elapsed());
    Ok(())
}

#[derive(Clone)]
struct PollContext {
    client: Arc<dyn AdminApi>,
    store: Arc<SnapshotStore>,
    skip_without_bucket: bool,
    users_enabled: Arc<AtomicBool>,
}

impl PollContext {
    async fn poll(&self, source: PollSource) -> Result<()> {
        let client = self.client.as_ref();
        let store = self.store.as_ref();

        match source {
            PollSource::Usage => poll_usage(client, store, self.skip_without_bucket).await,
            PollSource::Buckets => poll_buckets(client, store).await,
            PollSource::Users => {
                poll_users(client, store, self.users_enabled.load(Ordering::Relaxed)).await
            }
        }
    }
}

/// The three background collectors.
///
/// Each source is driven by one task that finishes its fetch before waiting
/// for the next tick, so at most one fetch per source is ever in flight.
/// Ticks that fall due during a slow fetch are skipped, not queued.
pub struct Poller {
    cancel: CancellationToken,
    users_enabled: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Poller {
    /// Spawns the collectors; each polls once immediately.
    pub fn start(
        client: Arc<dyn AdminApi>,
        store: Arc<SnapshotStore>,
        settings: PollerSettings,
    ) -> Self {
        let cancel = CancellationToken::new();
        let users_enabled = Arc::new(AtomicBool::new(settings.users_enabled));

        let ctx = PollContext {
            client,
            store,
            skip_without_bucket: settings.skip_without_bucket,
            users_enabled: Arc::clone(&users_enabled),
        };

        let handles = [
            (PollSource::Usage, settings.usage_interval),
            (PollSource::Buckets, settings.buckets_interval),
            (PollSource::Users, settings.users_interval),
        ]
        .into_iter()
        .map(|(source, period)| tokio::spawn(run(source, period, ctx.clone(), cancel.clone())))
        .collect();

        Self {
            cancel,
            users_enabled,
            handles,
        }
    }

    /// Takes effect on the users collector's next tick.
    pub fn set_users_enabled(&self, enabled: bool) {
        self.users_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn users_enabled(&self) -> bool {
        self.users_enabled.load(Ordering::Relaxed)
    }

    /// Stops scheduling new polls and waits for in-flight ones to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();

        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                warn!("Collector task ended abnormally: {}", e);
            }
        }

        info!("Collectors stopped");
    }
}

async fn run(source: PollSource, period: Duration, ctx: PollContext, cancel: CancellationToken) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(collector = source.name(), "Collector started (interval: {:?})", period);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let start = Instant::now();
        match ctx.poll(source).await {
            Ok(()) => debug!(
                collector = source.name(),
                "Collected in {:.3}s",
                start.elapsed().as_secs_f64()
            ),
            Err(e) => warn!(collector = source.name(), "Unable to collect {}: {}", source.name(), e),
        }
    }
}
