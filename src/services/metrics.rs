use prometheus::{
    core::{Collector, Desc},
    proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType},
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::{
    config::Config,
    errors::Result,
    models::{Bucket, UsageMap, UsageStats, UserInfo},
    services::snapshot_store::SnapshotStore,
};

const BASE_LABELS: [&str; 3] = ["region", "cluster", "endpoint"];

const USAGE_LABELS: &[&str] = &["uid", "bucket", "category"];
const BUCKET_LABELS: &[&str] = &["bucket", "uid"];
const USER_LABELS: &[&str] = &["uid"];
const NO_LABELS: &[&str] = &[];

struct MetricDef {
    name: &'static str,
    help: &'static str,
    kind: MetricType,
    labels: &'static [&'static str],
    desc: Desc,
}

impl MetricDef {
    fn new(
        name: &'static str,
        help: &'static str,
        kind: MetricType,
        labels: &'static [&'static str],
    ) -> Result<Self> {
        let variable_labels = BASE_LABELS
            .iter()
            .chain(labels)
            .map(|l| l.to_string())
            .collect();
        let desc = Desc::new(name.to_string(), help.to_string(), variable_labels, HashMap::new())?;

        Ok(Self {
            name,
            help,
            kind,
            labels,
            desc,
        })
    }

    fn gauge(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Result<Self> {
        Self::new(name, help, MetricType::GAUGE, labels)
    }

    fn counter(name: &'static str, help: &'static str, labels: &'static [&'static str]) -> Result<Self> {
        Self::new(name, help, MetricType::COUNTER, labels)
    }
}

/// Samples of one family under construction.
struct Family<'a> {
    def: &'a MetricDef,
    base: &'a [String; 3],
    mf: MetricFamily,
}

impl<'a> Family<'a> {
    fn new(def: &'a MetricDef, base: &'a [String; 3]) -> Self {
        let mut mf = MetricFamily::default();
        mf.set_name(def.name.to_string());
        mf.set_help(def.help.to_string());
        mf.set_field_type(def.kind);

        Self { def, base, mf }
    }

    /// Panics when `values` does not line up with the declared labels.
    ///
    /// Release builds abort on panic, so a mismatch stops the exporter. In
    /// debug builds the panic only unwinds the scrape's connection task and
    /// the server keeps serving.
    fn sample(&mut self, values: &[&str], value: f64) {
        assert_eq!(
            values.len(),
            self.def.labels.len(),
            "label cardinality mismatch for {}: declared {:?}, got {:?}",
            self.def.name,
            self.def.labels,
            values
        );

        let names = BASE_LABELS.iter().chain(self.def.labels);
        let values = self
            .base
            .iter()
            .map(String::as_str)
            .chain(values.iter().copied());

        let mut metric = Metric::default();
        for (name, value) in names.zip(values) {
            let mut pair = LabelPair::default();
            pair.set_name(name.to_string());
            pair.set_value(value.to_string());
            metric.mut_label().push(pair);
        }

        if self.def.kind == MetricType::COUNTER {
            let mut counter = Counter::default();
            counter.set_value(value);
            metric.set_counter(counter);
        } else {
            let mut gauge = Gauge::default();
            gauge.set_value(value);
            metric.set_gauge(gauge);
        }

        self.mf.mut_metric().push(metric);
    }

    fn finish(self, out: &mut Vec<MetricFamily>) {
        if !self.mf.get_metric().is_empty() {
            out.push(self.mf);
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct BucketTotals {
    count: f64,
    size: f64,
    actual_size: f64,
    objects: f64,
    quotas_size: f64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct OwnerUsage {
    buckets: f64,
    used_size: f64,
}

fn bucket_totals(buckets: &[Bucket]) -> BucketTotals {
    buckets.iter().fold(BucketTotals::default(), |mut acc, bucket| {
        let quota = bucket.bucket_quota.normalize();

        acc.count += 1.0;
        acc.size += bucket.size();
        acc.actual_size += bucket.actual_size();
        acc.objects += bucket.objects();
        if quota.is_effective() {
            acc.quotas_size += quota.max_size_bytes;
        }
        acc
    })
}

/// Bucket count and logical size per owner. Buckets without an owner are not attributed.
fn usage_by_owner(buckets: &[Bucket]) -> HashMap<&str, OwnerUsage> {
    let mut owners: HashMap<&str, OwnerUsage> = HashMap::new();
    for bucket in buckets.iter().filter(|b| !b.owner.is_empty()) {
        let entry = owners.entry(bucket.owner.as_str()).or_default();
        entry.buckets += 1.0;
        entry.used_size += bucket.size();
    }
    owners
}

/// The owner is not exported, so keys that differ only by owner share a series.
fn usage_series(usage: &UsageMap) -> BTreeMap<(&str, &str, &str), UsageStats> {
    let mut series: BTreeMap<(&str, &str, &str), UsageStats> = BTreeMap::new();
    for (key, stats) in usage {
        *series
            .entry((key.user.as_str(), key.bucket.as_str(), key.category.as_str()))
            .or_default() += *stats;
    }
    series
}

/// Prometheus collector rendering the snapshot store on every scrape.
pub struct UsageExporter {
    store: Arc<SnapshotStore>,
    base: [String; 3],

    ops_total: MetricDef,
    successful_ops_total: MetricDef,
    sent_bytes_total: MetricDef,
    received_bytes_total: MetricDef,

    bucket_quota_enabled: MetricDef,
    bucket_quota_size: MetricDef,
    bucket_quota_objects: MetricDef,
    bucket_size: MetricDef,
    bucket_actual_size: MetricDef,
    bucket_objects: MetricDef,
    bucket_num_shards: MetricDef,
    bucket_objects_per_shard: MetricDef,
    bucket_quota_usage_percent: MetricDef,

    buckets_total: MetricDef,
    buckets_size_total_bytes: MetricDef,
    buckets_actual_size_total_bytes: MetricDef,
    bucket_quotas_size_total_bytes: MetricDef,
    objects_total: MetricDef,

    user_suspended: MetricDef,
    user_quota_enabled: MetricDef,
    user_quota_size_bytes: MetricDef,
    user_quota_objects: MetricDef,
    user_bucket_quota_enabled: MetricDef,
    user_bucket_quota_size_bytes: MetricDef,
    user_bucket_quota_objects: MetricDef,
    user_buckets_total: MetricDef,
    user_used_size_bytes: MetricDef,
    user_quota_usage_percent: MetricDef,

    users_total: MetricDef,
    user_quotas_size_total_bytes: MetricDef,

    collector_usage_duration_seconds: MetricDef,
    collector_buckets_duration_seconds: MetricDef,
    collector_users_duration_seconds: MetricDef,
}

impl UsageExporter {
    pub fn new(store: Arc<SnapshotStore>, config: &Config) -> Result<Self> {
        Self::with_labels(
            store,
            &config.region,
            &config.cluster_name,
            &config.pub_endpoint,
        )
    }

    pub fn with_labels(
        store: Arc<SnapshotStore>,
        region: &str,
        cluster: &str,
        endpoint: &str,
    ) -> Result<Self> {
        Ok(Self {
            store,
            base: [region.to_string(), cluster.to_string(), endpoint.to_string()],

            ops_total: MetricDef::counter("radosgw_usage_ops_total", "Number of requests", USAGE_LABELS)?,
            successful_ops_total: MetricDef::counter(
                "radosgw_usage_successful_ops_total",
                "Number of successful requests",
                USAGE_LABELS,
            )?,
            sent_bytes_total: MetricDef::counter(
                "radosgw_usage_sent_bytes_total",
                "Bytes sent by the RGW",
                USAGE_LABELS,
            )?,
            received_bytes_total: MetricDef::counter(
                "radosgw_usage_received_bytes_total",
                "Bytes received by the RGW",
                USAGE_LABELS,
            )?,

            bucket_quota_enabled: MetricDef::gauge(
                "radosgw_usage_bucket_quota_enabled",
                "Quota enabled for bucket",
                BUCKET_LABELS,
            )?,
            bucket_quota_size: MetricDef::gauge(
                "radosgw_usage_bucket_quota_size",
                "Max allowed bucket size bytes (bucket quota)",
                BUCKET_LABELS,
            )?,
            bucket_quota_objects: MetricDef::gauge(
                "radosgw_usage_bucket_quota_objects",
                "Max allowed objects in bucket",
                BUCKET_LABELS,
            )?,
            bucket_size: MetricDef::gauge(
                "radosgw_usage_bucket_size",
                "Bucket size bytes (logical)",
                BUCKET_LABELS,
            )?,
            bucket_actual_size: MetricDef::gauge(
                "radosgw_usage_bucket_actual_size",
                "Bucket actual size bytes (on disk)",
                BUCKET_LABELS,
            )?,
            bucket_objects: MetricDef::gauge(
                "radosgw_usage_bucket_objects",
                "Bucket objects count",
                BUCKET_LABELS,
            )?,
            bucket_num_shards: MetricDef::gauge(
                "radosgw_usage_bucket_num_shards",
                "Number of bucket index shards",
                BUCKET_LABELS,
            )?,
            bucket_objects_per_shard: MetricDef::gauge(
                "radosgw_usage_bucket_objects_per_shard",
                "Number of objects per shard (objects / num_shards)",
                BUCKET_LABELS,
            )?,
            bucket_quota_usage_percent: MetricDef::gauge(
                "radosgw_usage_bucket_quota_usage_percent",
                "Bucket quota usage in percent",
                BUCKET_LABELS,
            )?,

            buckets_total: MetricDef::gauge(
                "radosgw_usage_buckets_total",
                "Total number of buckets",
                NO_LABELS,
            )?,
            buckets_size_total_bytes: MetricDef::gauge(
                "radosgw_usage_buckets_size_total_bytes",
                "Total logical size of all buckets in bytes",
                NO_LABELS,
            )?,
            buckets_actual_size_total_bytes: MetricDef::gauge(
                "radosgw_usage_buckets_actual_size_total_bytes",
                "Total actual size of all buckets in bytes",
                NO_LABELS,
            )?,
            bucket_quotas_size_total_bytes: MetricDef::gauge(
                "radosgw_usage_bucket_quotas_size_total_bytes",
                "Total configured bucket quotas size in bytes (enabled and >0)",
                NO_LABELS,
            )?,
            objects_total: MetricDef::gauge(
                "radosgw_usage_objects_total",
                "Total number of objects across all buckets",
                NO_LABELS,
            )?,

            user_suspended: MetricDef::gauge(
                "radosgw_usage_user_suspended",
                "1 - suspended, 0 - active",
                &["uid", "display_name"],
            )?,
            user_quota_enabled: MetricDef::gauge(
                "radosgw_usage_user_quota_enabled",
                "User quota enabled: 1 - enabled, 0 - disabled",
                USER_LABELS,
            )?,
            user_quota_size_bytes: MetricDef::gauge(
                "radosgw_usage_user_quota_size_bytes",
                "User quota max size in bytes",
                USER_LABELS,
            )?,
            user_quota_objects: MetricDef::gauge(
                "radosgw_usage_user_quota_objects",
                "User quota max objects",
                USER_LABELS,
            )?,
            user_bucket_quota_enabled: MetricDef::gauge(
                "radosgw_usage_user_bucket_quota_enabled",
                "User bucket quota enabled: 1 - enabled, 0 - disabled",
                USER_LABELS,
            )?,
            user_bucket_quota_size_bytes: MetricDef::gauge(
                "radosgw_usage_user_bucket_quota_size_bytes",
                "User bucket quota max size in bytes",
                USER_LABELS,
            )?,
            user_bucket_quota_objects: MetricDef::gauge(
                "radosgw_usage_user_bucket_quota_objects",
                "User bucket quota max objects",
                USER_LABELS,
            )?,
            user_buckets_total: MetricDef::gauge(
                "radosgw_usage_user_buckets_total",
                "Total number of buckets owned by user",
                USER_LABELS,
            )?,
            user_used_size_bytes: MetricDef::gauge(
                "radosgw_usage_user_used_size_bytes",
                "Total logical size of buckets owned by user in bytes",
                USER_LABELS,
            )?,
            user_quota_usage_percent: MetricDef::gauge(
                "radosgw_usage_user_quota_usage_percent",
                "User quota usage in percent",
                USER_LABELS,
            )?,

            users_total: MetricDef::gauge(
                "radosgw_usage_users_total",
                "Total number of users",
                NO_LABELS,
            )?,
            user_quotas_size_total_bytes: MetricDef::gauge(
                "radosgw_usage_user_quotas_size_total_bytes",
                "Total configured user quotas size in bytes (enabled and >0)",
                NO_LABELS,
            )?,

            collector_usage_duration_seconds: MetricDef::gauge(
                "radosgw_usage_collector_usage_duration_seconds",
                "Duration of the last successful usage collection in seconds",
                NO_LABELS,
            )?,
            collector_buckets_duration_seconds: MetricDef::gauge(
                "radosgw_usage_collector_buckets_duration_seconds",
                "Duration of the last successful buckets collection in seconds",
                NO_LABELS,
            )?,
            collector_users_duration_seconds: MetricDef::gauge(
                "radosgw_usage_collector_users_duration_seconds",
                "Duration of the last successful users collection in seconds",
                NO_LABELS,
            )?,
        })
    }

    fn defs(&self) -> [&MetricDef; 33] {
        [
            &self.ops_total,
            &self.successful_ops_total,
            &self.sent_bytes_total,
            &self.received_bytes_total,
            &self.bucket_quota_enabled,
            &self.bucket_quota_size,
            &self.bucket_quota_objects,
            &self.bucket_size,
            &self.bucket_actual_size,
            &self.bucket_objects,
            &self.bucket_num_shards,
            &self.bucket_objects_per_shard,
            &self.bucket_quota_usage_percent,
            &self.buckets_total,
            &self.buckets_size_total_bytes,
            &self.buckets_actual_size_total_bytes,
            &self.bucket_quotas_size_total_bytes,
            &self.objects_total,
            &self.user_suspended,
            &self.user_quota_enabled,
            &self.user_quota_size_bytes,
            &self.user_quota_objects,
            &self.user_bucket_quota_enabled,
            &self.user_bucket_quota_size_bytes,
            &self.user_bucket_quota_objects,
            &self.user_buckets_total,
            &self.user_used_size_bytes,
            &self.user_quota_usage_percent,
            &self.users_total,
            &self.user_quotas_size_total_bytes,
            &self.collector_usage_duration_seconds,
            &self.collector_buckets_duration_seconds,
            &self.collector_users_duration_seconds,
        ]
    }

    fn family<'a>(&'a self, def: &'a MetricDef) -> Family<'a> {
        Family::new(def, &self.base)
    }

    fn render_usage(&self, usage: Option<&UsageMap>, out: &mut Vec<MetricFamily>) {
        let mut ops = self.family(&self.ops_total);
        let mut successful = self.family(&self.successful_ops_total);
        let mut sent = self.family(&self.sent_bytes_total);
        let mut received = self.family(&self.received_bytes_total);

        if let Some(usage) = usage {
            for ((uid, bucket, category), stats) in usage_series(usage) {
                let labels = [uid, bucket, category];
                ops.sample(&labels, stats.ops as f64);
                successful.sample(&labels, stats.successful_ops as f64);
                sent.sample(&labels, stats.bytes_sent as f64);
                received.sample(&labels, stats.bytes_received as f64);
            }
        }

        for family in [ops, successful, sent, received] {
            family.finish(out);
        }
    }

    fn render_buckets(&self, buckets: &[Bucket], out: &mut Vec<MetricFamily>) {
        let mut quota_enabled = self.family(&self.bucket_quota_enabled);
        let mut quota_size = self.family(&self.bucket_quota_size);
        let mut quota_objects = self.family(&self.bucket_quota_objects);
        let mut size = self.family(&self.bucket_size);
        let mut actual_size = self.family(&self.bucket_actual_size);
        let mut objects = self.family(&self.bucket_objects);
        let mut num_shards = self.family(&self.bucket_num_shards);
        let mut objects_per_shard = self.family(&self.bucket_objects_per_shard);
        let mut quota_usage = self.family(&self.bucket_quota_usage_percent);

        for bucket in buckets {
            let quota = bucket.bucket_quota.normalize();
            let labels = [bucket.bucket.as_str(), bucket.owner.as_str()];

            quota_enabled.sample(&labels, quota.enabled);
            quota_size.sample(&labels, quota.max_size_bytes);
            quota_objects.sample(&labels, quota.max_objects);
            size.sample(&labels, bucket.size());
            actual_size.sample(&labels, bucket.actual_size());
            objects.sample(&labels, bucket.objects());
            num_shards.sample(&labels, bucket.shard_count());
            objects_per_shard.sample(&labels, bucket.objects_per_shard());
            quota_usage.sample(&labels, quota.usage_percent(bucket.size()));
        }

        for family in [
            quota_enabled,
            quota_size,
            quota_objects,
            size,
            actual_size,
            objects,
            num_shards,
            objects_per_shard,
            quota_usage,
        ] {
            family.finish(out);
        }

        let totals = bucket_totals(buckets);
        for (def, value) in [
            (&self.buckets_total, totals.count),
            (&self.buckets_size_total_bytes, totals.size),
            (&self.buckets_actual_size_total_bytes, totals.actual_size),
            (&self.bucket_quotas_size_total_bytes, totals.quotas_size),
            (&self.objects_total, totals.objects),
        ] {
            let mut family = self.family(def);
            family.sample(&[], value);
            family.finish(out);
        }
    }

    fn render_users(&self, users: &[UserInfo], buckets: &[Bucket], out: &mut Vec<MetricFamily>) {
        let owners = usage_by_owner(buckets);

        let mut suspended = self.family(&self.user_suspended);
        let mut quota_enabled = self.family(&self.user_quota_enabled);
        let mut quota_size = self.family(&self.user_quota_size_bytes);
        let mut quota_objects = self.family(&self.user_quota_objects);
        let mut bucket_quota_enabled = self.family(&self.user_bucket_quota_enabled);
        let mut bucket_quota_size = self.family(&self.user_bucket_quota_size_bytes);
        let mut bucket_quota_objects = self.family(&self.user_bucket_quota_objects);
        let mut buckets_total = self.family(&self.user_buckets_total);
        let mut used_size = self.family(&self.user_used_size_bytes);
        let mut quota_usage = self.family(&self.user_quota_usage_percent);

        let mut quotas_size_total = 0.0;

        for user in users {
            let uid = [user.user_id.as_str()];
            let owned = owners.get(user.user_id.as_str()).copied().unwrap_or_default();

            suspended.sample(
                &[user.user_id.as_str(), user.display_name.as_str()],
                user.suspended as f64,
            );
            quota_enabled.sample(&uid, user.user_quota.enabled);
            quota_size.sample(&uid, user.user_quota.max_size_bytes);
            quota_objects.sample(&uid, user.user_quota.max_objects);
            bucket_quota_enabled.sample(&uid, user.bucket_quota.enabled);
            bucket_quota_size.sample(&uid, user.bucket_quota.max_size_bytes);
            bucket_quota_objects.sample(&uid, user.bucket_quota.max_objects);
            buckets_total.sample(&uid, owned.buckets);
            used_size.sample(&uid, owned.used_size);
            quota_usage.sample(&uid, user.user_quota.usage_percent(owned.used_size));

            if user.user_quota.is_effective() {
                quotas_size_total += user.user_quota.max_size_bytes;
            }
        }

        for family in [
            suspended,
            quota_enabled,
            quota_size,
            quota_objects,
            bucket_quota_enabled,
            bucket_quota_size,
            bucket_quota_objects,
            buckets_total,
            used_size,
            quota_usage,
        ] {
            family.finish(out);
        }

        for (def, value) in [
            (&self.users_total, users.len() as f64),
            (&self.user_quotas_size_total_bytes, quotas_size_total),
        ] {
            let mut family = self.family(def);
            family.sample(&[], value);
            family.finish(out);
        }
    }
}

impl Collector for UsageExporter {
    fn desc(&self) -> Vec<&Desc> {
        self.defs().into_iter().map(|def| &def.desc).collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let usage = self.store.usage();
        let buckets = self.store.buckets();
        let users = self.store.users();

        let bucket_list: &[Bucket] = buckets.data.as_deref().map(Vec::as_slice).unwrap_or(&[]);
        let user_list: &[UserInfo] = users.data.as_deref().map(Vec::as_slice).unwrap_or(&[]);

        let mut out = Vec::with_capacity(self.defs().len());
        self.render_usage(usage.data.as_deref(), &mut out);
        self.render_buckets(bucket_list, &mut out);
        self.render_users(user_list, bucket_list, &mut out);

        for (def, snapshot_duration) in [
            (&self.collector_usage_duration_seconds, usage.last_duration),
            (&self.collector_buckets_duration_seconds, buckets.last_duration),
            (&self.collector_users_duration_seconds, users.last_duration),
        ] {
            let mut family = self.family(def);
            family.sample(&[], snapshot_duration.as_secs_f64());
            family.finish(&mut out);
        }

        out
    }
}
