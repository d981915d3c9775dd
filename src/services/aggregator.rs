use crate::models::{UsageKey, UsageMap, UsageReport, UsageStats};

/// Bucket name RGW uses for operations that target no bucket (e.g. list_buckets).
pub const NO_BUCKET_PLACEHOLDER: &str = "-";

fn is_bucketless(name: &str) -> bool {
    name.is_empty() || name == NO_BUCKET_PLACEHOLDER
}

/// Sums a usage report into one counter set per (user, bucket, owner, category).
///
/// Starts from an empty map on every call, so aggregating the same report twice
/// yields the same counters rather than doubled ones.
pub fn aggregate_usage(report: &UsageReport, skip_without_bucket: bool) -> UsageMap {
    let mut usage = UsageMap::new();

    for entry in &report.entries {
        for bucket in &entry.buckets {
            if skip_without_bucket && is_bucketless(&bucket.bucket) {
                continue;
            }

            for category in &bucket.categories {
                let key = UsageKey {
                    user: entry.user.clone(),
                    bucket: bucket.bucket.clone(),
                    owner: bucket.owner.clone(),
                    category: category.category.clone(),
                };

                usage.entry(key).or_insert_with(UsageStats::default).add(category);
            }
        }
    }

    usage
}
