use serde::{Deserialize, Serialize};

use super::quota::QuotaSpec;

/// One element of `GET /admin/bucket?stats=true`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub num_shards: Option<u64>,
    #[serde(default)]
    pub usage: BucketUsage,
    #[serde(default)]
    pub bucket_quota: QuotaSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BucketUsage {
    /// Empty buckets come back with `"usage": {}`.
    #[serde(rename = "rgw.main", default)]
    pub rgw_main: RgwMainUsage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RgwMainUsage {
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub size_actual: Option<u64>,
    #[serde(default)]
    pub size_utilized: Option<u64>,
    #[serde(default)]
    pub num_objects: Option<u64>,
}

impl Bucket {
    pub fn size(&self) -> f64 {
        self.usage.rgw_main.size.unwrap_or(0) as f64
    }

    pub fn actual_size(&self) -> f64 {
        self.usage.rgw_main.size_actual.unwrap_or(0) as f64
    }

    pub fn objects(&self) -> f64 {
        self.usage.rgw_main.num_objects.unwrap_or(0) as f64
    }

    /// Shard count as exported; -1 when the gateway did not report one.
    pub fn shard_count(&self) -> f64 {
        self.num_shards.map(|n| n as f64).unwrap_or(-1.0)
    }

    pub fn objects_per_shard(&self) -> f64 {
        match self.num_shards {
            Some(shards) if shards > 0 => self.objects() / shards as f64,
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket_with(objects: Option<u64>, shards: Option<u64>) -> Bucket {
        Bucket {
            bucket: "b".to_string(),
            num_shards: shards,
            usage: BucketUsage {
                rgw_main: RgwMainUsage {
                    num_objects: objects,
                    ..Default::default()
                },
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_objects_per_shard() {
        assert_eq!(bucket_with(Some(100), Some(4)).objects_per_shard(), 25.0);
        assert_eq!(bucket_with(Some(100), Some(0)).objects_per_shard(), 0.0);
        assert_eq!(bucket_with(Some(100), None).objects_per_shard(), 0.0);
    }

    #[test]
    fn test_missing_shard_count_is_reported_as_minus_one() {
        assert_eq!(bucket_with(Some(1), None).shard_count(), -1.0);
        assert_eq!(bucket_with(Some(1), Some(0)).shard_count(), 0.0);
        assert_eq!(bucket_with(Some(1), Some(11)).shard_count(), 11.0);
    }

    #[test]
    fn test_deserializes_admin_listing() {
        let raw = r#"[
            {
                "bucket": "photos",
                "num_shards": 11,
                "tenant": "",
                "zonegroup": "d9a3c0b6",
                "placement_rule": "default-placement",
                "id": "2a6f.4135.1",
                "owner": "alice",
                "usage": {
                    "rgw.main": {
                        "size": 2048,
                        "size_actual": 8192,
                        "size_utilized": 2048,
                        "size_kb": 2,
                        "size_kb_actual": 8,
                        "num_objects": 2
                    }
                },
                "bucket_quota": {
                    "enabled": true,
                    "check_on_raw": false,
                    "max_size": 4096,
                    "max_size_kb": 4,
                    "max_objects": -1
                }
            },
            { "bucket": "empty", "owner": "bob", "usage": {} }
        ]"#;

        let buckets: Vec<Bucket> = serde_json::from_str(raw).unwrap();

        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].size(), 2048.0);
        assert_eq!(buckets[0].actual_size(), 8192.0);
        assert_eq!(buckets[0].objects(), 2.0);
        assert_eq!(buckets[0].shard_count(), 11.0);
        assert_eq!(buckets[0].bucket_quota.normalize().max_size_bytes, 4096.0);

        assert_eq!(buckets[1].size(), 0.0);
        assert_eq!(buckets[1].shard_count(), -1.0);
        assert_eq!(buckets[1].bucket_quota.normalize().enabled, 0.0);
    }
}
