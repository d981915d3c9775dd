use serde::{Deserialize, Serialize};

/// Quota block as the admin API reports it on buckets and users.
///
/// Every field is optional: older gateways omit `max_size` and only send
/// `max_size_kb`, and quota-less entities may omit the block entirely.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaSpec {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub check_on_raw: Option<bool>,
    #[serde(default)]
    pub max_size: Option<i64>,
    #[serde(default)]
    pub max_size_kb: Option<i64>,
    #[serde(default)]
    pub max_objects: Option<i64>,
}

/// Quota flattened to the values exported as gauges.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Quota {
    /// 1.0 when enabled, 0.0 otherwise.
    pub enabled: f64,
    pub max_size_bytes: f64,
    pub max_objects: f64,
}

impl QuotaSpec {
    pub fn normalize(&self) -> Quota {
        let enabled = if self.enabled == Some(true) { 1.0 } else { 0.0 };

        let max_size_bytes = match (self.max_size, self.max_size_kb) {
            (Some(bytes), _) => bytes as f64,
            (None, Some(kb)) => kb as f64 * 1024.0,
            (None, None) => 0.0,
        };

        Quota {
            enabled,
            max_size_bytes,
            max_objects: self.max_objects.map(|n| n as f64).unwrap_or(0.0),
        }
    }
}

impl Quota {
    /// A quota only limits anything when it is switched on and has a positive size.
    pub fn is_effective(&self) -> bool {
        self.enabled == 1.0 && self.max_size_bytes > 0.0
    }

    /// Share of the size quota consumed by `used` bytes, 0-100.
    pub fn usage_percent(&self, used: f64) -> f64 {
        if self.is_effective() {
            used / self.max_size_bytes * 100.0
        } else {
            0.0
        }
    }
}
