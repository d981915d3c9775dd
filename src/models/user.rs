use serde::{Deserialize, Serialize};

use super::quota::{Quota, QuotaSpec};

/// Body of `GET /admin/user?uid=...`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub suspended: Option<i64>,
    #[serde(default)]
    pub max_buckets: Option<i64>,
    #[serde(default)]
    pub user_quota: QuotaSpec,
    #[serde(default)]
    pub bucket_quota: QuotaSpec,
}

/// User record as kept in the snapshot store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInfo {
    pub user_id: String,
    pub display_name: String,
    pub suspended: i64,
    pub user_quota: Quota,
    /// Default quota applied to each bucket the user owns.
    pub bucket_quota: Quota,
}
