use serde::{Deserialize, Serialize};
use std::{collections::HashMap, ops::AddAssign};

/// Body of `GET /admin/usage`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageReport {
    #[serde(default)]
    pub entries: Vec<UsageEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageEntry {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub buckets: Vec<UsageBucket>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageBucket {
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub categories: Vec<UsageCategory>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageCategory {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub bytes_sent: u64,
    #[serde(default)]
    pub bytes_received: u64,
    #[serde(default)]
    pub ops: u64,
    #[serde(default)]
    pub successful_ops: u64,
}

/// Query parameters of a usage request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageQuery {
    /// First day included, `YYYY-MM-DD`.
    pub start: String,
    pub show_summary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UsageKey {
    pub user: String,
    pub bucket: String,
    pub owner: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub ops: u64,
    pub successful_ops: u64,
}

impl UsageStats {
    pub fn add(&mut self, category: &UsageCategory) {
        self.bytes_sent += category.bytes_sent;
        self.bytes_received += category.bytes_received;
        self.ops += category.ops;
        self.successful_ops += category.successful_ops;
    }
}

impl AddAssign for UsageStats {
    fn add_assign(&mut self, other: Self) {
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
        self.ops += other.ops;
        self.successful_ops += other.successful_ops;
    }
}

pub type UsageMap = HashMap<UsageKey, UsageStats>;
