use std::{
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use crate::models::{Bucket, UsageMap, UserInfo};

/// Point-in-time view of one slot.
#[derive(Debug)]
pub struct Snapshot<T> {
    /// `None` until the first successful poll, and for users while collection is off.
    pub data: Option<Arc<T>>,
    /// Duration of the last successful poll; zero before the first one.
    pub last_duration: Duration,
}

impl<T> Clone for Snapshot<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            last_duration: self.last_duration,
        }
    }
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_duration: Duration::ZERO,
        }
    }
}

impl<T> Snapshot<T> {
    pub fn is_populated(&self) -> bool {
        self.data.is_some()
    }
}

struct Slot<T> {
    inner: RwLock<Snapshot<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            inner: RwLock::new(Snapshot::default()),
        }
    }

    // A poisoned lock only means a writer panicked mid-swap; the stored value
    // is still a complete snapshot, so keep serving it.
    fn read(&self) -> Snapshot<T> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn replace(&self, data: T, duration: Duration) {
        let data = Arc::new(data);
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        slot.data = Some(data);
        slot.last_duration = duration;
    }

    fn clear(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        slot.data = None;
    }
}

/// Latest result of each poller.
///
/// The three slots are guarded independently: a reader sees a complete old or
/// complete new value for each slot, but two slots read one after the other
/// may come from polls taken at different times.
pub struct SnapshotStore {
    usage: Slot<UsageMap>,
    buckets: Slot<Vec<Bucket>>,
    users: Slot<Vec<UserInfo>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            usage: Slot::new(),
            buckets: Slot::new(),
            users: Slot::new(),
        }
    }

    pub fn usage(&self) -> Snapshot<UsageMap> {
        self.usage.read()
    }

    pub fn buckets(&self) -> Snapshot<Vec<Bucket>> {
        self.buckets.read()
    }

    pub fn users(&self) -> Snapshot<Vec<UserInfo>> {
        self.users.read()
    }

    pub fn replace_usage(&self, usage: UsageMap, duration: Duration) {
        self.usage.replace(usage, duration);
    }

    pub fn replace_buckets(&self, buckets: Vec<Bucket>, duration: Duration) {
        self.buckets.replace(buckets, duration);
    }

    pub fn replace_users(&self, users: Vec<UserInfo>, duration: Duration) {
        self.users.replace(users, duration);
    }

    /// Drops the users snapshot. The last poll duration is left as it was.
    pub fn clear_users(&self) {
        self.users.clear();
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
