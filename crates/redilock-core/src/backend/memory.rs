//! In-process backend
//!
//! Every operation works on a single `DashMap` entry while holding its shard
//! lock, which makes the check and the mutation one atomic step. Expired
//! records are treated as absent and reclaimed lazily, or by the sweep task
//! started with [`MemoryBackend::spawn_purge`].

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::LockBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::BackendError;

#[derive(Debug, Clone)]
struct LockRecord {
    value: String,
    /// `None` when the ttl reaches past the clock's range
    expires_at: Option<Instant>,
}

impl LockRecord {
    fn new(value: &str, now: Instant, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: now.checked_add(ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn remaining(&self, now: Instant) -> Duration {
        self.expires_at
            .map_or(Duration::MAX, |at| at.saturating_duration_since(now))
    }
}

pub struct MemoryBackend {
    records: DashMap<String, LockRecord>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            clock,
        }
    }

    /// Current value of `key`, ignoring expired records
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        self.records
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.value.clone())
    }

    /// Remaining time-to-live of `key`, if it is held
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now();
        self.records
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.remaining(now))
    }

    /// Number of live (unexpired) records
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.records.iter().filter(|r| !r.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired record, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let purged = before.saturating_sub(self.records.len());
        if purged > 0 {
            tracing::debug!(purged, "Purged expired lock records");
        }
        purged
    }

    /// Run [`purge_expired`](Self::purge_expired) every `every` on the tokio runtime.
    ///
    /// The task holds a weak reference and ends once the backend is dropped.
    /// Abort the returned handle to stop it earlier.
    pub fn spawn_purge(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let backend: Weak<Self> = Arc::downgrade(self);
        let every = every.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match backend.upgrade() {
                    Some(backend) => {
                        backend.purge_expired();
                    }
                    None => break,
                }
            }
        })
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockBackend for MemoryBackend {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let now = self.clock.now();
        let record = LockRecord::new(value, now, ttl);

        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(record);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(record);
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, BackendError> {
        let now = self.clock.now();
        match self.records.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let record = occupied.get();
                if record.is_expired(now) {
                    occupied.remove();
                    Ok(false)
                } else if record.value == expected {
                    occupied.remove();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let now = self.clock.now();
        match self.records.get_mut(key) {
            Some(mut record) if !record.is_expired(now) && record.value == expected => {
                record.expires_at = now.checked_add(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
