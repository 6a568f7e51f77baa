//! Lock operation counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of a manager's lock statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStats {
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Acquisitions that gave up (no-wait contention or bounded-wait timeout)
    pub contended: u64,
    /// Total set-if-absent attempts sent to the backend
    pub attempts: u64,
    /// Releases that deleted the lock
    pub releases: u64,
    /// Releases with a stale or wrong token
    pub stale_releases: u64,
    /// Successful TTL extensions
    pub extensions: u64,
    /// Extensions with a stale or wrong token
    pub failed_extensions: u64,
    /// Operations that failed because of the backend
    pub backend_errors: u64,
}

#[derive(Default)]
pub(crate) struct LockStatsCollector {
    acquisitions: AtomicU64,
    contended: AtomicU64,
    attempts: AtomicU64,
    releases: AtomicU64,
    stale_releases: AtomicU64,
    extensions: AtomicU64,
    failed_extensions: AtomicU64,
    backend_errors: AtomicU64,
}

impl LockStatsCollector {
    pub(crate) fn record_attempt(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_acquired(&self) {
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("redilock_acquire_total", "outcome" => "acquired").increment(1);
    }

    pub(crate) fn record_contended(&self) {
        self.contended.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("redilock_acquire_total", "outcome" => "contended").increment(1);
    }

    pub(crate) fn record_release(&self, released: bool) {
        if released {
            self.releases.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("redilock_release_total", "outcome" => "released").increment(1);
        } else {
            self.stale_releases.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("redilock_release_total", "outcome" => "stale").increment(1);
        }
    }

    pub(crate) fn record_extend(&self, extended: bool) {
        if extended {
            self.extensions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("redilock_extend_total", "outcome" => "extended").increment(1);
        } else {
            self.failed_extensions.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("redilock_extend_total", "outcome" => "stale").increment(1);
        }
    }

    pub(crate) fn record_backend_error(&self) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("redilock_backend_errors_total").increment(1);
    }

    pub(crate) fn snapshot(&self) -> LockStats {
        LockStats {
            acquisitions: self.acquisitions.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            stale_releases: self.stale_releases.load(Ordering::Relaxed),
            extensions: self.extensions.load(Ordering::Relaxed),
            failed_extensions: self.failed_extensions.load(Ordering::Relaxed),
            backend_errors: self.backend_errors.load(Ordering::Relaxed),
        }
    }
}
