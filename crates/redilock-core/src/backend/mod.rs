//! Coordination store interface
//!
//! A backend only has to provide a handful of operations, each atomic on the
//! store side. Mutual exclusion rests entirely on `set_if_absent`; release
//! safety rests on `compare_and_delete` checking and deleting in one step.
//! A multi-instance quorum would be another implementation of this trait.

mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BackendError;

pub use memory::MemoryBackend;

#[async_trait]
pub trait LockBackend: Send + Sync {
    /// Create `key = value` expiring after `ttl`, only if `key` is absent.
    ///
    /// Returns `false` when the key already exists and has not expired.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError>;

    /// Delete `key` only if its current value equals `expected`.
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, BackendError>;

    /// Reset the expiry of `key` to `ttl` only if its current value equals `expected`.
    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError>;
}
