//! Lock acquisition and release protocol
//!
//! Provides:
//! - Acquire with no-wait, indefinite or bounded waiting
//! - Token-gated release
//! - Token-gated TTL extension
//!
//! The backend is the single source of truth. The manager keeps no record of
//! held locks; the token handed back to the caller is the only proof of
//! ownership.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::LockBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::LockConfig;
use crate::error::{BackendError, LockError, Result};
use crate::stats::{LockStats, LockStatsCollector};
use crate::token::{LockToken, RandomTokenGenerator, TokenGenerator};
use crate::wait::WaitPolicy;

/// Smallest TTL the store can represent
pub const MIN_TTL: Duration = Duration::from_millis(1);

pub struct LockManager {
    backend: Arc<dyn LockBackend>,
    tokens: Arc<dyn TokenGenerator>,
    clock: Arc<dyn Clock>,
    config: LockConfig,
    stats: LockStatsCollector,
}

impl LockManager {
    /// Create a manager over `backend` with default configuration
    pub fn new(backend: Arc<dyn LockBackend>) -> Self {
        Self {
            backend,
            tokens: Arc::new(RandomTokenGenerator),
            clock: Arc::new(SystemClock),
            config: LockConfig::default(),
            stats: LockStatsCollector::default(),
        }
    }

    pub fn with_config(mut self, config: LockConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn stats(&self) -> LockStats {
        self.stats.snapshot()
    }

    /// Acquire `name` for `ttl` using the configured default wait policy.
    ///
    /// Returns `Ok(None)` when the lock could not be obtained under that policy.
    pub async fn acquire(&self, name: &str, ttl: Duration) -> Result<Option<LockToken>> {
        self.acquire_with(name, ttl, self.config.default_wait).await
    }

    /// Acquire `name` for `ttl`, handling contention according to `wait`.
    ///
    /// One token is generated per call and reused across its retries; it only
    /// reaches the caller if an attempt succeeds.
    ///
    /// A bounded wait whose deadline cannot be represented waits like
    /// [`WaitPolicy::Indefinite`].
    ///
    /// # Errors
    /// - [`LockError::InvalidArgument`] for an empty name or a TTL under [`MIN_TTL`],
    ///   before the backend is contacted
    /// - [`LockError::Backend`] when the store cannot be reached or misbehaves
    /// - [`LockError::Randomness`] when no token can be generated
    pub async fn acquire_with(
        &self,
        name: &str,
        ttl: Duration,
        wait: WaitPolicy,
    ) -> Result<Option<LockToken>> {
        validate_name(name)?;
        validate_ttl(ttl)?;

        let key = self.config.key_for(name);
        let token = self.tokens.generate()?;
        let interval = self.config.retry_interval();
        let started = self.clock.now();
        // A timeout past the representable range has no deadline
        let deadline = wait
            .timeout()
            .and_then(|timeout| started.checked_add(timeout));
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            self.stats.record_attempt();

            let acquired = self
                .backend
                .set_if_absent(&key, token.as_str(), ttl)
                .await
                .map_err(|e| self.backend_failure("acquire", name, e))?;

            if acquired {
                self.stats.record_acquired();
                info!(
                    lock = name,
                    attempts,
                    ttl_ms = ttl.as_millis() as u64,
                    elapsed_ms = (self.clock.now() - started).as_millis() as u64,
                    "Lock acquired"
                );
                return Ok(Some(token));
            }

            let pause = match (wait, deadline) {
                (WaitPolicy::NoWait, _) => None,
                (WaitPolicy::BoundedWait(_), Some(deadline)) => {
                    let now = self.clock.now();
                    if now >= deadline {
                        None
                    } else {
                        Some(interval.min(deadline - now))
                    }
                }
                _ => Some(interval),
            };

            match pause {
                Some(pause) => {
                    debug!(lock = name, attempts, "Lock is held, retrying");
                    self.clock.sleep(pause).await;
                }
                None => {
                    self.stats.record_contended();
                    debug!(
                        lock = name,
                        attempts,
                        wait = %wait,
                        elapsed_ms = (self.clock.now() - started).as_millis() as u64,
                        "Lock not acquired"
                    );
                    return Ok(None);
                }
            }
        }
    }

    /// Release `name` if it is still held under `token`.
    ///
    /// Returns `Ok(false)` when the lock is absent, expired or held by another
    /// token. A single atomic compare-and-delete is issued; there is no retry.
    pub async fn release(&self, name: &str, token: &LockToken) -> Result<bool> {
        validate_name(name)?;

        let key = self.config.key_for(name);
        let released = self
            .backend
            .compare_and_delete(&key, token.as_str())
            .await
            .map_err(|e| self.backend_failure("release", name, e))?;

        self.stats.record_release(released);
        if released {
            info!(lock = name, "Lock released");
        } else {
            debug!(lock = name, "Release skipped: lock not held by this token");
        }
        Ok(released)
    }

    /// Reset the TTL of `name` to `ttl` if it is still held under `token`.
    ///
    /// Returns `Ok(false)` when the lock is no longer held by `token`.
    pub async fn extend(&self, name: &str, token: &LockToken, ttl: Duration) -> Result<bool> {
        validate_name(name)?;
        validate_ttl(ttl)?;

        let key = self.config.key_for(name);
        let extended = self
            .backend
            .compare_and_expire(&key, token.as_str(), ttl)
            .await
            .map_err(|e| self.backend_failure("extend", name, e))?;

        self.stats.record_extend(extended);
        if extended {
            debug!(lock = name, ttl_ms = ttl.as_millis() as u64, "Lock extended");
        } else {
            debug!(lock = name, "Extend skipped: lock not held by this token");
        }
        Ok(extended)
    }

    fn backend_failure(&self, op: &str, name: &str, error: BackendError) -> LockError {
        self.stats.record_backend_error();
        warn!(lock = name, op, error = %error, "Lock backend failure");
        LockError::Backend(error)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(LockError::InvalidArgument(
            "lock name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_ttl(ttl: Duration) -> Result<()> {
    if ttl < MIN_TTL {
        return Err(LockError::InvalidArgument(format!(
            "ttl must be at least {}ms, got {:?}",
            MIN_TTL.as_millis(),
            ttl
        )));
    }
    Ok(())
}
