//! Lock manager configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wait::WaitPolicy;

/// Default polling interval between contended attempts
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 100;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Prefix prepended to every lock name to form the store key
    pub key_prefix: String,
    /// Sleep between attempts while waiting, in milliseconds
    pub retry_interval_ms: u64,
    /// Policy used by `acquire` when the caller does not pick one
    pub default_wait: WaitPolicy,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            key_prefix: String::new(),
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            default_wait: WaitPolicy::Indefinite,
        }
    }
}

impl LockConfig {
    pub fn with_key_prefix(mut self, prefix: &str) -> Self {
        self.key_prefix = prefix.to_string();
        self
    }

    pub fn with_retry_interval_ms(mut self, interval_ms: u64) -> Self {
        self.retry_interval_ms = interval_ms;
        self
    }

    pub fn with_default_wait(mut self, wait: WaitPolicy) -> Self {
        self.default_wait = wait;
        self
    }

    /// Retry interval, never shorter than one millisecond
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms.max(1))
    }

    pub fn key_for(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }
}
