//! Redis connection settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://:password@host:6379/0`
    pub url: String,
    /// Timeout for establishing the connection in milliseconds
    pub connection_timeout_ms: u64,
    /// Timeout for a single command round trip in milliseconds
    pub response_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REDIS_URL.to_string(),
            connection_timeout_ms: 5000,
            response_timeout_ms: 5000,
        }
    }
}

impl RedisConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Default::default()
        }
    }

    /// Set timeouts
    pub fn with_timeouts(mut self, connection_ms: u64, response_ms: u64) -> Self {
        self.connection_timeout_ms = connection_ms;
        self.response_timeout_ms = response_ms;
        self
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
