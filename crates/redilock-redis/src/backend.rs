//! Redis implementation of the lock backend
//!
//! | Operation            | Redis                                   |
//! |----------------------|-----------------------------------------|
//! | `set_if_absent`      | `SET key value NX PX ttl`               |
//! | `compare_and_delete` | Lua: `GET` then `DEL` if value matches  |
//! | `compare_and_expire` | Lua: `GET` then `PEXPIRE` if it matches |
//!
//! Scripts run atomically on the server, so no other client can slip in
//! between the comparison and the mutation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, RedisResult, Script};
use redilock_core::{BackendError, LockBackend};
use tracing::{debug, info};

use crate::config::RedisConfig;

const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const COMPARE_AND_EXPIRE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Lock backend over a shared, auto-reconnecting Redis connection
pub struct RedisBackend {
    conn: ConnectionManager,
    response_timeout: Duration,
    delete_script: Script,
    expire_script: Script,
}

impl RedisBackend {
    /// Connect to the server described by `config`
    pub async fn connect(config: &RedisConfig) -> Result<Self, BackendError> {
        let client = redis::Client::open(config.url.as_str()).map_err(classify)?;
        let conn = with_timeout(config.connection_timeout(), client.get_connection_manager())
            .await?;
        info!(url = %redact_url(&config.url), "Connected to Redis lock backend");
        Ok(Self::from_connection(conn, config.response_timeout()))
    }

    /// Wrap an existing connection manager
    pub fn from_connection(conn: ConnectionManager, response_timeout: Duration) -> Self {
        Self {
            conn,
            response_timeout,
            delete_script: Script::new(COMPARE_AND_DELETE_SCRIPT),
            expire_script: Script::new(COMPARE_AND_EXPIRE_SCRIPT),
        }
    }

    /// Round-trip check against the server
    pub async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.conn.clone();
        let reply: String = with_timeout(
            self.response_timeout,
            redis::cmd("PING").query_async(&mut conn),
        )
        .await?;
        debug!(reply = %reply, "Redis ping");
        Ok(())
    }
}

#[async_trait]
impl LockBackend for RedisBackend {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl));

        let reply: Option<String> =
            with_timeout(self.response_timeout, cmd.query_async(&mut conn)).await?;
        match reply.as_deref() {
            Some("OK") => Ok(true),
            None => Ok(false),
            Some(other) => Err(BackendError::Protocol(format!(
                "unexpected SET reply: {}",
                other
            ))),
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, BackendError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.delete_script.key(key);
        invocation.arg(expected);

        let deleted: i64 =
            with_timeout(self.response_timeout, invocation.invoke_async(&mut conn)).await?;
        Ok(deleted == 1)
    }

    async fn compare_and_expire(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, BackendError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.expire_script.key(key);
        invocation.arg(expected).arg(ttl_millis(ttl));

        let updated: i64 =
            with_timeout(self.response_timeout, invocation.invoke_async(&mut conn)).await?;
        Ok(updated == 1)
    }
}

async fn with_timeout<T>(
    timeout: Duration,
    fut: impl Future<Output = RedisResult<T>>,
) -> Result<T, BackendError> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(classify),
        Err(_) => Err(BackendError::Unavailable(format!(
            "redis did not answer within {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Map a Redis error onto the backend error taxonomy
pub fn classify(error: RedisError) -> BackendError {
    if error.is_io_error()
        || error.is_connection_dropped()
        || error.is_connection_refusal()
        || error.is_timeout()
    {
        BackendError::Unavailable(error.to_string())
    } else {
        BackendError::Protocol(error.to_string())
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Strip credentials from a connection URL before logging it
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://***{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}
