//! Configuration management for the redilock tool
//!
//! Sources, lowest precedence first:
//! 1. `conf/redilock.yml` (or the file given with `--config`)
//! 2. `REDILOCK_*` environment variables, `__` between levels
//!    (`REDILOCK_LOCK__KEY_PREFIX`). `REDILOCK_LOG_*` is shorthand for
//!    `REDILOCK_LOGGING__*` (`REDILOCK_LOG_LEVEL=debug`).
//! 3. Command line overrides

use clap::{Parser, Subcommand};
use config::{Config, ConfigError, Environment, File, Map};
use redilock_core::config::DEFAULT_RETRY_INTERVAL_MS;
use redilock_core::{LockConfig, WaitPolicy};
use redilock_redis::{DEFAULT_REDIS_URL, RedisConfig};

use crate::logging::{LogRotation, LoggingConfig};

pub const DEFAULT_CONFIG_FILE: &str = "conf/redilock.yml";

const ENV_PREFIX: &str = "REDILOCK";
const CONFIG_FILE_ENV: &str = "REDILOCK_CONFIG";
const LOG_ENV_PREFIX: &str = "REDILOCK_LOG_";

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "redilock", version, about = "Distributed locks over Redis")]
pub struct Cli {
    /// Configuration file (default: conf/redilock.yml, optional)
    #[arg(short = 'c', long = "config", env = "REDILOCK_CONFIG")]
    pub config: Option<String>,
    #[arg(long = "redis-url", env = "REDIS_URL")]
    pub redis_url: Option<String>,
    #[arg(long = "key-prefix")]
    pub key_prefix: Option<String>,
    #[arg(long = "retry-interval-ms")]
    pub retry_interval_ms: Option<u64>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Acquire a lock and print its token
    Acquire {
        name: String,
        #[arg(long = "ttl-ms")]
        ttl_ms: u64,
        /// no-wait, indefinite, or a timeout such as 1500ms / 2s
        #[arg(short = 'w', long = "wait")]
        wait: Option<WaitPolicy>,
    },
    /// Release a lock held under a token
    Release { name: String, token: String },
    /// Reset the ttl of a lock held under a token
    Extend {
        name: String,
        token: String,
        #[arg(long = "ttl-ms")]
        ttl_ms: u64,
    },
    /// Run the acquire/contend/release walkthrough
    Demo {
        /// Use the in-process backend instead of Redis
        #[arg(long)]
        memory: bool,
        /// Lock name (random when omitted)
        #[arg(long)]
        name: Option<String>,
    },
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::load_with_env(cli, std::env::vars())
    }

    fn load_with_env<I>(cli: &Cli, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file = cli.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
        let mut builder = Config::builder()
            .add_source(File::with_name(file).required(cli.config.is_some()))
            .add_source(environment(vars));

        if let Some(v) = &cli.redis_url {
            builder = builder.set_override("redis.url", v.as_str())?;
        }
        if let Some(v) = &cli.key_prefix {
            builder = builder.set_override("lock.key_prefix", v.as_str())?;
        }
        if let Some(v) = cli.retry_interval_ms {
            builder = builder.set_override("lock.retry_interval_ms", v as i64)?;
        }

        Ok(Configuration {
            config: builder.build()?,
        })
    }

    // ========================================================================
    // Redis Configuration
    // ========================================================================

    pub fn redis_url(&self) -> String {
        self.config
            .get_string("redis.url")
            .unwrap_or(DEFAULT_REDIS_URL.to_string())
    }

    pub fn redis_config(&self) -> RedisConfig {
        let defaults = RedisConfig::default();
        RedisConfig {
            url: self.redis_url(),
            connection_timeout_ms: self
                .config
                .get_int("redis.connection_timeout_ms")
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.connection_timeout_ms),
            response_timeout_ms: self
                .config
                .get_int("redis.response_timeout_ms")
                .map(|v| v.max(0) as u64)
                .unwrap_or(defaults.response_timeout_ms),
        }
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    pub fn key_prefix(&self) -> String {
        self.config
            .get_string("lock.key_prefix")
            .unwrap_or_default()
    }

    pub fn retry_interval_ms(&self) -> u64 {
        self.config
            .get_int("lock.retry_interval_ms")
            .map(|v| v.max(1) as u64)
            .unwrap_or(DEFAULT_RETRY_INTERVAL_MS)
    }

    pub fn default_wait(&self) -> Result<WaitPolicy, ConfigError> {
        match self.config.get_string("lock.default_wait") {
            Ok(raw) => raw.parse().map_err(ConfigError::Message),
            Err(ConfigError::NotFound(_)) => Ok(WaitPolicy::default()),
            Err(e) => Err(e),
        }
    }

    pub fn lock_config(&self) -> Result<LockConfig, ConfigError> {
        Ok(LockConfig::default()
            .with_key_prefix(&self.key_prefix())
            .with_retry_interval_ms(self.retry_interval_ms())
            .with_default_wait(self.default_wait()?))
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> LoggingConfig {
        let mut logging = LoggingConfig::from_config(
            self.config.get_string("logging.dir").ok(),
            self.config.get_bool("logging.console").unwrap_or(true),
            self.config
                .get_string("logging.level")
                .unwrap_or("info".to_string()),
        );
        if let Some(level) = self
            .config
            .get_string("logging.file_level")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            logging.file_level = level;
        }
        if let Ok(rotation) = self.config.get_string("logging.rotation") {
            logging.rotation = rotation.parse().unwrap_or(LogRotation::Daily);
        }
        logging
    }
}

/// Environment source over `vars`.
///
/// `REDILOCK_CONFIG` names the file and is not a setting, so it is dropped.
/// `REDILOCK_LOG_<FIELD>` is mapped onto `logging.<field>`.
fn environment<I>(vars: I) -> Environment
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: Map<String, String> = vars
        .into_iter()
        .filter(|(key, _)| key != CONFIG_FILE_ENV)
        .map(|(key, value)| match key.strip_prefix(LOG_ENV_PREFIX) {
            Some(field) => (format!("{}_LOGGING__{}", ENV_PREFIX, field), value),
            None => (key, value),
        })
        .collect();

    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .source(Some(vars))
}
