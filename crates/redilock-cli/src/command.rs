//! Command execution

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, ensure};
use rand::Rng;
use redilock_core::{LockBackend, LockManager, LockToken, MemoryBackend, WaitPolicy};
use redilock_redis::RedisBackend;
use tracing::info;

use crate::config::{Command, Configuration};

/// Exit status when a lock could not be acquired or was not held by the token
pub const EXIT_NOT_HELD: u8 = 2;

/// Sweep period for expired records of the in-process backend
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(1);

pub async fn run(command: Command, configuration: &Configuration) -> anyhow::Result<ExitCode> {
    match command {
        Command::Acquire { name, ttl_ms, wait } => {
            let manager = redis_manager(configuration).await?;
            let wait = wait.unwrap_or(manager.config().default_wait);
            match manager
                .acquire_with(&name, Duration::from_millis(ttl_ms), wait)
                .await?
            {
                Some(token) => {
                    println!("{}", token);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    eprintln!("lock '{}' is held by another owner", name);
                    Ok(ExitCode::from(EXIT_NOT_HELD))
                }
            }
        }
        Command::Release { name, token } => {
            let manager = redis_manager(configuration).await?;
            let released = manager.release(&name, &LockToken::from(token)).await?;
            Ok(report(released))
        }
        Command::Extend {
            name,
            token,
            ttl_ms,
        } => {
            let manager = redis_manager(configuration).await?;
            let extended = manager
                .extend(&name, &LockToken::from(token), Duration::from_millis(ttl_ms))
                .await?;
            Ok(report(extended))
        }
        Command::Demo { memory, name } => {
            let name = name.unwrap_or_else(|| format!("my_lock_{}", rand_suffix()));
            if memory {
                let backend = Arc::new(MemoryBackend::new());
                let manager = build_manager(configuration, backend.clone())?;
                let purge = backend.spawn_purge(MEMORY_PURGE_INTERVAL);
                let result = run_demo(&manager, &name).await;
                purge.abort();
                result?;
            } else {
                let manager = redis_manager(configuration).await?;
                run_demo(&manager, &name).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn report(held: bool) -> ExitCode {
    println!("{}", held);
    if held {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_HELD)
    }
}

pub fn build_manager(
    configuration: &Configuration,
    backend: Arc<dyn LockBackend>,
) -> anyhow::Result<LockManager> {
    let lock_config = configuration
        .lock_config()
        .context("invalid lock configuration")?;
    Ok(LockManager::new(backend).with_config(lock_config))
}

async fn redis_manager(configuration: &Configuration) -> anyhow::Result<LockManager> {
    let redis_config = configuration.redis_config();
    let backend = RedisBackend::connect(&redis_config)
        .await
        .context("failed to connect to redis")?;
    build_manager(configuration, Arc::new(backend))
}

fn rand_suffix() -> u32 {
    rand::rng().random_range(0..=1000)
}

/// Walk through contention, a bounded wait and token-gated release on one lock.
///
/// Fails on the first step that does not behave as expected.
pub async fn run_demo(manager: &LockManager, name: &str) -> anyhow::Result<()> {
    info!(lock = name, "Step 1: locking for 5 minutes");
    let token = manager
        .acquire_with(name, Duration::from_secs(300), WaitPolicy::NoWait)
        .await?;
    let Some(token) = token else {
        anyhow::bail!("lock '{}' is already held, pick another name", name);
    };

    info!(lock = name, "Step 2: locking again without waiting");
    let result = manager
        .acquire_with(name, Duration::from_secs(5), WaitPolicy::NoWait)
        .await?;
    ensure!(result.is_none(), "no-wait acquire of a held lock succeeded");

    info!(lock = name, "Step 3: locking again with a 1s wait");
    let result = manager
        .acquire_with(name, Duration::from_secs(5), WaitPolicy::bounded_ms(1000))
        .await?;
    ensure!(result.is_none(), "bounded-wait acquire of a held lock succeeded");

    info!(lock = name, "Step 4: unlocking with the wrong key");
    let released = manager
        .release(name, &LockToken::from("wrong-key"))
        .await?;
    ensure!(!released, "release with the wrong key succeeded");

    info!(lock = name, "Step 5: unlocking with the correct key");
    let released = manager.release(name, &token).await?;
    ensure!(released, "release with the correct key failed");

    info!(lock = name, "Step 6: locking for 5 seconds");
    let again = manager.acquire(name, Duration::from_secs(5)).await?;
    let Some(again) = again else {
        anyhow::bail!("acquire after release failed");
    };
    manager.release(name, &again).await?;

    info!(lock = name, stats = ?manager.stats(), "Demo finished");
    Ok(())
}
