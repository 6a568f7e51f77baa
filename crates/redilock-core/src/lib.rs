//! Redilock Core - distributed mutual-exclusion lock protocol
//!
//! This crate provides:
//! - `LockManager`: acquire (no-wait / indefinite / bounded wait), release, extend
//! - `LockBackend`: the atomic store operations the protocol relies on
//! - `MemoryBackend`: in-process backend with TTL expiry
//! - Ownership token generation
//! - Injectable clock for deterministic tests
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use redilock_core::{LockManager, MemoryBackend, WaitPolicy};
//!
//! let manager = LockManager::new(Arc::new(MemoryBackend::new()));
//! if let Some(token) = manager
//!     .acquire_with("orders", Duration::from_secs(30), WaitPolicy::NoWait)
//!     .await?
//! {
//!     // critical section
//!     manager.release("orders", &token).await?;
//! }
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod stats;
pub mod token;
pub mod wait;

pub use backend::{LockBackend, MemoryBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LockConfig;
pub use error::{BackendError, LockError, Result};
pub use manager::LockManager;
pub use stats::LockStats;
pub use token::{LockToken, RandomTokenGenerator, TokenGenerator};
pub use wait::WaitPolicy;
