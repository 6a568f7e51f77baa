//! Redilock Redis - Redis backend for the lock protocol
//!
//! This crate provides:
//! - `RedisBackend`: `SET NX PX` acquisition and Lua-scripted token checks
//! - `RedisConfig`: connection URL and timeouts
//! - Redis error classification into transport vs protocol failures

pub mod backend;
pub mod config;

pub use backend::{RedisBackend, classify};
pub use config::{DEFAULT_REDIS_URL, RedisConfig};
