//! Redilock CLI - operator tool for distributed locks
//!
//! Wires the lock manager to Redis through layered configuration and
//! structured logging.

pub mod command;
pub mod config;
pub mod logging;

pub use command::{build_manager, run, run_demo};
pub use config::{Cli, Command, Configuration};
pub use logging::{LoggingConfig, LoggingGuard, init_logging};
