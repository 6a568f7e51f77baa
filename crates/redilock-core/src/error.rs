//! Error types for lock operations
//!
//! Contention is not an error: `acquire` reports it as `Ok(None)` and a stale
//! `release` as `Ok(false)`. Everything here means the lock state could not be
//! determined or the call itself was malformed.

/// Failure reported by a [`LockBackend`](crate::backend::LockBackend)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The store could not be reached (I/O, refused or dropped connection, timeout)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The store answered, but not in a way the protocol understands
    #[error("backend protocol error: {0}")]
    Protocol(String),
}

/// Error type for lock manager operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("secure randomness unavailable: {0}")]
    Randomness(String),
}

impl LockError {
    /// Whether the error means "could not reach the store" rather than a bad call
    pub fn is_unavailable(&self) -> bool {
        matches!(self, LockError::Backend(BackendError::Unavailable(_)))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, LockError::Backend(_))
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
