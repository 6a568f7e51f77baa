//! Ownership tokens
//!
//! A token is the only credential that allows releasing or extending a lock.
//! Tokens carry 128 bits from the operating system's CSPRNG and are never
//! derived from the lock name or the current time.

use std::fmt::{Display, Formatter};

use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{LockError, Result};

/// Number of random bytes in a generated token (128 bits)
pub const TOKEN_BYTES: usize = 16;

/// Opaque ownership token returned by a successful acquisition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(String);

impl LockToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for LockToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for LockToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for LockToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Source of ownership tokens
pub trait TokenGenerator: Send + Sync {
    /// Produce a fresh token.
    ///
    /// # Errors
    /// Returns [`LockError::Randomness`] when no secure randomness is available.
    fn generate(&self) -> Result<LockToken>;
}

/// Token generator backed by the operating system's random source
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenGenerator;

impl TokenGenerator for RandomTokenGenerator {
    fn generate(&self) -> Result<LockToken> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| LockError::Randomness(e.to_string()))?;
        Ok(LockToken(const_hex::encode(bytes)))
    }
}
