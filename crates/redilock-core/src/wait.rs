//! Wait policy for contended acquisitions

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How `acquire` behaves when the lock is already held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Single attempt, never blocks
    NoWait,
    /// Retry until the lock is acquired
    #[default]
    Indefinite,
    /// Retry until the lock is acquired or the timeout elapses
    BoundedWait(Duration),
}

impl WaitPolicy {
    pub fn bounded_ms(timeout_ms: u64) -> Self {
        WaitPolicy::BoundedWait(Duration::from_millis(timeout_ms))
    }

    pub fn timeout(&self) -> Option<Duration> {
        match self {
            WaitPolicy::BoundedWait(timeout) => Some(*timeout),
            _ => None,
        }
    }
}

impl Display for WaitPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitPolicy::NoWait => write!(f, "no-wait"),
            WaitPolicy::Indefinite => write!(f, "indefinite"),
            WaitPolicy::BoundedWait(timeout) => write!(f, "{}ms", timeout.as_millis()),
        }
    }
}

impl FromStr for WaitPolicy {
    type Err = String;

    /// Accepts `no-wait`, `indefinite`, or a timeout such as `1500`, `1500ms`, `2s`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_lowercase();
        match value.as_str() {
            "no-wait" | "nowait" | "no_wait" | "none" => return Ok(WaitPolicy::NoWait),
            "indefinite" | "forever" => return Ok(WaitPolicy::Indefinite),
            _ => {}
        }

        let parse = |digits: &str| {
            digits
                .parse::<u64>()
                .map_err(|_| format!("invalid wait policy: {}", s))
        };

        if let Some(ms) = value.strip_suffix("ms") {
            Ok(WaitPolicy::bounded_ms(parse(ms)?))
        } else if let Some(secs) = value.strip_suffix('s') {
            Ok(WaitPolicy::BoundedWait(Duration::from_secs(parse(secs)?)))
        } else {
            Ok(WaitPolicy::bounded_ms(parse(&value)?))
        }
    }
}

impl Serialize for WaitPolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WaitPolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
