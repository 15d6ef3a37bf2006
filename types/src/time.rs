//! Timestamps and the clock abstraction.
//!
//! Timestamps are Unix epoch seconds (UTC). Everything that needs "now" takes
//! a [`Clock`] so tests can substitute a deterministic one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in seconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn new(secs: u64) -> Self {
        Self(secs)
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A system clock set before 1970 reads as the epoch.
    pub fn now() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self(secs)
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    /// Seconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_secs: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_secs)
    }

    pub fn saturating_add(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}
