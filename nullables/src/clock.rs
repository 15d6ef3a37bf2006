//! Nullable clock: deterministic time for testing.

use std::sync::atomic::{AtomicU64, Ordering};

use liquid_types::{Clock, Timestamp};

/// A deterministic clock for testing.
///
/// Time only advances when you tell it to. Shareable across tasks.
#[derive(Debug, Default)]
pub struct NullClock {
    current: AtomicU64,
}

impl NullClock {
    pub fn new(initial_secs: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_secs),
        }
    }

    /// Advance time by a number of seconds.
    pub fn advance(&self, secs: u64) {
        self.current.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the time to a specific value.
    pub fn set(&self, secs: u64) {
        self.current.store(secs, Ordering::SeqCst);
    }
}

impl Clock for NullClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.current.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_moves_when_told() {
        let clock = NullClock::new(100);
        assert_eq!(clock.now(), Timestamp::new(100));
        clock.advance(5);
        assert_eq!(clock.now(), Timestamp::new(105));
        clock.set(7);
        assert_eq!(clock.now(), Timestamp::new(7));
    }
}
