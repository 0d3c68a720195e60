//! Time source for issuance and expiration checks.

use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

/// Source of the current epoch time.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

/// System clock using the OS time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

/// Clock frozen at a settable instant, for tests and replay tooling.
#[derive(Debug, Default)]
pub struct FixedClock {
    timestamp: AtomicI64,
}

impl FixedClock {
    /// Creates a clock frozen at `timestamp`.
    pub fn new(timestamp: i64) -> Self {
        Self {
            timestamp: AtomicI64::new(timestamp),
        }
    }

    /// Moves the clock to `timestamp`.
    pub fn set(&self, timestamp: i64) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: i64) {
        self.timestamp.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.timestamp.load(Ordering::SeqCst)
    }
}
