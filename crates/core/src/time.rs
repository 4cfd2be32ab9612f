//! Injectable time
//!
//! Lease expiry and notification debouncing are both clock-driven, and the
//! lock acquisition loop sleeps between polls. Both concerns go through the
//! [`Clock`] trait so tests can simulate time without real delays.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of time and sleeping, injectable for tests
pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch
    fn now_millis(&self) -> u64;

    /// Block the calling thread for the given duration
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock for tests
///
/// `sleep` advances the clock instead of blocking, so polling loops run
/// instantly under test.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<u64>,
}

impl ManualClock {
    /// Create a clock starting at the given epoch-millis instant
    pub fn at(now_millis: u64) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now_millis),
        })
    }

    /// Advance the clock by the given number of milliseconds
    pub fn advance(&self, millis: u64) {
        *self.now.lock() += millis;
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        *self.now.lock()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_millis() as u64);
    }
}
