//! Debounced processor notification
//!
//! Writers call [`ProcessorNotifier::notify`] after every append. The
//! notifier forwards at most one wake-up per row log per delay window,
//! collapsing write bursts into a single signal at the cost of bounded
//! notification latency. Wake-up delivery is best-effort: failures are
//! logged and swallowed, never propagated — consumers must poll their
//! queues regardless, so a lost signal costs latency, not data.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use vellum_core::time::Clock;

/// Failure to deliver a wake-up signal
#[derive(Debug, Error)]
#[error("failed to wake processor of row log `{row_log_id}`: {reason}")]
pub struct WakeError {
    /// The row log whose processor could not be woken
    pub row_log_id: String,
    /// Human-readable cause
    pub reason: String,
}

impl WakeError {
    /// Create a wake error
    pub fn new(row_log_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            row_log_id: row_log_id.into(),
            reason: reason.into(),
        }
    }
}

/// Delivery of wake-up signals to remote processors
pub trait ProcessorWaker: Send + Sync {
    /// Send a wake-up for the given row log
    ///
    /// # Errors
    /// Returns an error when the signal could not be delivered; the
    /// notifier treats this as best-effort and swallows it.
    fn wake(&self, row_log_id: &str) -> Result<(), WakeError>;
}

/// Client-side debounce in front of a [`ProcessorWaker`]
pub struct ProcessorNotifier {
    waker: Arc<dyn ProcessorWaker>,
    delay: Duration,
    clock: Arc<dyn Clock>,
    // Next instant (epoch millis) a wake-up may be sent, per row log.
    next_eligible: Mutex<HashMap<String, u64>>,
}

impl ProcessorNotifier {
    /// Create a notifier with the given debounce window
    pub fn new(waker: Arc<dyn ProcessorWaker>, delay: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            waker,
            delay,
            clock,
            next_eligible: Mutex::new(HashMap::new()),
        }
    }

    /// Signal that the row log has new messages
    ///
    /// Returns whether a wake-up was actually sent (false when debounced).
    /// Delivery failures are logged at debug level and swallowed.
    pub fn notify(&self, row_log_id: &str) -> bool {
        let now = self.clock.now_millis();
        {
            let mut next_eligible = self.next_eligible.lock();
            if let Some(&until) = next_eligible.get(row_log_id) {
                if now < until {
                    return false;
                }
            }
            next_eligible.insert(
                row_log_id.to_string(),
                now + self.delay.as_millis() as u64,
            );
        }
        if let Err(e) = self.waker.wake(row_log_id) {
            debug!(row_log_id, error = %e, "processor wake-up failed");
        }
        true
    }
}
