//! Cooperative cancellation
//!
//! Indexer dispatch is synchronous and sequential; cancellation is not
//! supported mid-operation, but a caller-level interrupt must be observable
//! at the record-read step and at each indexer call boundary. The
//! [`CancelToken`] is the handle for that: long-running loops check it at
//! those boundaries and bail out with [`crate::Error::Interrupted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Shared flag for cooperative interruption
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; observable by every clone of this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bail out with [`Error::Interrupted`] when cancelled
    ///
    /// # Errors
    /// Returns [`Error::Interrupted`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}
