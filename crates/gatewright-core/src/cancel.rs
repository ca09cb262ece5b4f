//! Cooperative cancellation.

use crate::error::MigrationError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A shared cancellation flag, checked between pipeline stages and between
/// per-policy service calls.
///
/// Cloning shares the flag, so a caller can hold one half and hand the other
/// to [`MigrationEngine::migrate_with_cancel`]. Cancellation is cooperative:
/// the run stops at its next checkpoint and partial results are discarded.
///
/// [`MigrationEngine::migrate_with_cancel`]: crate::engine::MigrationEngine::migrate_with_cancel
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    cancelled: Arc<AtomicBool>,
}

impl CancelSignal {
    /// A fresh, uncancelled signal.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Bail out when the flag is set.
    ///
    /// # Errors
    /// Returns [`MigrationError::Cancelled`] iff [`Self::cancel`] has been
    /// called on any clone.
    pub fn checkpoint(&self) -> Result<(), MigrationError> {
        if self.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_signal_passes_checkpoints() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.checkpoint().is_ok());
    }

    #[test]
    fn cancellation_reaches_every_clone() {
        let signal = CancelSignal::new();
        let held = signal.clone();
        signal.cancel();
        assert!(held.is_cancelled());
        assert_eq!(held.checkpoint(), Err(MigrationError::Cancelled));
    }
}
