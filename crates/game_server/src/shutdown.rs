//! Shutdown coordination for graceful server shutdown.
//!
//! Shared between the session manager (session creation and the idle sweep)
//! and the binary's signal handling. Once shutdown is initiated no new
//! sessions are admitted; live sessions are drained by `shutdown_all`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Shared shutdown state for coordinating graceful shutdown across components.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    /// Set once shutdown begins - no new sessions are admitted
    shutdown_initiated: Arc<AtomicBool>,
    /// Set once every session has been cleaned up
    shutdown_complete: Arc<AtomicBool>,
}

impl ShutdownState {
    /// Creates a new shutdown state with both flags set to false.
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Returns true once all sessions have been torn down.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Initiates shutdown. Idempotent.
    pub fn initiate_shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::AcqRel) {
            info!("🛑 Shutdown initiated - no new sessions will be admitted");
        }
    }

    /// Marks shutdown as complete.
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
        info!("✅ All sessions drained - ready for final cleanup");
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_flags_are_shared_between_clones() {
        let state = ShutdownState::new();
        let observer = state.clone();
        assert!(!observer.is_shutdown_initiated());

        state.initiate_shutdown();
        state.initiate_shutdown();
        assert!(observer.is_shutdown_initiated());
        assert!(!observer.is_shutdown_complete());

        state.complete_shutdown();
        assert!(observer.is_shutdown_complete());
    }
}
