/// Statistics tracking for the event dispatcher
use serde::{Deserialize, Serialize};

/// Dispatcher counters for monitoring a session's listener chains
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Number of currently registered listeners across all kinds
    pub total_listeners: usize,
    /// Total number of dispatch calls since creation
    pub events_dispatched: u64,
    /// Listener invocations that returned an error or panicked
    pub listener_faults: u64,
}
