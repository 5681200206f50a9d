/// Core EventDispatcher implementation
use crate::events::{EventHandler, EventKind};
use crate::types::ListenerId;
use super::stats::DispatcherStats;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One listener entry: the handler plus its ordering key.
pub(super) struct Registration<C> {
    pub(super) id: ListenerId,
    pub(super) priority: i32,
    pub(super) handler: Arc<dyn EventHandler<C>>,
}

impl<C> Clone for Registration<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            handler: Arc::clone(&self.handler),
        }
    }
}

/// Per-session registry of priority-ordered listeners keyed by [`EventKind`].
///
/// Listener lists are kept sorted by descending priority, with ties in
/// registration order, so dispatch is a straight walk over a snapshot of the
/// list. `C` is the context handed mutably to every listener.
///
/// Uses DashMap so registration through a shared `Arc` never needs an outer
/// lock, including registration from inside a running listener.
pub struct EventDispatcher<C> {
    /// Map of event kinds to their ordered listener lists
    pub(super) listeners: DashMap<EventKind, Vec<Registration<C>>>,
    /// Source of listener ids; monotonically increasing
    pub(super) next_listener_id: AtomicU64,
    /// Number of dispatch calls since creation
    pub(super) events_dispatched: AtomicU64,
    /// Number of listener invocations that failed or panicked
    pub(super) listener_faults: AtomicU64,
}

impl<C> std::fmt::Debug for EventDispatcher<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("kinds", &self.listeners.len())
            .field("events_dispatched", &self.events_dispatched.load(Ordering::Relaxed))
            .field("listener_faults", &self.listener_faults.load(Ordering::Relaxed))
            .finish()
    }
}

impl<C> EventDispatcher<C> {
    /// Creates a new dispatcher with no registered listeners.
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            events_dispatched: AtomicU64::new(0),
            listener_faults: AtomicU64::new(0),
        }
    }

    /// Gets the current dispatcher statistics
    #[inline]
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            total_listeners: self.listeners.iter().map(|entry| entry.value().len()).sum(),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            listener_faults: self.listener_faults.load(Ordering::Relaxed),
        }
    }
}

impl<C> Default for EventDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}
