/// Listener registration methods
use crate::events::{EventError, EventHandler, EventKind, FnHandler, GameEvent, Payload};
use crate::types::ListenerId;
use super::core::{EventDispatcher, Registration};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

impl<C: Send + 'static> EventDispatcher<C> {
    /// Registers a listener for `kind` with the given priority.
    ///
    /// Higher priorities run first; equal priorities run in registration
    /// order. There is no limit on listeners per kind. A registration made
    /// while a dispatch of the same kind is running only takes effect from the
    /// next dispatch.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strife_event_system::{EventDispatcher, EventKind, FnHandler, GameEvent};
    /// use std::sync::Arc;
    ///
    /// let dispatcher: EventDispatcher<()> = EventDispatcher::new();
    /// let id = dispatcher.register(
    ///     EventKind::DamageCalc,
    ///     Arc::new(FnHandler::new("halve", |event: &mut GameEvent, _ctx: &mut ()| {
    ///         let halved = event.get_i64("modified").unwrap_or(0) / 2;
    ///         event.set("modified", halved);
    ///         Ok(None)
    ///     })),
    ///     10,
    /// );
    /// assert_eq!(dispatcher.listener_count(EventKind::DamageCalc), 1);
    /// assert!(dispatcher.unregister(id));
    /// ```
    pub fn register(&self, kind: EventKind, handler: Arc<dyn EventHandler<C>>, priority: i32) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        let name = handler.handler_name().to_string();

        let mut entry = self.listeners.entry(kind).or_default();
        let position = entry
            .iter()
            .position(|registration| registration.priority < priority)
            .unwrap_or(entry.len());
        entry.insert(position, Registration { id, priority, handler });
        let count = entry.len();
        drop(entry);

        info!("📝 Registered listener '{}' ({}) for {} at priority {} ({} total)", name, id, kind, priority, count);
        id
    }

    /// Registers a synchronous closure as a listener.
    pub fn on<F>(&self, kind: EventKind, priority: i32, name: &str, handler: F) -> ListenerId
    where
        F: Fn(&mut GameEvent, &mut C) -> Result<Option<Payload>, EventError> + Send + Sync + 'static,
    {
        self.register(kind, Arc::new(FnHandler::new(name, handler)), priority)
    }

    /// Detaches a single listener. Returns false if the id was unknown.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut removed = None;
        for mut entry in self.listeners.iter_mut() {
            if let Some(position) = entry.value().iter().position(|registration| registration.id == id) {
                entry.value_mut().remove(position);
                removed = Some(*entry.key());
                break;
            }
        }

        match removed {
            Some(kind) => {
                self.listeners.remove_if(&kind, |_, registrations| registrations.is_empty());
                debug!("🗑️ Unregistered {} from {}", id, kind);
                true
            }
            None => false,
        }
    }

    /// Removes every listener for `kind`, returning how many were removed.
    pub fn remove_listeners(&self, kind: EventKind) -> usize {
        let removed = self
            .listeners
            .remove(&kind)
            .map(|(_, registrations)| registrations.len())
            .unwrap_or(0);
        if removed > 0 {
            debug!("🗑️ Removed {} listeners from {}", removed, kind);
        }
        removed
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(|entry| entry.value().len()).unwrap_or(0)
    }
}
