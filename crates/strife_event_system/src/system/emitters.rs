/// Event dispatch methods
use crate::events::{EventError, EventKind, GameEvent, Payload};
use crate::utils::panic_message;
use super::core::EventDispatcher;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use tracing::{debug, error, trace};

impl<C: Send + 'static> EventDispatcher<C> {
    /// Builds an event from `payload`, runs the listener chain for `kind`
    /// against it, and hands the event back to the caller.
    ///
    /// With no listeners for `kind` the payload comes back unchanged.
    pub async fn dispatch(&self, kind: EventKind, payload: Payload, ctx: &mut C) -> GameEvent {
        let mut event = GameEvent::new(kind, payload);
        self.dispatch_event(&mut event, ctx).await;
        event
    }

    /// Runs the listener chain for `event.kind` against an existing event.
    ///
    /// Listeners run one at a time in priority order over a snapshot of the
    /// list taken before the first one starts. A listener that returns an
    /// error or panics is isolated: the event is rolled back to its state
    /// before that listener ran, the fault is counted and logged, and the next
    /// listener runs. Cancelation does not stop the chain; callers inspect
    /// [`GameEvent::is_canceled`] afterwards.
    pub async fn dispatch_event(&self, event: &mut GameEvent, ctx: &mut C) {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);

        let snapshot = self
            .listeners
            .get(&event.kind)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        if snapshot.is_empty() {
            trace!("No listeners for {}", event.kind);
            return;
        }

        debug!("📤 Dispatching {} ({}) to {} listeners", event.kind, event.id, snapshot.len());

        for registration in snapshot {
            let checkpoint = event.checkpoint();
            let outcome = AssertUnwindSafe(registration.handler.handle(event, ctx))
                .catch_unwind()
                .await;

            let fault = match outcome {
                Ok(Ok(Some(delta))) => {
                    event.merge(delta);
                    None
                }
                Ok(Ok(None)) => None,
                Ok(Err(e)) => Some(e),
                Err(panic) => Some(EventError::HandlerPanicked(panic_message(panic.as_ref()))),
            };

            if let Some(e) = fault {
                event.restore(checkpoint);
                self.listener_faults.fetch_add(1, Ordering::Relaxed);
                error!(
                    "❌ Listener '{}' ({}) failed on {}: {}",
                    registration.handler.handler_name(),
                    registration.id,
                    event.kind,
                    e
                );
            }
        }
    }
}
