//! Session registry with bounded admission and idle reclamation.
//!
//! The [`GameManager`] owns every live [`GameSession`]. Admission is bounded
//! by a pool of semaphore permits: each registered session holds one permit
//! for its whole lifetime, and the permit goes back to the pool only after
//! the session has been cleaned up and removed. The registry itself is a
//! sharded concurrent map, independent of any session's state lock.

use crate::config::ServerConfig;
use crate::error::{ServerError, SubmitRejected};
use crate::messaging::InboundCommand;
use crate::session::{CommandReceipt, GameSession};
use crate::shutdown::ShutdownState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strife_event_system::{GameEvent, SessionId};
use strife_game::{DiceRoller, GameState, NoopBroadcaster, StateBroadcaster};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};
use tracing::{debug, error, info, warn};

struct SessionSlot {
    session: Arc<GameSession>,
    _permit: OwnedSemaphorePermit,
}

/// Registry-wide counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerStats {
    pub live_sessions: usize,
    pub available_slots: usize,
    pub sessions_created: u64,
    pub sessions_ended: u64,
    pub sessions_reclaimed: u64,
}

/// Creates, looks up and ends game sessions.
pub struct GameManager {
    config: ServerConfig,
    sessions: DashMap<SessionId, SessionSlot>,
    admission: Arc<Semaphore>,
    broadcaster: Arc<dyn StateBroadcaster>,
    dice: Option<Arc<dyn DiceRoller>>,
    shutdown: ShutdownState,
    sessions_created: AtomicU64,
    sessions_ended: AtomicU64,
    sessions_reclaimed: AtomicU64,
}

impl std::fmt::Debug for GameManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameManager")
            .field("max_sessions", &self.config.max_sessions)
            .field("live_sessions", &self.sessions.len())
            .finish()
    }
}

impl GameManager {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            admission: Arc::new(Semaphore::new(config.max_sessions)),
            config,
            sessions: DashMap::new(),
            broadcaster: Arc::new(NoopBroadcaster),
            dice: None,
            shutdown: ShutdownState::new(),
            sessions_created: AtomicU64::new(0),
            sessions_ended: AtomicU64::new(0),
            sessions_reclaimed: AtomicU64::new(0),
        }
    }

    /// Outbound seam every new session's state publishes snapshots through.
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn StateBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Random source for every new session instead of the default dice.
    pub fn with_dice(mut self, dice: Arc<dyn DiceRoller>) -> Self {
        self.dice = Some(dice);
        self
    }

    /// Shares an externally owned shutdown state, e.g. the binary's.
    pub fn with_shutdown_state(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn shutdown_state(&self) -> &ShutdownState {
        &self.shutdown
    }

    fn build_state(&self, session_id: SessionId) -> GameState {
        let state = GameState::new(session_id, self.config.rules.clone()).with_broadcaster(Arc::clone(&self.broadcaster));
        match &self.dice {
            Some(dice) => state.with_dice(Arc::clone(dice)),
            None => state,
        }
    }

    /// Creates and registers a session under `session_id`.
    ///
    /// The duplicate check, permit acquisition and insertion happen under
    /// the id's registry entry, so concurrent creations can neither share an
    /// id nor exceed `max_sessions`.
    ///
    /// # Errors
    ///
    /// * [`ServerError::DuplicateSession`] - a live session already uses the id
    /// * [`ServerError::CapacityExhausted`] - no admission permit is free
    /// * [`ServerError::ShuttingDown`] - shutdown has been initiated
    pub async fn create_session(&self, session_id: SessionId) -> Result<Arc<GameSession>, ServerError> {
        if self.shutdown.is_shutdown_initiated() {
            return Err(ServerError::ShuttingDown);
        }

        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => {
                warn!("⚠️ Session {} already exists", session_id);
                Err(ServerError::DuplicateSession(session_id))
            }
            Entry::Vacant(vacant) => {
                let permit = Arc::clone(&self.admission).try_acquire_owned().map_err(|_| {
                    warn!("🚫 Capacity exhausted, refusing session {}", session_id);
                    ServerError::CapacityExhausted {
                        max: self.config.max_sessions,
                    }
                })?;

                let state = self.build_state(session_id.clone());
                let session = Arc::new(GameSession::start(session_id, state, self.config.queue_capacity));
                vacant.insert(SessionSlot {
                    session: Arc::clone(&session),
                    _permit: permit,
                });
                self.sessions_created.fetch_add(1, Ordering::Relaxed);
                Ok(session)
            }
        }
    }

    /// Creates a session under a freshly generated id.
    pub async fn create_session_with_generated_id(&self) -> Result<Arc<GameSession>, ServerError> {
        self.create_session(SessionId::generate()).await
    }

    pub fn get_session(&self, session_id: &SessionId) -> Option<Arc<GameSession>> {
        self.sessions.get(session_id).map(|slot| Arc::clone(&slot.session))
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|slot| slot.key().clone()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    /// Routes `event` to the session's queue without waiting for it to run.
    pub fn submit(&self, session_id: &SessionId, event: GameEvent) -> Result<CommandReceipt, SubmitRejected> {
        match self.get_session(session_id) {
            Some(session) => session.submit(event),
            None => {
                warn!("⚠️ No session {} for {}", session_id, event.kind);
                Err(SubmitRejected::new(event, ServerError::SessionNotFound(session_id.clone())))
            }
        }
    }

    pub fn submit_command(&self, command: InboundCommand) -> Result<CommandReceipt, SubmitRejected> {
        let session_id = command.session_id.clone();
        self.submit(&session_id, command.into_event())
    }

    /// Ends a session: stops intake, waits for the in-flight command, then
    /// unregisters it and frees its admission permit.
    pub async fn end_session(&self, session_id: &SessionId) -> Result<(), ServerError> {
        let session = self
            .get_session(session_id)
            .ok_or_else(|| ServerError::SessionNotFound(session_id.clone()))?;

        session.cleanup().await;

        // A newer session may have taken the id once an earlier end removed it.
        let removed = self
            .sessions
            .remove_if(session_id, |_, slot| Arc::ptr_eq(&slot.session, &session));
        match removed {
            Some((_, slot)) => {
                drop(slot);
                self.sessions_ended.fetch_add(1, Ordering::Relaxed);
                info!("🔚 Session {} ended", session_id);
                Ok(())
            }
            None => Err(ServerError::SessionNotFound(session_id.clone())),
        }
    }

    /// Ends every session older than the configured idle timeout.
    pub async fn reclaim_idle(&self) -> Vec<SessionId> {
        self.reclaim_idle_at(Instant::now()).await
    }

    /// Ends every session whose age at `now` exceeds the idle timeout and
    /// returns their ids. Younger sessions are left alone.
    pub async fn reclaim_idle_at(&self, now: Instant) -> Vec<SessionId> {
        let timeout = self.config.idle_timeout();
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|slot| slot.session.age_at(now) > timeout)
            .map(|slot| slot.key().clone())
            .collect();

        let mut reclaimed = Vec::with_capacity(expired.len());
        for session_id in expired {
            match self.end_session(&session_id).await {
                Ok(()) => {
                    self.sessions_reclaimed.fetch_add(1, Ordering::Relaxed);
                    reclaimed.push(session_id);
                }
                Err(e) => debug!("Session {} was ended elsewhere: {}", session_id, e),
            }
        }
        if !reclaimed.is_empty() {
            info!("♻️ Reclaimed {} idle sessions", reclaimed.len());
        }
        reclaimed
    }

    /// Starts the periodic idle sweep.
    ///
    /// The loop checks the shutdown state before and after each tick wait
    /// and exits once shutdown has been initiated. Returns `None` when
    /// `sweep_interval_secs` is 0.
    pub fn start_idle_sweep(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        if self.config.sweep_interval_secs == 0 {
            return None; // Sweep disabled
        }

        let manager = Arc::clone(self);
        let shutdown = self.shutdown.clone();
        let period = self.config.sweep_interval();

        Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                if shutdown.is_shutdown_initiated() {
                    info!("🕒 Idle sweep stopping - shutdown initiated");
                    break;
                }

                ticker.tick().await;

                if shutdown.is_shutdown_initiated() {
                    info!("🕒 Idle sweep stopping - shutdown initiated during tick wait");
                    break;
                }

                let reclaimed = manager.reclaim_idle().await;
                debug!(
                    "Idle sweep done: {} reclaimed, {} live",
                    reclaimed.len(),
                    manager.session_count()
                );
            }

            info!("✅ Idle sweep loop completed gracefully");
        }))
    }

    /// Refuses new sessions, then ends every live one.
    pub async fn shutdown_all(&self) {
        self.shutdown.initiate_shutdown();

        for session_id in self.session_ids() {
            if let Err(e) = self.end_session(&session_id).await {
                error!("❌ Failed to end session {} during shutdown: {}", session_id, e);
            }
        }

        self.shutdown.complete_shutdown();
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            live_sessions: self.sessions.len(),
            available_slots: self.admission.available_permits(),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_ended: self.sessions_ended.load(Ordering::Relaxed),
            sessions_reclaimed: self.sessions_reclaimed.load(Ordering::Relaxed),
        }
    }
}
