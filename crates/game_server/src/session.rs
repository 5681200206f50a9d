//! A single live game session and its command worker.
//!
//! Every session owns one [`GameState`] behind an async mutex and one bounded
//! inbound queue. A dedicated worker task drains the queue in FIFO order and
//! runs each command to completion while holding the state lock, so no two
//! mutations of the same session ever interleave. Different sessions have
//! independent workers and locks and progress in parallel.

use crate::error::{ServerError, SubmitRejected};
use crate::messaging::route_command;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strife_event_system::{panic_message, EventId, EventKind, GameEvent, SessionId};
use strife_game::{GameSnapshot, GameState};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome reported for one processed command: an acknowledgement or the
/// reason it was rejected.
pub type CommandResult = Result<(), String>;

struct QueuedCommand {
    event: GameEvent,
    reply: oneshot::Sender<CommandResult>,
}

/// Handle returned for an accepted command. Await [`outcome`](Self::outcome)
/// for the worker's verdict.
#[derive(Debug)]
pub struct CommandReceipt {
    pub event_id: EventId,
    pub kind: EventKind,
    receiver: oneshot::Receiver<CommandResult>,
}

impl CommandReceipt {
    /// Waits until the worker has processed the command.
    ///
    /// A command still queued when its session ends is reported as an error.
    pub async fn outcome(self) -> CommandResult {
        self.receiver
            .await
            .unwrap_or_else(|_| Err("session ended before the command was processed".to_string()))
    }
}

#[derive(Debug, Default)]
struct SessionCounters {
    processed: AtomicU64,
    rejected: AtomicU64,
    faults: AtomicU64,
}

/// Point-in-time view of one session's activity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStats {
    pub session_id: SessionId,
    pub age: Duration,
    pub is_active: bool,
    pub commands_processed: u64,
    pub commands_rejected: u64,
    pub faults: u64,
}

/// One live game session.
pub struct GameSession {
    session_id: SessionId,
    created_at: Instant,
    state: Arc<Mutex<GameState>>,
    sender: mpsc::Sender<QueuedCommand>,
    stop: broadcast::Sender<()>,
    is_active: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    counters: Arc<SessionCounters>,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("session_id", &self.session_id)
            .field("created_at", &self.created_at)
            .field("is_active", &self.is_active())
            .finish()
    }
}

impl GameSession {
    /// Creates the session and spawns its worker.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Identifier the manager registered this session under
    /// * `state` - Freshly built game state the worker will own
    /// * `queue_capacity` - Bound of the inbound command queue
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(session_id: SessionId, state: GameState, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_capacity.max(1));
        let (stop, stop_rx) = broadcast::channel(1);
        let state = Arc::new(Mutex::new(state));
        let counters = Arc::new(SessionCounters::default());

        let worker = tokio::spawn(run_worker(
            session_id.clone(),
            Arc::clone(&state),
            receiver,
            stop_rx,
            Arc::clone(&counters),
        ));
        info!("🎮 Session {} started", session_id);

        Self {
            session_id,
            created_at: Instant::now(),
            state,
            sender,
            stop,
            is_active: AtomicBool::new(true),
            worker: Mutex::new(Some(worker)),
            counters,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Time since creation, measured against `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Acquire)
    }

    /// Hands `event` to the worker without waiting for it to be processed.
    ///
    /// Fails when the session is no longer active or its queue is full; the
    /// event comes back with its error set.
    pub fn submit(&self, event: GameEvent) -> Result<CommandReceipt, SubmitRejected> {
        if !self.is_active() {
            return Err(self.reject(event, ServerError::SessionNotFound(self.session_id.clone())));
        }

        let (reply, receiver) = oneshot::channel();
        let (event_id, kind) = (event.id, event.kind);
        match self.sender.try_send(QueuedCommand { event, reply }) {
            Ok(()) => {
                debug!("📥 Session {} queued {} ({})", self.session_id, kind, event_id);
                Ok(CommandReceipt {
                    event_id,
                    kind,
                    receiver,
                })
            }
            Err(TrySendError::Full(queued)) => Err(self.reject(
                queued.event,
                ServerError::QueueFault(format!("command queue of session {} is full", self.session_id)),
            )),
            Err(TrySendError::Closed(queued)) => {
                Err(self.reject(queued.event, ServerError::SessionNotFound(self.session_id.clone())))
            }
        }
    }

    fn reject(&self, event: GameEvent, error: ServerError) -> SubmitRejected {
        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        warn!("⚠️ Session {} rejected {}: {}", self.session_id, event.kind, error);
        SubmitRejected::new(event, error)
    }

    /// Exclusive access to the game state.
    ///
    /// Shares the worker's lock, so holding the guard pauses command
    /// processing for this session.
    pub async fn state(&self) -> MutexGuard<'_, GameState> {
        self.state.lock().await
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn team_system_activate(&self) -> bool {
        self.state.lock().await.team_system_activate()
    }

    pub async fn team_system_deactivate(&self) -> bool {
        self.state.lock().await.team_system_deactivate()
    }

    pub fn stats(&self, now: Instant) -> SessionStats {
        SessionStats {
            session_id: self.session_id.clone(),
            age: self.age_at(now),
            is_active: self.is_active(),
            commands_processed: self.counters.processed.load(Ordering::Relaxed),
            commands_rejected: self.counters.rejected.load(Ordering::Relaxed),
            faults: self.counters.faults.load(Ordering::Relaxed),
        }
    }

    /// Stops the worker and waits for it to exit.
    ///
    /// A command already being processed runs to completion; commands still
    /// queued are answered with an error. Safe to call more than once and
    /// from several tasks at once; every caller waits for the worker to exit.
    pub async fn cleanup(&self) {
        if self.is_active.swap(false, Ordering::AcqRel) {
            // No receiver left means the worker has already exited.
            let _ = self.stop.send(());
        }

        // Held across the join so a concurrent cleanup returns only after the
        // worker has exited.
        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.take() {
            if let Err(e) = handle.await {
                error!("❌ Worker of session {} did not exit cleanly: {}", self.session_id, e);
            }
            info!("🧹 Session {} cleaned up", self.session_id);
        }
    }
}

async fn run_worker(
    session_id: SessionId,
    state: Arc<Mutex<GameState>>,
    mut receiver: mpsc::Receiver<QueuedCommand>,
    mut stop: broadcast::Receiver<()>,
    counters: Arc<SessionCounters>,
) {
    loop {
        let queued = tokio::select! {
            biased;
            _ = stop.recv() => break,
            next = receiver.recv() => match next {
                Some(queued) => queued,
                None => break,
            },
        };

        let outcome = process_command(&session_id, &state, queued.event, &counters).await;
        counters.processed.fetch_add(1, Ordering::Relaxed);
        // The submitter may have stopped waiting.
        let _ = queued.reply.send(outcome);
    }

    receiver.close();
    let mut abandoned = 0usize;
    while let Ok(queued) = receiver.try_recv() {
        abandoned += 1;
        let _ = queued
            .reply
            .send(Err(ServerError::SessionNotFound(session_id.clone()).to_string()));
    }
    if abandoned > 0 {
        warn!("⚠️ Session {} ended with {} unprocessed commands", session_id, abandoned);
    }
    debug!("Worker of session {} stopped", session_id);
}

async fn process_command(
    session_id: &SessionId,
    state: &Mutex<GameState>,
    event: GameEvent,
    counters: &SessionCounters,
) -> CommandResult {
    let mut guard = state.lock().await;
    let result = AssertUnwindSafe(route_command(&mut guard, &event)).catch_unwind().await;
    drop(guard);

    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!("Session {} refused {}: {}", session_id, event.kind, e);
            Err(e.to_string())
        }
        Err(panic) => {
            counters.faults.fetch_add(1, Ordering::Relaxed);
            let fault = ServerError::FatalSessionFault(panic_message(panic.as_ref()));
            error!("💥 Session {} failed on {} ({}): {}", session_id, event.kind, event.id, fault);
            Err(fault.to_string())
        }
    }
}
