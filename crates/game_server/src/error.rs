//! Error types and handling for the session layer.
//!
//! Capacity problems are recovered at the manager (the session is simply not
//! created), queue problems are reported to the submitter, and faults inside
//! a session's locked mutation step are contained to that one command.

use strife_event_system::{GameEvent, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    /// Every admission token is in use
    #[error("Session capacity exhausted ({max} live sessions)")]
    CapacityExhausted { max: usize },

    /// A live session already uses this id
    #[error("Session already exists: {0}")]
    DuplicateSession(SessionId),

    /// No live session with this id, or the session is shutting down
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The command could not be enqueued
    #[error("Queue fault: {0}")]
    QueueFault(String),

    /// Unexpected failure inside a session's locked mutation step
    #[error("Fatal session fault: {0}")]
    FatalSessionFault(String),

    /// The server is shutting down and accepts no new sessions
    #[error("Server is shutting down")]
    ShuttingDown,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// A command that never reached a session queue.
///
/// The event comes back to the submitter with its `error` set, which also
/// marks it canceled.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SubmitRejected {
    pub event: GameEvent,
    pub error: ServerError,
}

impl SubmitRejected {
    pub(crate) fn new(mut event: GameEvent, error: ServerError) -> Self {
        event.set_error(error.to_string());
        Self { event, error }
    }
}
