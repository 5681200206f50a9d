//! # Core Type Definitions
//!
//! Identifier types shared by the dispatcher, the game rules and the session
//! layer.
//!
//! ## Key Types
//!
//! - [`EventId`] - Unique identifier generated for every dispatched event
//! - [`PlayerId`] - Transport-supplied identifier of a player within a session
//! - [`SessionId`] - Caller-trusted identifier of a game session
//! - [`ListenerId`] - Handle returned by listener registration, used to detach
//!
//! Wrapper types keep the different identifiers from being confused with one
//! another while still serializing as plain strings/numbers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a single [`GameEvent`](crate::GameEvent).
///
/// Generated on creation with UUID v4; events are never reused across
/// dispatches so the id is also never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a player inside one session.
///
/// Player ids come from the transport collaborator (account names, connection
/// tokens) so they are free-form strings rather than generated UUIDs.
///
/// ```rust
/// use strife_event_system::PlayerId;
///
/// let player = PlayerId::from("alice");
/// assert_eq!(player.as_str(), "alice");
/// assert_eq!(player.to_string(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a game session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a random session id, for callers that do not bring their own.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to one listener registration inside an
/// [`EventDispatcher`](crate::EventDispatcher).
///
/// Ids are allocated from a per-dispatcher counter, so they also record the
/// registration order used to break priority ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}
