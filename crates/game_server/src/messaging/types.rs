//! Command type definitions for transport-to-session handoff.

use serde::{Deserialize, Serialize};
use strife_event_system::{to_payload, EventKind, GameEvent, SessionId, Value};

/// A command parsed by the transport, addressed to one session.
///
/// # Examples
///
/// ```json
/// {
///   "session_id": "table-7",
///   "kind": "PRE_ATTACK",
///   "payload": { "attacker": "alice", "defender": "bob" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundCommand {
    /// Session the command is addressed to
    pub session_id: SessionId,

    /// Command kind, one of the routed event kinds
    pub kind: EventKind,

    /// Command arguments as a JSON object
    #[serde(default)]
    pub payload: Value,
}

impl InboundCommand {
    pub fn into_event(self) -> GameEvent {
        GameEvent::new(self.kind, to_payload(self.payload))
    }
}
