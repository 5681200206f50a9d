//! Outbound state views.
//!
//! The rules engine never talks to clients directly. After actions that
//! change what players can see, the [`GameState`](crate::GameState) takes a
//! [`GameSnapshot`] and hands it to the session's [`StateBroadcaster`], which
//! the transport layer supplies.

use crate::character::Character;
use crate::state::{GamePhase, LogEntry};
use serde::{Deserialize, Serialize};
use strife_event_system::{PlayerId, SessionId};
use tokio::sync::broadcast;
use tracing::trace;

/// Serializable view of one session's game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub session_id: SessionId,
    pub phase: GamePhase,
    pub round: u32,
    pub current_turn: Option<PlayerId>,
    pub player_in_order: Vec<PlayerId>,
    pub players: Vec<Character>,
    pub deck_size: usize,
    pub skill_deck_size: usize,
    pub is_team_system_active: bool,
    pub logs: Vec<LogEntry>,
}

/// Delivery seam for state snapshots.
///
/// Called while the session lock is held, so implementations must hand the
/// snapshot off (queue, channel) rather than perform I/O inline.
pub trait StateBroadcaster: Send + Sync {
    fn broadcast(&self, session_id: &SessionId, snapshot: GameSnapshot);
}

/// Broadcaster that drops every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBroadcaster;

impl StateBroadcaster for NoopBroadcaster {
    fn broadcast(&self, session_id: &SessionId, _snapshot: GameSnapshot) {
        trace!("Dropping snapshot for session {}", session_id);
    }
}

/// Broadcaster backed by a tokio broadcast channel; transport tasks subscribe
/// and forward snapshots to their clients.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    sender: broadcast::Sender<(SessionId, GameSnapshot)>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(SessionId, GameSnapshot)> {
        self.sender.subscribe()
    }
}

impl StateBroadcaster for ChannelBroadcaster {
    fn broadcast(&self, session_id: &SessionId, snapshot: GameSnapshot) {
        // No subscribers is not an error; nobody is watching this session yet.
        if self.sender.send((session_id.clone(), snapshot)).is_err() {
            trace!("No subscribers for session {} snapshot", session_id);
        }
    }
}
