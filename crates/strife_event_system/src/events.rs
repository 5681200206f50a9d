//! # Events and Handlers
//!
//! This module defines the event record exchanged between the dispatcher and
//! its listeners, the closed set of event kinds used as dispatch keys, and the
//! [`EventHandler`] seam that listeners (including character traits) implement.
//!
//! ## Event Lifecycle
//!
//! A [`GameEvent`] is built immediately before a dispatch, passed through the
//! whole listener chain for that one dispatch, and read back by the caller.
//! Listeners communicate exclusively through the event:
//!
//! - **Payload**: an open string-keyed JSON map, mutable in place
//! - **Cancelation**: [`GameEvent::cancel`] or a `"canceled": true` payload entry
//! - **Error**: [`GameEvent::set_error`], which implies cancelation
//!
//! ## Design Principles
//!
//! - **Closed kinds**: [`EventKind`] is a fixed enumeration, so a typo cannot
//!   silently create a new dispatch key
//! - **Open payloads**: payload shapes vary per kind and stay schemaless
//! - **Context-generic handlers**: [`EventHandler<C>`] receives `&mut C`, the
//!   state being mutated, instead of holding a reference to it

use crate::types::EventId;
use crate::utils::current_timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

/// Open mapping from string keys to JSON values carried by every event.
pub type Payload = Map<String, Value>;

/// Payload key that, when set to `true`, marks the event as canceled.
pub const CANCELED_KEY: &str = "canceled";

// ============================================================================
// Event Kinds
// ============================================================================

/// Closed enumeration of game occurrences used as dispatch keys.
///
/// The wire representation is SCREAMING_SNAKE_CASE (`"PRE_ATTACK"`), matching
/// what the transport layer hands to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    // System
    Register,
    Unregister,

    // Game flow
    GameStart,
    GameEnd,
    GamePause,
    GameResume,
    GameRestart,

    // Player
    PlayerJoin,
    PlayerLeave,
    PlayerReady,
    PlayerUnready,
    SkillAppend,
    SkillRemove,

    // Character
    CharacterSelect,
    CharacterUnselect,
    CharacterUpdate,
    CharacterDeath,
    CharacterRevive,

    // Turn control
    TurnStart,
    TurnEnd,
    RoundChange,

    // Cards
    DrawCard,
    PlayCard,

    // Combat
    DiceRoll,
    PreAttack,
    DamageCalc,
    DamageApply,

    // Healing
    PreHeal,
    HealCalc,
    HealApply,

    // Resources
    MpModified,

    // Skills
    SkillUse,
    SkillCancel,
    SkillCdModified,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 34] = [
        EventKind::Register,
        EventKind::Unregister,
        EventKind::GameStart,
        EventKind::GameEnd,
        EventKind::GamePause,
        EventKind::GameResume,
        EventKind::GameRestart,
        EventKind::PlayerJoin,
        EventKind::PlayerLeave,
        EventKind::PlayerReady,
        EventKind::PlayerUnready,
        EventKind::SkillAppend,
        EventKind::SkillRemove,
        EventKind::CharacterSelect,
        EventKind::CharacterUnselect,
        EventKind::CharacterUpdate,
        EventKind::CharacterDeath,
        EventKind::CharacterRevive,
        EventKind::TurnStart,
        EventKind::TurnEnd,
        EventKind::RoundChange,
        EventKind::DrawCard,
        EventKind::PlayCard,
        EventKind::DiceRoll,
        EventKind::PreAttack,
        EventKind::DamageCalc,
        EventKind::DamageApply,
        EventKind::PreHeal,
        EventKind::HealCalc,
        EventKind::HealApply,
        EventKind::MpModified,
        EventKind::SkillUse,
        EventKind::SkillCancel,
        EventKind::SkillCdModified,
    ];

    /// Wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Register => "REGISTER",
            EventKind::Unregister => "UNREGISTER",
            EventKind::GameStart => "GAME_START",
            EventKind::GameEnd => "GAME_END",
            EventKind::GamePause => "GAME_PAUSE",
            EventKind::GameResume => "GAME_RESUME",
            EventKind::GameRestart => "GAME_RESTART",
            EventKind::PlayerJoin => "PLAYER_JOIN",
            EventKind::PlayerLeave => "PLAYER_LEAVE",
            EventKind::PlayerReady => "PLAYER_READY",
            EventKind::PlayerUnready => "PLAYER_UNREADY",
            EventKind::SkillAppend => "SKILL_APPEND",
            EventKind::SkillRemove => "SKILL_REMOVE",
            EventKind::CharacterSelect => "CHARACTER_SELECT",
            EventKind::CharacterUnselect => "CHARACTER_UNSELECT",
            EventKind::CharacterUpdate => "CHARACTER_UPDATE",
            EventKind::CharacterDeath => "CHARACTER_DEATH",
            EventKind::CharacterRevive => "CHARACTER_REVIVE",
            EventKind::TurnStart => "TURN_START",
            EventKind::TurnEnd => "TURN_END",
            EventKind::RoundChange => "ROUND_CHANGE",
            EventKind::DrawCard => "DRAW_CARD",
            EventKind::PlayCard => "PLAY_CARD",
            EventKind::DiceRoll => "DICE_ROLL",
            EventKind::PreAttack => "PRE_ATTACK",
            EventKind::DamageCalc => "DAMAGE_CALC",
            EventKind::DamageApply => "DAMAGE_APPLY",
            EventKind::PreHeal => "PRE_HEAL",
            EventKind::HealCalc => "HEAL_CALC",
            EventKind::HealApply => "HEAL_APPLY",
            EventKind::MpModified => "MP_MODIFIED",
            EventKind::SkillUse => "SKILL_USE",
            EventKind::SkillCancel => "SKILL_CANCEL",
            EventKind::SkillCdModified => "SKILL_CD_MODIFIED",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EventError::UnknownKind(s.to_string()))
    }
}

// ============================================================================
// Game Event
// ============================================================================

/// One event travelling through a listener chain.
///
/// Identity (`id`, `kind`, `created_at`) is fixed at construction; the payload
/// and the cancelation state are what listeners mutate.
///
/// ```rust
/// use strife_event_system::{EventKind, GameEvent};
/// use serde_json::json;
///
/// let mut event = GameEvent::from_value(EventKind::PreAttack, json!({
///     "attacker": "alice",
///     "defender": "bob",
/// }));
/// assert!(!event.is_canceled());
///
/// event.set_error("defender is untargetable");
/// assert!(event.is_canceled());
/// assert_eq!(event.error(), Some("defender is untargetable"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    /// Unique identifier generated on creation
    pub id: EventId,
    /// Dispatch key
    pub kind: EventKind,
    /// Unix timestamp (seconds) of creation
    pub created_at: u64,
    /// Open, listener-mutable data
    pub payload: Payload,
    canceled: bool,
    error: Option<String>,
}

/// Saved state of an event, used to roll back a faulting listener's writes.
#[derive(Debug, Clone)]
pub(crate) struct EventCheckpoint {
    payload: Payload,
    canceled: bool,
    error: Option<String>,
}

impl GameEvent {
    /// Creates a new event with a fresh id.
    pub fn new(kind: EventKind, payload: Payload) -> Self {
        Self {
            id: EventId::new(),
            kind,
            created_at: current_timestamp(),
            payload,
            canceled: false,
            error: None,
        }
    }

    /// Creates an event with an empty payload.
    pub fn empty(kind: EventKind) -> Self {
        Self::new(kind, Payload::new())
    }

    /// Creates an event from a JSON value; non-object values yield an empty payload.
    pub fn from_value(kind: EventKind, value: Value) -> Self {
        Self::new(kind, crate::utils::to_payload(value))
    }

    /// Marks the event as canceled.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    /// Records an error message; an errored event is always canceled.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.canceled = true;
    }

    /// Returns true when a listener canceled the event, either through
    /// [`cancel`](Self::cancel)/[`set_error`](Self::set_error) or by writing
    /// `"canceled": true` into the payload.
    pub fn is_canceled(&self) -> bool {
        self.canceled
            || self
                .payload
                .get(CANCELED_KEY)
                .and_then(Value::as_bool)
                .unwrap_or(false)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Merges a listener-produced delta into the payload, key by key.
    pub fn merge(&mut self, delta: Payload) {
        for (key, value) in delta {
            self.payload.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.payload.insert(key.into(), value.into());
    }

    pub fn into_payload(self) -> Payload {
        self.payload
    }

    pub(crate) fn checkpoint(&self) -> EventCheckpoint {
        EventCheckpoint {
            payload: self.payload.clone(),
            canceled: self.canceled,
            error: self.error.clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: EventCheckpoint) {
        self.payload = checkpoint.payload;
        self.canceled = checkpoint.canceled;
        self.error = checkpoint.error;
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Listener invoked by an [`EventDispatcher`](crate::EventDispatcher).
///
/// `C` is the context being mutated by the dispatch (for game sessions, the
/// `GameState`). Handlers read and write `event` in place and may return a
/// payload-shaped delta which the dispatcher merges after the handler
/// completes. Returning `Err` is a listener fault: the dispatcher rolls the
/// event back to its state before this handler ran, records the fault, and
/// continues with the next listener.
#[async_trait]
pub trait EventHandler<C>: Send + Sync + 'static
where
    C: Send + 'static,
{
    async fn handle(&self, event: &mut GameEvent, ctx: &mut C) -> Result<Option<Payload>, EventError>;

    /// Human-readable name used in logs and fault records.
    fn handler_name(&self) -> &str;
}

/// Adapter turning a synchronous closure into an [`EventHandler`].
///
/// ```rust
/// use strife_event_system::{FnHandler, GameEvent, EventError, Payload};
///
/// let handler = FnHandler::new("noop", |_event: &mut GameEvent, _ctx: &mut ()| {
///     Ok::<Option<Payload>, EventError>(None)
/// });
/// ```
pub struct FnHandler<C, F> {
    name: String,
    handler: F,
    _context: PhantomData<fn(&mut C)>,
}

impl<C, F> FnHandler<C, F>
where
    F: Fn(&mut GameEvent, &mut C) -> Result<Option<Payload>, EventError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            handler,
            _context: PhantomData,
        }
    }
}

impl<C, F> fmt::Debug for FnHandler<C, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<C, F> EventHandler<C> for FnHandler<C, F>
where
    C: Send + 'static,
    F: Fn(&mut GameEvent, &mut C) -> Result<Option<Payload>, EventError> + Send + Sync + 'static,
{
    async fn handle(&self, event: &mut GameEvent, ctx: &mut C) -> Result<Option<Payload>, EventError> {
        (self.handler)(event, ctx)
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by listeners and by the event model itself.
///
/// Listener faults never escape a dispatch; they are logged and counted by
/// the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// Payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Handler execution failed during event processing
    #[error("Handler execution error: {0}")]
    HandlerExecution(String),
    /// Handler panicked; the panic was contained by the dispatcher
    #[error("Handler panicked: {0}")]
    HandlerPanicked(String),
    /// A string did not name any [`EventKind`]
    #[error("Unknown event kind: {0}")]
    UnknownKind(String),
    #[error("An unexpected error occurred: {0}")]
    Other(String),
}
