//! # Game State
//!
//! [`GameState`] is the authoritative, mutable picture of one session's game:
//! the characters, the turn rotation, both decks and the append-only log.
//! It owns the session's [`EventDispatcher`] and [`CombatSystem`] for its
//! whole lifetime.
//!
//! ## Construction Order
//!
//! The dispatcher is built first, then the state that holds it, then the
//! combat system configured from the same rules. Traits attach by
//! registering on the dispatcher and receive the state as the dispatch
//! context, so no component holds a back-reference to another.
//!
//! ## Lobby Operations
//!
//! Players join, pick a character (which attaches that character's traits),
//! optionally toggle the team system, and leave. Turn flow and combat live in
//! [`CombatSystem`]; the `GameState` methods of the same name are thin
//! forwarding helpers.

use crate::broadcast::{GameSnapshot, NoopBroadcaster, StateBroadcaster};
use crate::character::{Archetype, Character};
use crate::combat::{AttackOutcome, CombatSystem, SkillOutcome};
use crate::dice::DiceRoller;
use crate::error::GameError;
use crate::rules::GameRules;
use crate::traits::{CharacterTrait, TraitKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use strife_event_system::{
    create_event_dispatcher, json, to_payload, EventDispatcher, EventKind, GameEvent, ListenerId, Payload, PlayerId,
    SessionId,
};
use tracing::{debug, info, warn};

/// Where the game is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    #[default]
    Lobby,
    InProgress,
    Finished,
}

/// One human-readable game log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// A trait instance attached to a character, with the listener registrations
/// made on its behalf.
struct AttachedTrait {
    behavior: Arc<dyn CharacterTrait>,
    listeners: Vec<ListenerId>,
}

pub struct GameState {
    session_id: SessionId,
    /// Characters by owning player; only players that picked a character
    pub players: HashMap<PlayerId, Character>,
    /// Turn rotation, in join order
    pub player_in_order: Vec<PlayerId>,
    pub current_turn: Option<PlayerId>,
    pub deck: VecDeque<String>,
    pub skill_deck: VecDeque<String>,
    /// Character names currently taken
    pub character_selected: BTreeSet<String>,
    pub is_team_system_active: bool,
    pub phase: GamePhase,
    pub round: u32,
    logs: Vec<LogEntry>,
    traits: Vec<AttachedTrait>,
    dispatcher: Arc<EventDispatcher<GameState>>,
    combat: CombatSystem,
    broadcaster: Arc<dyn StateBroadcaster>,
}

impl std::fmt::Debug for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameState")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("round", &self.round)
            .field("players", &self.player_in_order)
            .field("current_turn", &self.current_turn)
            .field("logs", &self.logs.len())
            .field("traits", &self.traits.len())
            .finish()
    }
}

impl GameState {
    pub fn new(session_id: SessionId, rules: GameRules) -> Self {
        let dispatcher = create_event_dispatcher();
        Self {
            session_id,
            players: HashMap::new(),
            player_in_order: Vec::new(),
            current_turn: None,
            deck: VecDeque::new(),
            skill_deck: VecDeque::new(),
            character_selected: BTreeSet::new(),
            is_team_system_active: false,
            phase: GamePhase::Lobby,
            round: 0,
            logs: Vec::new(),
            traits: Vec::new(),
            dispatcher,
            combat: CombatSystem::new(rules),
            broadcaster: Arc::new(NoopBroadcaster),
        }
    }

    /// Replaces the attack dice source.
    pub fn with_dice(mut self, dice: Arc<dyn DiceRoller>) -> Self {
        self.combat = self.combat.with_dice(dice);
        self
    }

    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn StateBroadcaster>) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    pub fn with_deck<I: IntoIterator<Item = String>>(mut self, cards: I) -> Self {
        self.deck = cards.into_iter().collect();
        self
    }

    pub fn with_skill_deck<I: IntoIterator<Item = String>>(mut self, skills: I) -> Self {
        self.skill_deck = skills.into_iter().collect();
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn rules(&self) -> &GameRules {
        self.combat.rules()
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher<GameState>> {
        &self.dispatcher
    }

    /// A handle on this session's combat system.
    pub fn combat_system(&self) -> CombatSystem {
        self.combat.clone()
    }

    // ------------------------------------------------------------------
    // Events and logging
    // ------------------------------------------------------------------

    /// Dispatches `kind` with `payload` through this session's listener
    /// chain, handing the state itself to every listener.
    pub async fn dispatch(&mut self, kind: EventKind, payload: Payload) -> GameEvent {
        let dispatcher = Arc::clone(&self.dispatcher);
        dispatcher.dispatch(kind, payload, self).await
    }

    /// Appends a line to the game log.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(session = %self.session_id, "📜 {}", message);
        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            message,
        });
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    // ------------------------------------------------------------------
    // Characters
    // ------------------------------------------------------------------

    pub fn character(&self, player: &PlayerId) -> Option<&Character> {
        self.players.get(player)
    }

    pub fn character_mut(&mut self, player: &PlayerId) -> Option<&mut Character> {
        self.players.get_mut(player)
    }

    pub(crate) fn require_character(&self, player: &PlayerId) -> Result<&Character, GameError> {
        self.players
            .get(player)
            .ok_or_else(|| GameError::UnknownPlayer(player.clone()))
    }

    pub(crate) fn require_character_mut(&mut self, player: &PlayerId) -> Result<&mut Character, GameError> {
        self.players
            .get_mut(player)
            .ok_or_else(|| GameError::UnknownPlayer(player.clone()))
    }

    /// Seats a ready-made character for `player`, joining them if needed.
    ///
    /// Traits named on the character are not attached; use
    /// [`select_character`](Self::select_character) or
    /// [`attach_trait`](Self::attach_trait) for that.
    pub fn insert_character(&mut self, player: PlayerId, character: Character) {
        if !self.player_in_order.contains(&player) {
            self.player_in_order.push(player.clone());
        }
        self.character_selected.insert(character.name.clone());
        if let Some(previous) = self.players.insert(player, character) {
            self.character_selected.remove(&previous.name);
        }
    }

    pub fn alive_players(&self) -> Vec<PlayerId> {
        self.player_in_order
            .iter()
            .filter(|player| self.players.get(*player).map(Character::is_alive).unwrap_or(false))
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Traits
    // ------------------------------------------------------------------

    /// Registers a trait's subscriptions on this session's dispatcher.
    pub fn attach_trait<T: CharacterTrait>(&mut self, character_trait: T) {
        let behavior = Arc::new(character_trait);
        let listeners: Vec<ListenerId> = behavior
            .subscriptions()
            .iter()
            .map(|(kind, priority)| self.dispatcher.register(*kind, behavior.clone(), *priority))
            .collect();
        debug!(
            "🔗 Attached trait {} for {} ({} listeners)",
            behavior.kind(),
            behavior.owner(),
            listeners.len()
        );
        self.traits.push(AttachedTrait { behavior, listeners });
    }

    /// Detaches every trait owned by `player`.
    pub fn detach_traits(&mut self, player: &PlayerId) -> usize {
        let dispatcher = Arc::clone(&self.dispatcher);
        let before = self.traits.len();
        self.traits.retain(|attached| {
            if attached.behavior.owner() != player {
                return true;
            }
            for id in &attached.listeners {
                dispatcher.unregister(*id);
            }
            false
        });
        before - self.traits.len()
    }

    /// Traits attached for `player`, in attachment order.
    pub fn traits_of(&self, player: &PlayerId) -> Vec<Arc<dyn CharacterTrait>> {
        self.traits
            .iter()
            .filter(|attached| attached.behavior.owner() == player)
            .map(|attached| Arc::clone(&attached.behavior))
            .collect()
    }

    // ------------------------------------------------------------------
    // Lobby
    // ------------------------------------------------------------------

    pub async fn player_join(&mut self, player: PlayerId) -> Result<(), GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if self.player_in_order.contains(&player) {
            warn!(session = %self.session_id, "Player {} is already in the game", player);
            return Err(GameError::PlayerAlreadyJoined(player));
        }
        self.player_in_order.push(player.clone());
        self.log(format!("{} joined the game", player));
        self.dispatch(EventKind::PlayerJoin, to_payload(json!({ "player": player })))
            .await;
        Ok(())
    }

    /// Removes a player, their character, their traits and their turn.
    pub async fn player_leave(&mut self, player: &PlayerId) -> Result<(), GameError> {
        let Some(position) = self.player_in_order.iter().position(|p| p == player) else {
            warn!(session = %self.session_id, "Player {} not found", player);
            return Err(GameError::UnknownPlayer(player.clone()));
        };
        self.player_in_order.remove(position);
        if let Some(character) = self.players.remove(player) {
            self.character_selected.remove(&character.name);
        }
        self.detach_traits(player);
        if self.current_turn.as_ref() == Some(player) {
            self.current_turn = None;
        }
        self.log(format!("{} left the game", player));
        self.dispatch(EventKind::PlayerLeave, to_payload(json!({ "player": player })))
            .await;
        Ok(())
    }

    /// Turns the team system on. Returns false if it was already on.
    pub fn team_system_activate(&mut self) -> bool {
        if self.is_team_system_active {
            warn!(session = %self.session_id, "Team system is already active");
            return false;
        }
        self.is_team_system_active = true;
        info!(session = %self.session_id, "Team system activated");
        true
    }

    /// Turns the team system off. Returns false if it was already off.
    pub fn team_system_deactivate(&mut self) -> bool {
        if !self.is_team_system_active {
            warn!(session = %self.session_id, "Team system is not active");
            return false;
        }
        self.is_team_system_active = false;
        info!(session = %self.session_id, "Team system deactivated");
        true
    }

    /// Builds `player`'s character and attaches its traits, replacing any
    /// previous pick.
    pub async fn select_character(
        &mut self,
        player: &PlayerId,
        name: &str,
        archetype: Archetype,
        traits: &[TraitKind],
    ) -> Result<(), GameError> {
        if self.phase != GamePhase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if !self.player_in_order.contains(player) {
            return Err(GameError::UnknownPlayer(player.clone()));
        }
        if self.character_selected.contains(name) {
            warn!(session = %self.session_id, "Character {} is already selected", name);
            return Err(GameError::CharacterTaken(name.to_string()));
        }

        if let Some(previous) = self.players.remove(player) {
            self.character_selected.remove(&previous.name);
            self.detach_traits(player);
            self.dispatch(
                EventKind::CharacterUnselect,
                to_payload(json!({ "player": player, "character": previous.name })),
            )
            .await;
        }

        let character = Character::new(player.clone(), name, archetype)
            .with_traits(traits.iter().map(|kind| kind.as_str()));
        self.insert_character(player.clone(), character);
        for kind in traits {
            kind.attach(self, player.clone());
        }

        self.log(format!("{} selected {} ({})", player, name, archetype));
        self.dispatch(
            EventKind::CharacterSelect,
            to_payload(json!({ "player": player, "character": name, "archetype": archetype })),
        )
        .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            session_id: self.session_id.clone(),
            phase: self.phase,
            round: self.round,
            current_turn: self.current_turn.clone(),
            player_in_order: self.player_in_order.clone(),
            players: self
                .player_in_order
                .iter()
                .filter_map(|player| self.players.get(player).cloned())
                .collect(),
            deck_size: self.deck.len(),
            skill_deck_size: self.skill_deck.len(),
            is_team_system_active: self.is_team_system_active,
            logs: self.logs.clone(),
        }
    }

    /// Pushes the current snapshot to the session's broadcaster.
    pub fn broadcast_state(&self) {
        self.broadcaster.broadcast(&self.session_id, self.snapshot());
    }

    // ------------------------------------------------------------------
    // Forwarding helpers
    // ------------------------------------------------------------------

    pub async fn attack(&mut self, attacker: &PlayerId, defender: &PlayerId) -> Result<AttackOutcome, GameError> {
        self.combat_system().execute_attack(self, attacker, defender).await
    }

    pub async fn heal(&mut self, target: &PlayerId, amount: u32) -> Result<u32, GameError> {
        self.combat_system().heal(self, target, amount).await
    }

    pub async fn draw(&mut self, player: &PlayerId, count: usize) -> Result<Vec<String>, GameError> {
        self.combat_system().draw(self, player, count).await
    }

    pub async fn play(&mut self, player: &PlayerId, card: &str) -> Result<(), GameError> {
        self.combat_system().play(self, player, card).await
    }

    pub async fn end_turn(&mut self, player: &PlayerId) -> Result<(), GameError> {
        self.combat_system().end_turn(self, player).await
    }

    pub async fn start_game(&mut self) -> Result<(), GameError> {
        self.combat_system().start_game(self).await
    }

    pub async fn advance_turn(&mut self, previous: &PlayerId) -> Result<Option<PlayerId>, GameError> {
        self.combat_system().advance_turn(self, previous).await
    }

    pub async fn use_skill(&mut self, player: &PlayerId, skill: &str) -> Result<SkillOutcome, GameError> {
        self.combat_system().use_skill(self, player, skill).await
    }
}
