//! # Character Traits
//!
//! A trait is a named effect that hooks a character into the session's event
//! chain. Each trait declares the event kinds it listens to and the priority
//! it listens at; [`GameState::attach_trait`] registers it on the dispatcher.
//! Handlers receive the [`GameState`] as dispatch context, so a trait holds
//! nothing but the id of the player it belongs to.
//!
//! Adding a trait means implementing [`CharacterTrait`] and adding a
//! [`TraitKind`] variant; the dispatcher and combat system are unchanged.
//!
//! | Trait              | Listens to    | Priority | Effect                                          |
//! |--------------------|---------------|----------|-------------------------------------------------|
//! | Self-Encouragement | `DAMAGE_APPLY`| 50       | At or below half hp, heal to 80% of `hp_max`    |
//! | Quickened          | `SKILL_USE`   | 50       | Owner's skill cooldowns are one turn shorter    |
//! | Gifted             | `GAME_START`  | 50       | Owner learns the top skill of the skill deck    |
//! | Keen Eye           | -             | -        | Attack dice bound +2                            |

use crate::error::GameError;
use crate::state::GameState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strife_event_system::{json, to_payload, EventError, EventHandler, EventKind, GameEvent, Payload, PlayerId};
use tracing::{debug, warn};

/// Effect attached to one character through the session's dispatcher.
pub trait CharacterTrait: EventHandler<GameState> {
    fn kind(&self) -> TraitKind;

    /// Player whose character carries this trait.
    fn owner(&self) -> &PlayerId;

    /// `(kind, priority)` pairs this trait listens on.
    fn subscriptions(&self) -> &'static [(EventKind, i32)];

    fn handles(&self, kind: EventKind) -> bool {
        self.subscriptions().iter().any(|(subscribed, _)| *subscribed == kind)
    }

    /// Adjusts the owner's attack-die upper bound.
    fn modify_dice_max(&self, bound: u32) -> u32 {
        bound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraitKind {
    SelfEncouragement,
    Quickened,
    Gifted,
    KeenEye,
}

impl TraitKind {
    pub const ALL: [TraitKind; 4] = [
        TraitKind::SelfEncouragement,
        TraitKind::Quickened,
        TraitKind::Gifted,
        TraitKind::KeenEye,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TraitKind::SelfEncouragement => "SELF_ENCOURAGEMENT",
            TraitKind::Quickened => "QUICKENED",
            TraitKind::Gifted => "GIFTED",
            TraitKind::KeenEye => "KEEN_EYE",
        }
    }

    /// Builds this trait for `owner` and attaches it to `state`.
    pub fn attach(&self, state: &mut GameState, owner: PlayerId) {
        match self {
            TraitKind::SelfEncouragement => state.attach_trait(SelfEncouragement::new(owner)),
            TraitKind::Quickened => state.attach_trait(Quickened::new(owner)),
            TraitKind::Gifted => state.attach_trait(Gifted::new(owner)),
            TraitKind::KeenEye => state.attach_trait(KeenEye::new(owner)),
        }
    }
}

impl fmt::Display for TraitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraitKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TraitKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GameError::InvalidPayload(format!("unknown trait '{}'", s)))
    }
}

fn is_owner(event: &GameEvent, owner: &PlayerId) -> bool {
    event.get_str("player") == Some(owner.as_str())
}

fn handler_error(error: GameError) -> EventError {
    EventError::HandlerExecution(error.to_string())
}

// ============================================================================
// Self-Encouragement
// ============================================================================

/// Heals its owner back to 80% of `hp_max` (rounded down) whenever damage
/// leaves them alive at or below half health.
#[derive(Debug, Clone)]
pub struct SelfEncouragement {
    owner: PlayerId,
}

impl SelfEncouragement {
    pub fn new(owner: PlayerId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl EventHandler<GameState> for SelfEncouragement {
    async fn handle(&self, event: &mut GameEvent, state: &mut GameState) -> Result<Option<Payload>, EventError> {
        if !is_owner(event, &self.owner) {
            return Ok(None);
        }
        let Some(character) = state.character(&self.owner) else {
            return Ok(None);
        };
        let hp = u64::from(character.hp());
        let hp_max = u64::from(character.hp_max());
        if hp == 0 || hp * 2 > hp_max {
            return Ok(None);
        }
        let target = hp_max * 4 / 5;
        if hp >= target {
            return Ok(None);
        }

        let name = character.name.clone();
        let amount = u32::try_from(target - hp).unwrap_or(u32::MAX);
        state.heal(&self.owner, amount).await.map_err(handler_error)?;
        state.log(format!("{}'s Self-Encouragement triggered, HP restored to {}", name, target));
        Ok(None)
    }

    fn handler_name(&self) -> &str {
        "self_encouragement"
    }
}

impl CharacterTrait for SelfEncouragement {
    fn kind(&self) -> TraitKind {
        TraitKind::SelfEncouragement
    }

    fn owner(&self) -> &PlayerId {
        &self.owner
    }

    fn subscriptions(&self) -> &'static [(EventKind, i32)] {
        &[(EventKind::DamageApply, 50)]
    }
}

// ============================================================================
// Quickened
// ============================================================================

/// Shortens the cooldown of every skill its owner uses by one turn.
#[derive(Debug, Clone)]
pub struct Quickened {
    owner: PlayerId,
}

impl Quickened {
    pub fn new(owner: PlayerId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl EventHandler<GameState> for Quickened {
    async fn handle(&self, event: &mut GameEvent, state: &mut GameState) -> Result<Option<Payload>, EventError> {
        if !is_owner(event, &self.owner) {
            return Ok(None);
        }
        let cooldown = event.get_i64("cooldown").unwrap_or(0);
        let reduced = (cooldown - 1).max(0);
        let skill = event.get_str("skill").unwrap_or_default().to_string();

        state
            .dispatch(
                EventKind::SkillCdModified,
                to_payload(json!({ "player": self.owner, "skill": skill, "cooldown": reduced })),
            )
            .await;
        state.log(format!("{}'s Quickened shortens {} to {} turns", self.owner, skill, reduced));
        Ok(Some(to_payload(json!({ "cooldown": reduced }))))
    }

    fn handler_name(&self) -> &str {
        "quickened"
    }
}

impl CharacterTrait for Quickened {
    fn kind(&self) -> TraitKind {
        TraitKind::Quickened
    }

    fn owner(&self) -> &PlayerId {
        &self.owner
    }

    fn subscriptions(&self) -> &'static [(EventKind, i32)] {
        &[(EventKind::SkillUse, 50)]
    }
}

// ============================================================================
// Gifted
// ============================================================================

/// Grants its owner the top skill of the skill deck when the game starts.
#[derive(Debug, Clone)]
pub struct Gifted {
    owner: PlayerId,
}

impl Gifted {
    pub fn new(owner: PlayerId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl EventHandler<GameState> for Gifted {
    async fn handle(&self, _event: &mut GameEvent, state: &mut GameState) -> Result<Option<Payload>, EventError> {
        let Some(skill) = state.skill_deck.pop_front() else {
            debug!("Skill deck empty, nothing for {} to learn", self.owner);
            return Ok(None);
        };

        let combat = state.combat_system();
        if let Err(e) = combat.grant_skill(state, &self.owner, skill.clone()).await {
            warn!("Gifted could not grant {} to {}: {}", skill, self.owner, e);
            state.skill_deck.push_front(skill);
            return Ok(None);
        }
        state.log(format!("{}'s Gifted trait grants {}", self.owner, skill));
        Ok(None)
    }

    fn handler_name(&self) -> &str {
        "gifted"
    }
}

impl CharacterTrait for Gifted {
    fn kind(&self) -> TraitKind {
        TraitKind::Gifted
    }

    fn owner(&self) -> &PlayerId {
        &self.owner
    }

    fn subscriptions(&self) -> &'static [(EventKind, i32)] {
        &[(EventKind::GameStart, 50)]
    }
}

// ============================================================================
// Keen Eye
// ============================================================================

/// Widens its owner's attack die by two faces.
#[derive(Debug, Clone)]
pub struct KeenEye {
    owner: PlayerId,
}

impl KeenEye {
    pub const BONUS: u32 = 2;

    pub fn new(owner: PlayerId) -> Self {
        Self { owner }
    }
}

#[async_trait]
impl EventHandler<GameState> for KeenEye {
    async fn handle(&self, _event: &mut GameEvent, _state: &mut GameState) -> Result<Option<Payload>, EventError> {
        Ok(None)
    }

    fn handler_name(&self) -> &str {
        "keen_eye"
    }
}

impl CharacterTrait for KeenEye {
    fn kind(&self) -> TraitKind {
        TraitKind::KeenEye
    }

    fn owner(&self) -> &PlayerId {
        &self.owner
    }

    fn subscriptions(&self) -> &'static [(EventKind, i32)] {
        &[]
    }

    fn modify_dice_max(&self, bound: u32) -> u32 {
        bound.saturating_add(Self::BONUS)
    }
}
