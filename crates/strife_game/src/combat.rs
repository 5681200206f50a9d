//! # Combat Resolution
//!
//! [`CombatSystem`] turns raw requests into validated, resolved state changes
//! by running them as a sequence of dispatched events. Listeners (character
//! traits, mostly) can observe every step and rewrite the in-flight numbers.
//!
//! ## Attack Pipeline
//!
//! ```text
//! Requested ─▶ Validated ─▶ RollResolved ─▶ DamageResolved ─▶ Applied
//!                  │              │                 │
//!                  └──────────────┴─────────────────┴──▶ Canceled
//! ```
//!
//! 1. `PRE_ATTACK {attacker, defender, canceled}`: any listener may cancel
//! 2. One draw in `[1, bound]`, where the bound starts at the configured base
//!    and passes through the attacker's traits in attachment order;
//!    `DICE_ROLL {player, min, max, result, modified}` may adjust the roll
//! 3. `DAMAGE_CALC {original, modified, source, target}` seeded with
//!    `roll * (attack - defense)`; the final damage is `max(0, modified)`
//! 4. The defender loses hp, the result is logged and `DAMAGE_APPLY` fires
//!
//! Card, turn and skill protocols live in the `turns` module.

use crate::dice::{DiceRoller, RandomDice};
use crate::error::GameError;
use crate::rules::GameRules;
use crate::state::GameState;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use strife_event_system::{json, panic_message, to_payload, EventKind, PlayerId};
use tracing::{debug, error, warn};

/// Terminal state of an attack request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttackOutcome {
    /// A listener canceled the attack before damage was applied.
    Canceled { reason: Option<String> },
    /// Damage was applied to the defender.
    Applied {
        roll: i64,
        damage: u32,
        defender_hp: u32,
        defeated: bool,
    },
}

/// Terminal state of a skill use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SkillOutcome {
    Canceled,
    Used { cooldown: u32 },
}

/// Orchestrates attack, heal, card, turn and skill protocols for one session.
///
/// Cheap to clone; [`GameState::combat_system`] hands out copies so a
/// protocol can borrow the state mutably while it runs.
#[derive(Debug, Clone)]
pub struct CombatSystem {
    rules: GameRules,
    dice: Arc<dyn DiceRoller>,
}

impl CombatSystem {
    pub fn new(rules: GameRules) -> Self {
        Self {
            rules,
            dice: Arc::new(RandomDice),
        }
    }

    pub fn with_dice(mut self, dice: Arc<dyn DiceRoller>) -> Self {
        self.dice = dice;
        self
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Attack-die upper bound for `attacker`: the configured base passed
    /// through each of the attacker's traits in attachment order.
    pub fn dice_bound(&self, state: &GameState, attacker: &PlayerId) -> u32 {
        state
            .traits_of(attacker)
            .iter()
            .fold(self.rules.base_dice_bound, |bound, character_trait| {
                character_trait.modify_dice_max(bound)
            })
            .max(1)
    }

    /// Runs the full attack pipeline.
    ///
    /// Unknown or defeated combatants are rejected up front without any
    /// event being dispatched. Once `PRE_ATTACK` has fired, any failure,
    /// panics included, is logged and reported as [`GameError::ActionFailed`].
    pub async fn execute_attack(
        &self,
        state: &mut GameState,
        attacker: &PlayerId,
        defender: &PlayerId,
    ) -> Result<AttackOutcome, GameError> {
        if attacker == defender {
            return Err(GameError::InvalidTarget(format!("{} cannot attack themselves", attacker)));
        }
        for combatant in [attacker, defender] {
            if !state.require_character(combatant)?.is_alive() {
                return Err(GameError::InvalidTarget(format!("{} has been defeated", combatant)));
            }
        }

        let result = AssertUnwindSafe(self.resolve_attack(state, attacker, defender))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(GameError::ActionFailed(panic_message(panic.as_ref()))));

        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(session = %state.session_id(), "❌ Attack {} -> {} failed: {}", attacker, defender, e);
                state.log(format!("Attack by {} on {} failed", attacker, defender));
                Err(match e {
                    GameError::ActionFailed(reason) => GameError::ActionFailed(reason),
                    other => GameError::ActionFailed(other.to_string()),
                })
            }
        }
    }

    async fn resolve_attack(
        &self,
        state: &mut GameState,
        attacker: &PlayerId,
        defender: &PlayerId,
    ) -> Result<AttackOutcome, GameError> {
        // Validated
        let pre_attack = state
            .dispatch(
                EventKind::PreAttack,
                to_payload(json!({ "attacker": attacker, "defender": defender, "canceled": false })),
            )
            .await;
        if pre_attack.is_canceled() {
            let reason = pre_attack.error().map(str::to_string);
            state.log(format!("{}'s attack on {} was canceled", attacker, defender));
            return Ok(AttackOutcome::Canceled { reason });
        }

        // RollResolved
        let bound = self.dice_bound(state, attacker);
        let result = self.dice.roll(1, bound);
        let dice_roll = state
            .dispatch(
                EventKind::DiceRoll,
                to_payload(json!({
                    "player": attacker,
                    "min": 1,
                    "max": bound,
                    "result": result,
                    "modified": result,
                })),
            )
            .await;
        if dice_roll.is_canceled() {
            state.log(format!("{}'s attack roll was canceled", attacker));
            return Ok(AttackOutcome::Canceled {
                reason: dice_roll.error().map(str::to_string),
            });
        }
        let roll = dice_roll.get_i64("modified").unwrap_or(i64::from(result));
        debug!("🎲 {} rolled {} (bound {}, drawn {})", attacker, roll, bound, result);

        // DamageResolved
        let attack = i64::from(state.require_character(attacker)?.attack);
        let defense = i64::from(state.require_character(defender)?.defense);
        let original = roll
            .checked_mul(attack - defense)
            .ok_or_else(|| GameError::ActionFailed(format!("damage overflow for roll {}", roll)))?;
        let damage_calc = state
            .dispatch(
                EventKind::DamageCalc,
                to_payload(json!({
                    "original": original,
                    "modified": original,
                    "source": attacker,
                    "target": defender,
                })),
            )
            .await;
        if damage_calc.is_canceled() {
            state.log(format!("{}'s attack on {} was canceled", attacker, defender));
            return Ok(AttackOutcome::Canceled {
                reason: damage_calc.error().map(str::to_string),
            });
        }
        let modified = damage_calc.get_i64("modified").unwrap_or(original);
        let damage = u32::try_from(modified.max(0)).unwrap_or(u32::MAX);

        // Applied
        let target = state.require_character_mut(defender)?;
        let name = target.name.clone();
        let remaining = target.take_damage(damage);
        let defeated = !target.is_alive();

        state.log(format!("{} took {} damage, remaining HP: {}", name, damage, remaining));
        if defeated {
            state.log(format!("{} has been defeated!", name));
        }
        state
            .dispatch(
                EventKind::DamageApply,
                to_payload(json!({
                    "player": defender,
                    "attacker": attacker,
                    "damage": damage,
                    "hp": remaining,
                })),
            )
            .await;
        if defeated {
            state
                .dispatch(EventKind::CharacterDeath, to_payload(json!({ "player": defender })))
                .await;
        }

        let defender_hp = state.character(defender).map(|c| c.hp()).unwrap_or(0);
        Ok(AttackOutcome::Applied {
            roll,
            damage,
            defender_hp,
            defeated,
        })
    }

    /// Restores `amount` hp to `target`, clamped to `hp_max`, and fires
    /// `HEAL_APPLY`. Returns the amount actually restored.
    pub async fn heal(&self, state: &mut GameState, target: &PlayerId, amount: u32) -> Result<u32, GameError> {
        let character = state.require_character_mut(target)?;
        if !character.is_alive() {
            return Err(GameError::InvalidTarget(format!("{} has been defeated", target)));
        }
        let restored = character.restore_hp(amount);
        let (name, hp) = (character.name.clone(), character.hp());

        state.log(format!("{} recovered {} HP, current HP: {}", name, restored, hp));
        state
            .dispatch(
                EventKind::HealApply,
                to_payload(json!({ "player": target, "amount": restored, "hp": hp })),
            )
            .await;
        Ok(restored)
    }

    /// Heal request from outside the rules engine: `PRE_HEAL` may cancel it
    /// and `HEAL_CALC` may rewrite the amount before [`heal`](Self::heal)
    /// applies it. Returns `None` when canceled.
    pub async fn request_heal(
        &self,
        state: &mut GameState,
        target: &PlayerId,
        amount: u32,
    ) -> Result<Option<u32>, GameError> {
        if !state.require_character(target)?.is_alive() {
            return Err(GameError::InvalidTarget(format!("{} has been defeated", target)));
        }

        let pre_heal = state
            .dispatch(
                EventKind::PreHeal,
                to_payload(json!({ "target": target, "amount": amount, "canceled": false })),
            )
            .await;
        if pre_heal.is_canceled() {
            warn!(session = %state.session_id(), "Heal on {} was canceled", target);
            state.log(format!("Healing on {} was canceled", target));
            return Ok(None);
        }

        let heal_calc = state
            .dispatch(
                EventKind::HealCalc,
                to_payload(json!({ "original": amount, "modified": amount, "target": target })),
            )
            .await;
        let modified = heal_calc.get_i64("modified").unwrap_or(i64::from(amount));
        let amount = u32::try_from(modified.max(0)).unwrap_or(u32::MAX);

        self.heal(state, target, amount).await.map(Some)
    }
}
