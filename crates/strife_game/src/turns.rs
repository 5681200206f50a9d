//! Card, turn and skill protocols.

use crate::combat::{CombatSystem, SkillOutcome};
use crate::error::GameError;
use crate::state::{GamePhase, GameState};
use strife_event_system::{json, to_payload, EventKind, PlayerId};
use tracing::debug;

impl CombatSystem {
    /// Moves `count` cards from the front of the deck into `player`'s hand.
    ///
    /// All or nothing: a draw that would overflow the hand or the deck leaves
    /// both untouched.
    pub async fn draw(&self, state: &mut GameState, player: &PlayerId, count: usize) -> Result<Vec<String>, GameError> {
        if count == 0 {
            return Err(GameError::InvalidPayload("draw count must be at least 1".to_string()));
        }
        let limit = self.rules().hand_limit;
        let held = state.require_character(player)?.hand.len();
        if held + count > limit {
            return Err(GameError::HandLimitReached {
                player: player.clone(),
                held,
                requested: count,
                limit,
            });
        }
        if state.deck.len() < count {
            return Err(GameError::DeckExhausted {
                requested: count,
                available: state.deck.len(),
            });
        }

        let cards: Vec<String> = state.deck.drain(..count).collect();
        state.require_character_mut(player)?.hand.extend(cards.iter().cloned());

        state.log(format!("{} drew {}", player, cards.join(", ")));
        state
            .dispatch(EventKind::DrawCard, to_payload(json!({ "player": player, "cards": cards })))
            .await;
        state.broadcast_state();
        Ok(cards)
    }

    /// Plays `card` from `player`'s hand. Only the current player may play.
    pub async fn play(&self, state: &mut GameState, player: &PlayerId, card: &str) -> Result<(), GameError> {
        let position = state
            .require_character(player)?
            .hand
            .iter()
            .position(|held| held == card)
            .ok_or_else(|| GameError::InvalidCard {
                player: player.clone(),
                card: card.to_string(),
            })?;
        if state.current_turn.as_ref() != Some(player) {
            return Err(GameError::NotYourTurn(player.clone()));
        }

        state.require_character_mut(player)?.hand.remove(position);
        state.log(format!("{} played {}", player, card));
        state
            .dispatch(EventKind::PlayCard, to_payload(json!({ "player": player, "card": card })))
            .await;
        state.broadcast_state();
        Ok(())
    }

    /// Ends `player`'s turn and clears `current_turn`.
    ///
    /// Does not pick the next player; call [`advance_turn`](Self::advance_turn)
    /// once `TURN_END` listeners have run.
    pub async fn end_turn(&self, state: &mut GameState, player: &PlayerId) -> Result<(), GameError> {
        if state.current_turn.as_ref() != Some(player) {
            return Err(GameError::NotYourTurn(player.clone()));
        }
        state.current_turn = None;
        state.log(format!("{} ended their turn", player));
        state
            .dispatch(
                EventKind::TurnEnd,
                to_payload(json!({ "player": player, "round": state.round })),
            )
            .await;
        state.broadcast_state();
        Ok(())
    }

    /// Starts the game: every joined player must have a character and at
    /// least `min_players` must be seated. The first player in join order
    /// takes the first turn.
    pub async fn start_game(&self, state: &mut GameState) -> Result<(), GameError> {
        if state.phase != GamePhase::Lobby {
            return Err(GameError::GameAlreadyStarted);
        }
        if let Some(missing) = state
            .player_in_order
            .iter()
            .find(|player| !state.players.contains_key(*player))
        {
            return Err(GameError::CharacterNotSelected(missing.clone()));
        }
        let required = self.rules().min_players.max(1);
        let present = state.player_in_order.len();
        if present < required {
            return Err(GameError::NotEnoughPlayers { required, present });
        }
        let first = state.player_in_order[0].clone();

        state.phase = GamePhase::InProgress;
        state.round = 1;
        let order = state.player_in_order.clone();
        state.log(format!(
            "Game started with {}",
            order.iter().map(PlayerId::as_str).collect::<Vec<_>>().join(", ")
        ));
        state
            .dispatch(EventKind::GameStart, to_payload(json!({ "players": order, "round": 1 })))
            .await;

        self.begin_turn(state, &first).await?;
        state.broadcast_state();
        Ok(())
    }

    /// Hands the turn to the next living player after `previous`.
    ///
    /// Wrapping past the end of the rotation starts a new round and fires
    /// `ROUND_CHANGE`. With fewer than two living players the game ends,
    /// `GAME_END` fires and `None` is returned.
    pub async fn advance_turn(&self, state: &mut GameState, previous: &PlayerId) -> Result<Option<PlayerId>, GameError> {
        if state.phase != GamePhase::InProgress {
            return Err(GameError::GameNotStarted);
        }
        if let Some(current) = state.current_turn.clone() {
            debug!("Turn still held by {}, not advancing", current);
            return Ok(Some(current));
        }

        let alive = state.alive_players();
        if alive.len() < 2 {
            let winner = alive.into_iter().next();
            state.phase = GamePhase::Finished;
            match &winner {
                Some(player) => state.log(format!("Game over, {} wins", player)),
                None => state.log("Game over, no survivors"),
            }
            state
                .dispatch(EventKind::GameEnd, to_payload(json!({ "winner": winner })))
                .await;
            state.broadcast_state();
            return Ok(None);
        }

        let order = state.player_in_order.clone();
        let start = order
            .iter()
            .position(|player| player == previous)
            .map(|index| index + 1)
            .unwrap_or(0);
        let mut wrapped = false;
        let mut next = None;
        for step in 0..order.len() {
            let index = start + step;
            if index >= order.len() {
                wrapped = true;
            }
            let candidate = &order[index % order.len()];
            if alive.contains(candidate) {
                next = Some(candidate.clone());
                break;
            }
        }
        let Some(next) = next else {
            return Err(GameError::ActionFailed("no living player to take the turn".to_string()));
        };

        if wrapped {
            state.round += 1;
            state.log(format!("Round {} begins", state.round));
            state
                .dispatch(EventKind::RoundChange, to_payload(json!({ "round": state.round })))
                .await;
        }
        self.begin_turn(state, &next).await?;
        state.broadcast_state();
        Ok(Some(next))
    }

    /// Gives `player` the turn and runs their turn-start upkeep: cooldowns,
    /// decaying statuses and MP restore.
    async fn begin_turn(&self, state: &mut GameState, player: &PlayerId) -> Result<(), GameError> {
        state.current_turn = Some(player.clone());

        let character = state.require_character_mut(player)?;
        character.tick_cooldowns();
        let expired = character.tick_statuses();
        let restored_mp = character.tick_mana();

        for status in expired {
            debug!("{}'s {} wore off", player, status);
        }
        if let Some(mp) = restored_mp {
            state
                .dispatch(EventKind::MpModified, to_payload(json!({ "player": player, "mp": mp })))
                .await;
        }

        state.log(format!("Round {}: {}'s turn", state.round, player));
        state
            .dispatch(
                EventKind::TurnStart,
                to_payload(json!({ "player": player, "round": state.round })),
            )
            .await;
        Ok(())
    }

    /// Uses one of `player`'s skills on their turn.
    ///
    /// `SKILL_USE {player, skill, cooldown}` listeners may rewrite the
    /// cooldown or cancel; a canceled use fires `SKILL_CANCEL` and changes
    /// nothing.
    pub async fn use_skill(&self, state: &mut GameState, player: &PlayerId, skill: &str) -> Result<SkillOutcome, GameError> {
        if state.phase != GamePhase::InProgress {
            return Err(GameError::GameNotStarted);
        }
        let character = state.require_character(player)?;
        if !character.skills.contains(skill) {
            return Err(GameError::UnknownSkill {
                player: player.clone(),
                skill: skill.to_string(),
            });
        }
        if state.current_turn.as_ref() != Some(player) {
            return Err(GameError::NotYourTurn(player.clone()));
        }
        let remaining = character.cooldown(skill);
        if remaining > 0 {
            return Err(GameError::SkillOnCooldown {
                skill: skill.to_string(),
                remaining,
            });
        }

        let event = state
            .dispatch(
                EventKind::SkillUse,
                to_payload(json!({ "player": player, "skill": skill, "cooldown": self.rules().skill_cooldown })),
            )
            .await;
        if event.is_canceled() {
            state.log(format!("{}'s {} was canceled", player, skill));
            state
                .dispatch(EventKind::SkillCancel, to_payload(json!({ "player": player, "skill": skill })))
                .await;
            return Ok(SkillOutcome::Canceled);
        }

        let cooldown = event
            .get_i64("cooldown")
            .map(|value| u32::try_from(value.max(0)).unwrap_or(u32::MAX))
            .unwrap_or(self.rules().skill_cooldown);
        let character = state.require_character_mut(player)?;
        if cooldown > 0 {
            character.cooldowns.insert(skill.to_string(), cooldown);
        }
        state.log(format!("{} used {} (cooldown {})", player, skill, cooldown));
        state.broadcast_state();
        Ok(SkillOutcome::Used { cooldown })
    }

    /// Teaches `player` a skill, respecting `max_skills`, and fires
    /// `SKILL_APPEND`.
    pub async fn grant_skill(&self, state: &mut GameState, player: &PlayerId, skill: String) -> Result<(), GameError> {
        let limit = self.rules().max_skills;
        let character = state.require_character_mut(player)?;
        if character.skills.len() >= limit {
            return Err(GameError::SkillLimitReached {
                player: player.clone(),
                limit,
            });
        }
        character.skills.insert(skill.clone());
        state.log(format!("{} learned {}", player, skill));
        state
            .dispatch(EventKind::SkillAppend, to_payload(json!({ "player": player, "skill": skill })))
            .await;
        Ok(())
    }
}
