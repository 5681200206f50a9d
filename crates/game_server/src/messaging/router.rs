//! Command routing from queued events to game state operations.
//!
//! | Command           | Payload                                   | Operation                        |
//! |-------------------|-------------------------------------------|----------------------------------|
//! | `PLAYER_JOIN`     | `player`                                  | join the lobby                   |
//! | `PLAYER_LEAVE`    | `player`                                  | leave the session                |
//! | `CHARACTER_SELECT`| `player, character, archetype, traits?`   | pick a character                 |
//! | `GAME_START`      | -                                         | start the game                   |
//! | `PRE_ATTACK`      | `attacker, defender`                      | attack pipeline                  |
//! | `PRE_HEAL`        | `target, amount`                          | heal request pipeline            |
//! | `DRAW_CARD`       | `player, count?`                          | draw (default one card)          |
//! | `PLAY_CARD`       | `player, card`                            | play a card                      |
//! | `TURN_END`        | `player`                                  | end the turn and hand it on      |
//! | `SKILL_USE`       | `player, skill`                           | use a skill                      |
//!
//! Anything else is refused with a validation error.

use strife_event_system::{EventKind, GameEvent, PlayerId};
use strife_game::{Archetype, AttackOutcome, GameError, GameState, TraitKind};
use tracing::{debug, trace};

/// Runs one command against `state`.
///
/// Called by the session worker with the state lock held. Validation
/// failures come back as [`GameError`]s and leave the state untouched.
pub async fn route_command(state: &mut GameState, event: &GameEvent) -> Result<(), GameError> {
    trace!("Routing {} ({}) in session {}", event.kind, event.id, state.session_id());

    match event.kind {
        EventKind::PlayerJoin => state.player_join(player_field(event, "player")?).await,
        EventKind::PlayerLeave => state.player_leave(&player_field(event, "player")?).await,
        EventKind::CharacterSelect => {
            let player = player_field(event, "player")?;
            let character = str_field(event, "character")?;
            let archetype: Archetype = str_field(event, "archetype")?.parse()?;
            let traits = trait_list(event)?;
            state.select_character(&player, character, archetype, &traits).await
        }
        EventKind::GameStart => state.start_game().await,
        EventKind::PreAttack => {
            let attacker = player_field(event, "attacker")?;
            let defender = player_field(event, "defender")?;
            match state.attack(&attacker, &defender).await? {
                AttackOutcome::Canceled { reason } => {
                    debug!("Attack {} -> {} canceled: {:?}", attacker, defender, reason);
                }
                AttackOutcome::Applied { damage, defender_hp, .. } => {
                    debug!("Attack {} -> {} dealt {} ({} left)", attacker, defender, damage, defender_hp);
                }
            }
            Ok(())
        }
        EventKind::PreHeal => {
            let target = player_field(event, "target")?;
            let amount = count_field(event, "amount")?
                .ok_or_else(|| GameError::InvalidPayload(format!("{} requires an 'amount' count", event.kind)))?;
            let amount = u32::try_from(amount)
                .map_err(|_| GameError::InvalidPayload(format!("heal amount {} is too large", amount)))?;
            let combat = state.combat_system();
            combat.request_heal(state, &target, amount).await.map(|_| ())
        }
        EventKind::DrawCard => {
            let player = player_field(event, "player")?;
            let count = count_field(event, "count")?.unwrap_or(1);
            let count = usize::try_from(count)
                .map_err(|_| GameError::InvalidPayload(format!("draw count {} is too large", count)))?;
            state.draw(&player, count).await.map(|_| ())
        }
        EventKind::PlayCard => {
            let player = player_field(event, "player")?;
            let card = str_field(event, "card")?;
            state.play(&player, card).await
        }
        EventKind::TurnEnd => {
            let player = player_field(event, "player")?;
            state.end_turn(&player).await?;
            state.advance_turn(&player).await.map(|_| ())
        }
        EventKind::SkillUse => {
            let player = player_field(event, "player")?;
            let skill = str_field(event, "skill")?;
            state.use_skill(&player, skill).await.map(|_| ())
        }
        other => Err(GameError::InvalidPayload(format!("unsupported command {}", other))),
    }
}

fn str_field<'a>(event: &'a GameEvent, key: &str) -> Result<&'a str, GameError> {
    event
        .get_str(key)
        .ok_or_else(|| GameError::InvalidPayload(format!("{} requires a '{}' string", event.kind, key)))
}

fn player_field(event: &GameEvent, key: &str) -> Result<PlayerId, GameError> {
    str_field(event, key).map(PlayerId::from)
}

/// Optional non-negative integer field.
fn count_field(event: &GameEvent, key: &str) -> Result<Option<u64>, GameError> {
    match event.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| GameError::InvalidPayload(format!("'{}' must be a non-negative integer", key))),
    }
}

fn trait_list(event: &GameEvent) -> Result<Vec<TraitKind>, GameError> {
    let Some(value) = event.get("traits") else {
        return Ok(Vec::new());
    };
    let items = value
        .as_array()
        .ok_or_else(|| GameError::InvalidPayload("'traits' must be a list of trait names".to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| GameError::InvalidPayload("trait names must be strings".to_string()))?
                .parse::<TraitKind>()
        })
        .collect()
}
