//! Game rule configuration.

use serde::{Deserialize, Serialize};

/// Balance and limit values consumed by the rules engine.
///
/// Resolved before any session starts and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Maximum number of cards a hand may hold
    pub hand_limit: usize,
    /// Upper bound of the attack die before trait modifiers
    pub base_dice_bound: u32,
    /// Maximum number of skills a character may know
    pub max_skills: usize,
    /// Players with characters required to start a game
    pub min_players: usize,
    /// Cooldown, in turns, put on a skill after use
    pub skill_cooldown: u32,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            hand_limit: 5,
            base_dice_bound: 4,
            max_skills: 4,
            min_players: 2,
            skill_cooldown: 3,
        }
    }
}

impl GameRules {
    pub fn validate(&self) -> Result<(), String> {
        if self.hand_limit == 0 {
            return Err("hand_limit must be greater than 0".to_string());
        }
        if self.base_dice_bound == 0 {
            return Err("base_dice_bound must be greater than 0".to_string());
        }
        if self.min_players == 0 {
            return Err("min_players must be greater than 0".to_string());
        }
        Ok(())
    }
}
