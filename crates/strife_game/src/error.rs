//! Game rule errors.
//!
//! Every variant except [`GameError::ActionFailed`] is a validation failure:
//! the request was rejected before any state changed. `ActionFailed` means a
//! resolution pipeline hit an unexpected condition part way through and was
//! stopped in a terminal state.

use strife_event_system::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Unknown player: {0}")]
    UnknownPlayer(PlayerId),
    #[error("Player {0} has already joined")]
    PlayerAlreadyJoined(PlayerId),
    #[error("Player {0} has not selected a character")]
    CharacterNotSelected(PlayerId),
    #[error("Character '{0}' is already selected")]
    CharacterTaken(String),
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
    #[error("Player {player} does not hold card '{card}'")]
    InvalidCard { player: PlayerId, card: String },
    #[error("It is not {0}'s turn")]
    NotYourTurn(PlayerId),
    #[error("Hand limit reached for {player}: holding {held}, drawing {requested}, limit {limit}")]
    HandLimitReached {
        player: PlayerId,
        held: usize,
        requested: usize,
        limit: usize,
    },
    #[error("Deck exhausted: requested {requested}, {available} left")]
    DeckExhausted { requested: usize, available: usize },
    #[error("Player {player} does not know skill '{skill}'")]
    UnknownSkill { player: PlayerId, skill: String },
    #[error("Skill '{skill}' is on cooldown for {remaining} more turns")]
    SkillOnCooldown { skill: String, remaining: u32 },
    #[error("Player {player} already knows {limit} skills")]
    SkillLimitReached { player: PlayerId, limit: usize },
    #[error("Game has not started")]
    GameNotStarted,
    #[error("Game has already started")]
    GameAlreadyStarted,
    #[error("Not enough players: {present} of {required} required")]
    NotEnoughPlayers { required: usize, present: usize },
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Action failed: {0}")]
    ActionFailed(String),
}

impl GameError {
    /// True for rejections that happened before any state change.
    pub fn is_validation(&self) -> bool {
        !matches!(self, GameError::ActionFailed(_))
    }
}
