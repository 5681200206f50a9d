//! # Strife Game Rules
//!
//! The rules engine behind one Strife and Strike session: characters, the
//! combat resolution pipeline, card and turn flow, and the character traits
//! that hook into all of it through the session's event dispatcher.
//!
//! ## Overview
//!
//! - **[`GameState`]**: authoritative state of one session; owns the
//!   dispatcher and the combat system
//! - **[`CombatSystem`]**: attack, heal, draw, play, turn and skill protocols,
//!   each run as a chain of dispatched events
//! - **[`Character`]**: stats, hand, skills, cooldowns and status effects
//! - **[`CharacterTrait`]**: extension point for character abilities
//! - **[`StateBroadcaster`]**: outbound seam for state snapshots
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use strife_event_system::{PlayerId, SessionId};
//! use strife_game::{Character, FixedDice, GameRules, GameState, AttackOutcome};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut state = GameState::new(SessionId::from("demo"), GameRules::default())
//!         .with_dice(Arc::new(FixedDice(2)));
//!
//!     let (alice, bob) = (PlayerId::from("alice"), PlayerId::from("bob"));
//!     state.insert_character(alice.clone(), Character::with_stats(alice.clone(), "A", 30, 10, 5));
//!     state.insert_character(bob.clone(), Character::with_stats(bob.clone(), "B", 20, 5, 3));
//!
//!     let outcome = state.attack(&alice, &bob).await.unwrap();
//!     assert!(matches!(outcome, AttackOutcome::Applied { damage: 14, defender_hp: 6, .. }));
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`state`] - Session game state and lobby operations
//! - [`combat`] - Attack and heal pipelines
//! - [`character`] - Characters, archetypes and status effects
//! - [`traits`] - Character traits
//! - [`dice`] - Random sources for attack rolls
//! - [`broadcast`] - Snapshots and the broadcaster seam

pub mod broadcast;
pub mod character;
pub mod combat;
pub mod dice;
pub mod error;
pub mod rules;
pub mod state;
pub mod traits;
mod turns;


pub use broadcast::{ChannelBroadcaster, GameSnapshot, NoopBroadcaster, StateBroadcaster};
pub use character::{Archetype, BaseStats, Character, Status};
pub use combat::{AttackOutcome, CombatSystem, SkillOutcome};
pub use dice::{DiceRoller, FixedDice, RandomDice};
pub use error::GameError;
pub use rules::GameRules;
pub use state::{GamePhase, GameState, LogEntry};
pub use traits::{CharacterTrait, Gifted, KeenEye, Quickened, SelfEncouragement, TraitKind};
