//! # Characters
//!
//! A [`Character`] is the combat-facing half of a player: vital stats, the
//! mana resource, the card hand, known skills with their cooldowns, active
//! status effects and the names of the traits it was built with.
//!
//! ## Invariants
//!
//! - `0 <= hp <= hp_max` and `is_alive == (hp > 0)`; every hp mutation goes
//!   through [`Character::take_damage`] or [`Character::restore_hp`]
//! - `traits` is fixed at construction
//! - hand size is bounded by the session's `GameRules::hand_limit`, enforced
//!   by the draw protocol
//!
//! ## Archetypes
//!
//! | Archetype  | hp_max | attack | defense |
//! |------------|--------|--------|---------|
//! | Supporter  | 1000   | 80     | 50      |
//! | Balance    | 1000   | 95     | 35      |
//! | Challenger | 1000   | 105    | 25      |
//! | Beast      | 900    | 125    | 20      |
//! | Defender   | 1000   | 65     | 65      |
//! | Vitality   | 1250   | 75     | 45      |

use crate::error::GameError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use strife_event_system::PlayerId;

/// Base stat line a character can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Archetype {
    Supporter,
    Balance,
    Challenger,
    Beast,
    Defender,
    Vitality,
}

/// `(hp_max, attack, defense)` for an archetype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseStats {
    pub hp_max: u32,
    pub attack: u32,
    pub defense: u32,
}

impl Archetype {
    pub const ALL: [Archetype; 6] = [
        Archetype::Supporter,
        Archetype::Balance,
        Archetype::Challenger,
        Archetype::Beast,
        Archetype::Defender,
        Archetype::Vitality,
    ];

    pub const fn base_stats(self) -> BaseStats {
        let (hp_max, attack, defense) = match self {
            Archetype::Supporter => (1000, 80, 50),
            Archetype::Balance => (1000, 95, 35),
            Archetype::Challenger => (1000, 105, 25),
            Archetype::Beast => (900, 125, 20),
            Archetype::Defender => (1000, 65, 65),
            Archetype::Vitality => (1250, 75, 45),
        };
        BaseStats { hp_max, attack, defense }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::Supporter => "SUPPORTER",
            Archetype::Balance => "BALANCE",
            Archetype::Challenger => "CHALLENGER",
            Archetype::Beast => "BEAST",
            Archetype::Defender => "DEFENDER",
            Archetype::Vitality => "VITALITY",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Archetype::ALL
            .iter()
            .copied()
            .find(|archetype| archetype.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| GameError::InvalidPayload(format!("unknown archetype '{}'", s)))
    }
}

/// One active status effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub intensity: u32,
    /// Stacking layers; a decaying status loses one per owner turn start
    pub layer: u32,
    pub decay: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub owner: PlayerId,
    pub archetype: Option<Archetype>,

    hp: u32,
    hp_max: u32,
    pub attack: u32,
    pub defense: u32,
    is_alive: bool,

    pub mp: u32,
    pub mp_max: u32,
    /// MP restored each time the restore countdown elapses
    pub mp_restore: u32,
    /// Turns left until the next MP restore
    pub mp_restore_cd: u32,
    /// Countdown reset value; zero disables MP restore
    pub mp_restore_interval: u32,

    pub hand: Vec<String>,
    pub skills: BTreeSet<String>,
    pub cooldowns: BTreeMap<String, u32>,
    pub statuses: BTreeMap<String, Status>,
    traits: BTreeSet<String>,
}

impl Character {
    /// Builds a character from an archetype's base stat line.
    pub fn new(owner: PlayerId, name: impl Into<String>, archetype: Archetype) -> Self {
        let stats = archetype.base_stats();
        let mut character = Self::with_stats(owner, name, stats.hp_max, stats.attack, stats.defense);
        character.archetype = Some(archetype);
        character
    }

    /// Builds a character from explicit stats, at full health.
    pub fn with_stats(owner: PlayerId, name: impl Into<String>, hp_max: u32, attack: u32, defense: u32) -> Self {
        Self {
            name: name.into(),
            owner,
            archetype: None,
            hp: hp_max,
            hp_max,
            attack,
            defense,
            is_alive: hp_max > 0,
            mp: 0,
            mp_max: 0,
            mp_restore: 0,
            mp_restore_cd: 0,
            mp_restore_interval: 0,
            hand: Vec::new(),
            skills: BTreeSet::new(),
            cooldowns: BTreeMap::new(),
            statuses: BTreeMap::new(),
            traits: BTreeSet::new(),
        }
    }

    /// Sets the MP profile: pool size, amount per restore and turns between restores.
    pub fn with_mana(mut self, mp_max: u32, mp_restore: u32, interval: u32) -> Self {
        self.mp_max = mp_max;
        self.mp = mp_max;
        self.mp_restore = mp_restore;
        self.mp_restore_interval = interval;
        self.mp_restore_cd = interval;
        self
    }

    /// Records the traits this character carries. Only available while building.
    pub fn with_traits<I, S>(mut self, traits: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.traits = traits.into_iter().map(Into::into).collect();
        self
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn hp_max(&self) -> u32 {
        self.hp_max
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn traits(&self) -> &BTreeSet<String> {
        &self.traits
    }

    /// Subtracts damage, saturating at zero. Returns the remaining hp.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.hp = self.hp.saturating_sub(amount);
        self.is_alive = self.hp > 0;
        self.hp
    }

    /// Adds hp, clamped to `hp_max`. Returns the amount actually restored.
    pub fn restore_hp(&mut self, amount: u32) -> u32 {
        let before = self.hp;
        self.hp = self.hp.saturating_add(amount).min(self.hp_max);
        self.is_alive = self.hp > 0;
        self.hp - before
    }

    /// Applies a status effect. Re-applying an active effect stacks its
    /// layers and keeps the stronger intensity.
    pub fn apply_status(&mut self, effect: impl Into<String>, intensity: u32, layer: u32, decay: bool) {
        self.statuses
            .entry(effect.into())
            .and_modify(|status| {
                status.layer = status.layer.saturating_add(layer);
                status.intensity = status.intensity.max(intensity);
                status.decay = decay;
            })
            .or_insert(Status { intensity, layer, decay });
    }

    /// Removes one layer from every decaying status, dropping the exhausted
    /// ones. Returns the names of the removed statuses.
    pub fn tick_statuses(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for (name, status) in self.statuses.iter_mut() {
            if status.decay {
                status.layer = status.layer.saturating_sub(1);
                if status.layer == 0 {
                    expired.push(name.clone());
                }
            }
        }
        for name in &expired {
            self.statuses.remove(name);
        }
        expired
    }

    /// Counts every cooldown down by one turn, forgetting the finished ones.
    pub fn tick_cooldowns(&mut self) {
        for remaining in self.cooldowns.values_mut() {
            *remaining = remaining.saturating_sub(1);
        }
        self.cooldowns.retain(|_, remaining| *remaining > 0);
    }

    pub fn cooldown(&self, skill: &str) -> u32 {
        self.cooldowns.get(skill).copied().unwrap_or(0)
    }

    /// Advances the MP restore countdown. When it elapses, restores
    /// `mp_restore` (clamped to `mp_max`), resets the countdown and returns
    /// the new MP value.
    pub fn tick_mana(&mut self) -> Option<u32> {
        if self.mp_restore_interval == 0 {
            return None;
        }
        self.mp_restore_cd = self.mp_restore_cd.saturating_sub(1);
        if self.mp_restore_cd > 0 {
            return None;
        }
        self.mp_restore_cd = self.mp_restore_interval;
        self.mp = self.mp.saturating_add(self.mp_restore).min(self.mp_max);
        Some(self.mp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter() -> Character {
        Character::with_stats(PlayerId::from("p1"), "Fighter", 28, 10, 5)
    }

    #[test]
    fn test_archetype_stats_and_names() {
        let beast = Character::new(PlayerId::from("p1"), "Rex", Archetype::Beast);
        assert_eq!((beast.hp(), beast.hp_max(), beast.attack, beast.defense), (900, 900, 125, 20));
        assert_eq!("vitality".parse::<Archetype>().unwrap(), Archetype::Vitality);
        assert!("wizard".parse::<Archetype>().is_err());
    }

    #[test]
    fn test_hp_stays_within_bounds() {
        let mut character = fighter();
        assert_eq!(character.take_damage(10), 18);
        assert!(character.is_alive());

        assert_eq!(character.restore_hp(50), 10);
        assert_eq!(character.hp(), 28);

        assert_eq!(character.take_damage(100), 0);
        assert!(!character.is_alive());
    }

    #[test]
    fn test_status_stacking_and_decay() {
        let mut character = fighter();
        character.apply_status("burn", 3, 1, true);
        character.apply_status("burn", 2, 1, true);
        character.apply_status("guard", 1, 1, false);

        let burn = character.statuses["burn"];
        assert_eq!((burn.intensity, burn.layer), (3, 2));

        assert!(character.tick_statuses().is_empty());
        assert_eq!(character.tick_statuses(), vec!["burn".to_string()]);
        assert!(character.statuses.contains_key("guard"));
    }

    #[test]
    fn test_mana_restores_when_countdown_elapses() {
        let mut character = fighter().with_mana(5, 2, 2);
        character.mp = 1;

        assert_eq!(character.tick_mana(), None);
        assert_eq!(character.tick_mana(), Some(3));
        assert_eq!(character.mp_restore_cd, 2);

        character.mp = 4;
        character.tick_mana();
        assert_eq!(character.tick_mana(), Some(5));
    }

    #[test]
    fn test_cooldowns_tick_down_and_clear() {
        let mut character = fighter();
        character.cooldowns.insert("slash".to_string(), 2);
        character.tick_cooldowns();
        assert_eq!(character.cooldown("slash"), 1);
        character.tick_cooldowns();
        assert_eq!(character.cooldown("slash"), 0);
        assert!(character.cooldowns.is_empty());
    }
}
