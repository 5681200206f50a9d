//! Random sources for attack rolls.

use rand::Rng;
use std::fmt::Debug;

/// Uniform integer source used for dice rolls.
///
/// Implementations return a value in `[min, max]`; callers guarantee
/// `1 <= min <= max`.
pub trait DiceRoller: Send + Sync + Debug {
    fn roll(&self, min: u32, max: u32) -> u32;
}

/// Thread-local RNG backed dice; the default for live sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomDice;

impl DiceRoller for RandomDice {
    fn roll(&self, min: u32, max: u32) -> u32 {
        rand::thread_rng().gen_range(min..=max.max(min))
    }
}

/// Dice that always land on the same face, clamped into the requested range.
#[derive(Debug, Clone, Copy)]
pub struct FixedDice(pub u32);

impl DiceRoller for FixedDice {
    fn roll(&self, min: u32, max: u32) -> u32 {
        self.0.clamp(min, max.max(min))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_dice_stays_in_range() {
        let dice = RandomDice;
        for _ in 0..500 {
            let roll = dice.roll(1, 4);
            assert!((1..=4).contains(&roll));
        }
        assert_eq!(dice.roll(3, 3), 3);
    }

    #[test]
    fn test_fixed_dice_clamps() {
        assert_eq!(FixedDice(2).roll(1, 4), 2);
        assert_eq!(FixedDice(9).roll(1, 4), 4);
        assert_eq!(FixedDice(0).roll(1, 4), 1);
    }
}
