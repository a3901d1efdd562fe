//! Random Sources
//!
//! Every probabilistic call in the engine draws through [`RandomSource`], so a
//! fixed seed (or a recorded sequence of rolls) reproduces a session exactly.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

/// A source of uniform draws in `[0, 1)`.
pub trait RandomSource {
    fn roll(&mut self) -> f32;
}

/// Seeded production random source
pub struct SimRng(pub SmallRng);

impl SimRng {
    pub fn seeded(seed: u64) -> Self {
        Self(SmallRng::seed_from_u64(seed))
    }
}

impl RandomSource for SimRng {
    fn roll(&mut self) -> f32 {
        self.0.gen::<f32>()
    }
}

/// Replays a recorded sequence of rolls, then returns a fixed fallback.
#[derive(Debug, Clone)]
pub struct ReplayRolls {
    rolls: VecDeque<f32>,
    fallback: f32,
    consumed: usize,
}

impl ReplayRolls {
    /// Fallback is 0.99, which makes every check with a chance below it fail.
    pub fn new(rolls: impl IntoIterator<Item = f32>) -> Self {
        Self {
            rolls: rolls.into_iter().collect(),
            fallback: 0.99,
            consumed: 0,
        }
    }

    pub fn with_fallback(mut self, fallback: f32) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn push(&mut self, roll: f32) {
        self.rolls.push_back(roll);
    }

    /// Number of rolls drawn so far, including fallback draws.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn remaining(&self) -> usize {
        self.rolls.len()
    }
}

impl RandomSource for ReplayRolls {
    fn roll(&mut self) -> f32 {
        self.consumed += 1;
        self.rolls.pop_front().unwrap_or(self.fallback)
    }
}

/// Draws once and reports whether the roll landed below `chance`.
pub fn check(rng: &mut dyn RandomSource, chance: f32) -> bool {
    rng.roll() < chance
}
