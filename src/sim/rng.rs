//! Randomness seam for spawn decisions
//!
//! Spawning is the only consumer of randomness. It draws through
//! [`RandomSource`] so tests can script exact draws.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// A source of uniform draws in `[0, 1)`
pub trait RandomSource {
    fn next_float(&mut self) -> f32;
}

impl RandomSource for Pcg32 {
    fn next_float(&mut self) -> f32 {
        self.random::<f32>()
    }
}

/// Seeded generator used by live sessions
pub fn seeded(seed: u64) -> Pcg32 {
    Pcg32::seed_from_u64(seed)
}

/// Replays a fixed list of draws, cycling when exhausted
#[derive(Debug, Clone)]
pub struct SequenceRng {
    values: Vec<f32>,
    cursor: usize,
}

impl SequenceRng {
    pub fn new(values: impl Into<Vec<f32>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    /// Number of draws taken so far
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for SequenceRng {
    fn next_float(&mut self) -> f32 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        // Keep draws inside [0, 1) whatever the script says
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0 - f32::EPSILON)
        }
    }
}
