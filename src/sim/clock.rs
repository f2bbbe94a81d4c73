//! Active playtime clock
//!
//! Counts only the time the session spends Running. Spawn cooldowns and
//! modifier expiry are all measured against it, so time spent paused is
//! invisible to gameplay. Stored in whole microseconds so that summing frame
//! deltas does not drift.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveClock {
    micros: u64,
}

impl ActiveClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tick's worth of running time. Negative or NaN deltas count as zero.
    pub fn advance(&mut self, dt: f32) {
        let micros = (dt.max(0.0) as f64 * 1_000_000.0).round() as u64;
        self.micros = self.micros.saturating_add(micros);
    }

    pub fn now_ms(&self) -> f64 {
        self.micros as f64 / 1000.0
    }
}
