//! Neon Lanes - a lane-dodging arcade racer
//!
//! Core modules:
//! - `sim`: Per-tick simulation (spawning, motion, collisions, progression)
//! - `settings`: Tuning knobs, difficulty presets, validation
//! - `persistence`: Session records and lifetime stats handed off at game over
//! - `highscores`: Top-10 leaderboard

pub mod highscores;
pub mod persistence;
pub mod settings;
pub mod sim;

pub use highscores::HighScores;
pub use persistence::{LifetimeStats, SessionRecord, StatsSink};
pub use settings::{ConfigError, DifficultyPreset, Settings};
pub use sim::{Command, GamePhase, Simulation, Snapshot};

/// Game configuration constants
pub mod consts {
    /// Nominal frame rate the per-frame easing rates are expressed against
    pub const NOMINAL_FPS: f32 = 60.0;
    /// Upper bound on a single tick's dt (s); longer frames are clamped
    pub const MAX_TICK_DT: f32 = 0.1;

    /// Most lanes a road can be split into
    pub const MAX_LANES: usize = 8;

    /// Obstacles are pruned this far below the playfield
    pub const OBSTACLE_EXIT_MARGIN: f32 = 100.0;
    /// Power-ups are pruned this far below the playfield
    pub const POWERUP_EXIT_MARGIN: f32 = 50.0;

    /// Power-up pickup size (square)
    pub const POWERUP_SIZE: f32 = 40.0;
    /// Power-ups appear this far above the playfield
    pub const POWERUP_SPAWN_Y: f32 = -50.0;

    /// Road pixels per metre of distance travelled
    pub const PIXELS_PER_METER: f32 = 60.0;

    /// Reaction-time samples kept for the running average
    pub const REACTION_SAMPLES: usize = 10;
}
