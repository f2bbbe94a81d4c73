//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time comes only from the `dt` handed to each tick
//! - Randomness comes only from the injected [`RandomSource`]
//! - Stable iteration order (insertion order, ids ascending)
//! - No rendering, audio or storage dependencies

pub mod clock;
pub mod collision;
pub mod entities;
pub mod progression;
pub mod rng;
pub mod spawner;
pub mod state;
pub mod tick;

pub use clock::ActiveClock;
pub use collision::{Aabb, ContactOutcome};
pub use entities::{EntityStore, LaneOccupancy};
pub use progression::{ActiveModifiers, ProgressionState, SessionStats, SessionSummary};
pub use rng::RandomSource;
pub use spawner::{Spawner, weighted_pick};
pub use state::{
    GameEvent, GamePhase, ModifierKind, Obstacle, ObstacleCategory, ObstacleClass, Particle,
    ParticleKind, Player, PowerUp, PowerUpKind,
};
pub use tick::{Command, PlayerView, Simulation, Snapshot};
