//! Entity and session types
//!
//! Positions are top-left corners in playfield pixels, y growing downward.
//! Everything that falls moves along +y.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::collision::Aabb;
use crate::consts::NOMINAL_FPS;
use crate::settings::Settings;

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for a start command
    Idle,
    /// Active gameplay
    Running,
    /// Suspended; nothing advances, including the playtime clock
    Paused,
    /// Fatal collision happened; only reset leaves this state
    Terminated,
}

/// Broad obstacle class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleClass {
    Light,
    Medium,
    Heavy,
    Hazard,
}

/// Obstacle types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObstacleCategory {
    Motorcycle,
    Car,
    Truck,
    Barrier,
    Roadwork,
    OilSpill,
}

impl ObstacleCategory {
    /// Draw order for the spawn weight table
    pub const ALL: [ObstacleCategory; 6] = [
        ObstacleCategory::Car,
        ObstacleCategory::Truck,
        ObstacleCategory::Motorcycle,
        ObstacleCategory::Barrier,
        ObstacleCategory::Roadwork,
        ObstacleCategory::OilSpill,
    ];

    pub fn class(self) -> ObstacleClass {
        match self {
            ObstacleCategory::Motorcycle => ObstacleClass::Light,
            ObstacleCategory::Car => ObstacleClass::Medium,
            ObstacleCategory::Truck => ObstacleClass::Heavy,
            ObstacleCategory::Barrier | ObstacleCategory::Roadwork | ObstacleCategory::OilSpill => {
                ObstacleClass::Hazard
            }
        }
    }

    /// Visual bounds (width, height)
    pub fn size(self) -> Vec2 {
        match self {
            ObstacleCategory::Motorcycle => Vec2::new(35.0, 70.0),
            ObstacleCategory::Car => Vec2::new(60.0, 100.0),
            ObstacleCategory::Truck => Vec2::new(80.0, 140.0),
            ObstacleCategory::Barrier => Vec2::new(90.0, 40.0),
            ObstacleCategory::Roadwork => Vec2::new(80.0, 60.0),
            ObstacleCategory::OilSpill => Vec2::new(90.0, 30.0),
        }
    }

    /// Points for passing one
    pub fn score_value(self) -> u64 {
        match self {
            ObstacleCategory::Car => 10,
            ObstacleCategory::Motorcycle => 15,
            ObstacleCategory::Barrier => 20,
            ObstacleCategory::Truck => 25,
            ObstacleCategory::Roadwork => 30,
            ObstacleCategory::OilSpill => 50,
        }
    }

    /// Fall speed relative to the road
    pub fn speed_bias(self) -> f32 {
        match self {
            ObstacleCategory::Motorcycle => 1.15,
            ObstacleCategory::Truck => 0.85,
            _ => 1.0,
        }
    }

    /// Relative spawn frequency
    pub fn spawn_weight(self) -> f32 {
        match self {
            ObstacleCategory::Car => 40.0,
            ObstacleCategory::Truck => 15.0,
            ObstacleCategory::Motorcycle => 20.0,
            ObstacleCategory::Barrier => 15.0,
            ObstacleCategory::Roadwork => 8.0,
            ObstacleCategory::OilSpill => 2.0,
        }
    }

    /// Vehicles drive with some speed jitter; hazards sit still on the road
    pub fn is_vehicle(self) -> bool {
        self.class() != ObstacleClass::Hazard
    }
}

/// An obstacle entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: u32,
    pub category: ObstacleCategory,
    pub lane: usize,
    pub pos: Vec2,
    pub size: Vec2,
    /// Fall speed (px/s)
    pub vel: f32,
    /// Crossed the player's row without a collision
    pub passed: bool,
    /// Active playtime at spawn (ms)
    pub spawned_at_ms: f64,
}

impl Obstacle {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    pub fn center_x(&self) -> f32 {
        self.pos.x + self.size.x / 2.0
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerUpKind {
    /// Absorbs the next hit
    Shield,
    /// Halves entity motion for a while
    SlowMotion,
    /// Instant points
    BonusPoints,
    /// Multiplies pass points for a while
    SpeedBoost,
    /// A spare life that lasts until used
    ExtraLife,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 5] = [
        PowerUpKind::Shield,
        PowerUpKind::SlowMotion,
        PowerUpKind::BonusPoints,
        PowerUpKind::SpeedBoost,
        PowerUpKind::ExtraLife,
    ];

    pub fn spawn_weight(self) -> f32 {
        match self {
            PowerUpKind::Shield => 30.0,
            PowerUpKind::SlowMotion => 30.0,
            PowerUpKind::BonusPoints => 25.0,
            PowerUpKind::SpeedBoost => 15.0,
            PowerUpKind::ExtraLife => 10.0,
        }
    }
}

/// A pickup entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub lane: usize,
    pub pos: Vec2,
    pub size: Vec2,
    pub vel: f32,
    pub collected: bool,
}

impl PowerUp {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }
}

/// What a particle burst was for (renderer picks the colour)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Pass,
    ShieldHit,
    Crash,
    Pickup(PowerUpKind),
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    /// Seconds left
    pub life: f32,
    pub size: f32,
    pub kind: ParticleKind,
}

/// Maximum particles
pub const MAX_PARTICLES: usize = 256;

/// The player's car
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    /// Lane the car is heading for
    pub lane: usize,
    /// Current left edge; eases toward the lane slot
    pub x: f32,
    /// Top edge, fixed for the session
    pub y: f32,
    pub size: Vec2,
}

impl Player {
    /// A player snapped into the configured start lane
    pub fn new(settings: &Settings) -> Self {
        let size = Vec2::new(settings.player_width, settings.player_height);
        Self {
            lane: settings.start_lane,
            x: Self::slot_x(settings, settings.start_lane, size.x),
            y: settings.player_y(),
            size,
        }
    }

    /// Left edge that centres a car of `width` in `lane`
    pub fn slot_x(settings: &Settings, lane: usize, width: f32) -> f32 {
        settings.lane_center(lane) - width / 2.0
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_pos_size(Vec2::new(self.x, self.y), self.size)
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.size.x / 2.0
    }

    /// Retarget one lane over. Returns false at the road edge.
    pub fn shift_lane(&mut self, delta: i32, lane_count: usize) -> bool {
        let target = self.lane as i64 + delta as i64;
        if target < 0 || target >= lane_count as i64 {
            return false;
        }
        self.lane = target as usize;
        true
    }

    /// Move toward the current lane's slot. `rate` is the fraction of the gap
    /// closed per 60 Hz frame.
    pub fn ease_toward_lane(&mut self, settings: &Settings, dt: f32, rate: f32) {
        let target = Self::slot_x(settings, self.lane, self.size.x);
        let diff = target - self.x;
        if diff.abs() < 1.0 {
            self.x = target;
            return;
        }
        let frames = dt * NOMINAL_FPS;
        let alpha = 1.0 - (1.0 - rate.clamp(0.0, 1.0)).powf(frames);
        self.x += diff * alpha;
    }
}

/// Allocator for entity ids, shared by obstacles and power-ups
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityIds {
    next: u32,
}

impl Default for EntityIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl EntityIds {
    /// Allocate a new entity ID
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Modifiers with a timed lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKind {
    Shield,
    SlowMotion,
    SpeedBoost,
}

/// Things that happened during a tick, for audio/visual collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    SessionStarted,
    Paused,
    Resumed,
    LaneChanged { lane: usize },
    ObstacleSpawned { id: u32, lane: usize, category: ObstacleCategory },
    PowerUpSpawned { id: u32, lane: usize, kind: PowerUpKind },
    ObstaclePassed { id: u32, points: u64, perfect: bool },
    ShieldAbsorbed { obstacle_ids: Vec<u32>, charges_left: u8 },
    LifeLost { obstacle_ids: Vec<u32>, lives_left: u8 },
    PowerUpCollected { id: u32, kind: PowerUpKind, points: u64 },
    ModifierExpired { modifier: ModifierKind },
    SpeedIncreased { speed: f32 },
    SessionEnded { score: u64 },
}
