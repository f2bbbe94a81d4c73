//! Game tuning and difficulty presets
//!
//! Every knob the simulation reads lives in [`Settings`]. Settings are checked
//! once, up front, by [`Settings::validate`]; a running session never sees a
//! malformed value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{MAX_LANES, MAX_TICK_DT, OBSTACLE_EXIT_MARGIN};
use crate::sim::state::ObstacleCategory;

/// Configuration rejected at initialization
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: &'static str, value: f64 },

    #[error("{field} must lie in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("min_speed ({min}) must not exceed max_speed ({max})")]
    SpeedBounds { min: f32, max: f32 },

    #[error("spawn floor ({floor_ms} ms) must not exceed base interval ({base_ms} ms)")]
    SpawnInterval { floor_ms: f64, base_ms: f64 },

    #[error("lane count must be between 2 and {max}, got {got}")]
    LaneCount { got: usize, max: usize },

    #[error("start lane {lane} is outside 0..{lanes}")]
    StartLane { lane: usize, lanes: usize },

    #[error("player ({width} px) does not fit a {lane_width} px lane")]
    PlayerTooWide { width: f32, lane_width: f32 },

    #[error(
        "widest obstacle reaches {reach} px from its lane centre, past the {lane_width} px lane spacing"
    )]
    ObstacleTooWide { reach: f32, lane_width: f32 },

    #[error("pass line ({pass_line} px) is at or below the prune line ({prune_line} px)")]
    PassLineOffscreen { pass_line: f32, prune_line: f32 },

    #[error(
        "obstacles can fall {max_step} px in one tick, more than the {window} px scoring window"
    )]
    PassWindowTooNarrow { max_step: f32, window: f32 },

    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Difficulty preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DifficultyPreset {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl DifficultyPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            DifficultyPreset::Easy => "Easy",
            DifficultyPreset::Normal => "Normal",
            DifficultyPreset::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(DifficultyPreset::Easy),
            "normal" | "norm" => Some(DifficultyPreset::Normal),
            "hard" => Some(DifficultyPreset::Hard),
            _ => None,
        }
    }

    /// Starting road speed (px/s)
    pub fn start_speed(&self) -> f32 {
        match self {
            DifficultyPreset::Easy => 150.0,
            DifficultyPreset::Normal => 180.0,
            DifficultyPreset::Hard => 240.0,
        }
    }

    /// Obstacle spawn interval at score 0 (ms)
    pub fn base_interval_ms(&self) -> f64 {
        match self {
            DifficultyPreset::Easy => 1800.0,
            DifficultyPreset::Normal => 1500.0,
            DifficultyPreset::Hard => 1200.0,
        }
    }

    /// Fastest obstacle spawn interval (ms)
    pub fn floor_interval_ms(&self) -> f64 {
        match self {
            DifficultyPreset::Easy => 1000.0,
            DifficultyPreset::Normal => 800.0,
            DifficultyPreset::Hard => 600.0,
        }
    }

    /// Shrink of the hitbox per side (px); larger is more forgiving
    pub fn hitbox_inset(&self) -> f32 {
        match self {
            DifficultyPreset::Easy => 14.0,
            DifficultyPreset::Normal => 10.0,
            DifficultyPreset::Hard => 6.0,
        }
    }
}

/// Simulation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub preset: DifficultyPreset,

    // === Playfield ===
    pub playfield_width: f32,
    pub playfield_height: f32,
    pub lane_count: usize,
    /// Lane the player starts in (0 = leftmost)
    pub start_lane: usize,

    // === Player ===
    pub player_width: f32,
    pub player_height: f32,
    /// Gap between the player's bottom edge and the bottom of the playfield
    pub player_bottom_offset: f32,
    /// Fraction of the remaining distance covered per 60 Hz frame (1.0 = snap)
    pub lane_change_rate: f32,

    // === Obstacle spawning ===
    pub base_interval_ms: f64,
    pub floor_interval_ms: f64,
    /// Interval shrink per score point (ms)
    pub interval_score_factor: f64,
    /// A lane stays reserved while an obstacle's top edge is above this line (px)
    pub reservation_window_px: f32,
    /// Refuse a spawn that would leave no open lane in the spawn band
    pub keep_open_lane: bool,
    /// Random extra fall speed for vehicles (px/s)
    pub speed_jitter: f32,

    // === Power-up spawning ===
    pub powerup_cooldown_ms: f64,
    pub powerup_score_threshold: u64,
    /// Chance per eligible tick that a power-up actually spawns
    pub powerup_spawn_chance: f32,
    pub powerup_reservation_px: f32,

    // === Difficulty ===
    pub start_speed: f32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub speed_step: f32,
    /// Speed rises once per this many cumulative points
    pub speed_step_points: u64,

    // === Collision & scoring ===
    pub hitbox_inset: f32,
    /// Lateral centre distance under which a pass counts as a perfect dodge
    pub near_miss_px: f32,
    /// Vertical clearance below the player before an obstacle counts as passed
    pub pass_margin_px: f32,
    pub bonus_points: u64,

    // === Modifiers ===
    pub shield_duration_ms: f64,
    pub max_shield_charges: u8,
    pub slow_motion_duration_ms: f64,
    pub slow_motion_factor: f32,
    pub boost_duration_ms: f64,
    pub boost_multiplier: u64,

    // === Lives ===
    /// Spare lives at session start; each one soaks up an unshielded hit
    pub starting_extra_lives: u8,
    /// Cap on spare lives held at once
    pub max_extra_lives: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_preset(DifficultyPreset::Normal)
    }
}

impl Settings {
    /// Create settings from a difficulty preset (applies preset defaults)
    pub fn from_preset(preset: DifficultyPreset) -> Self {
        let start_speed = preset.start_speed();
        Self {
            preset,

            playfield_width: 400.0,
            playfield_height: 700.0,
            lane_count: 4,
            start_lane: 1,

            player_width: 60.0,
            player_height: 90.0,
            player_bottom_offset: 60.0,
            lane_change_rate: 0.2,

            base_interval_ms: preset.base_interval_ms(),
            floor_interval_ms: preset.floor_interval_ms(),
            interval_score_factor: 2.5,
            reservation_window_px: 250.0,
            keep_open_lane: true,
            speed_jitter: 120.0,

            powerup_cooldown_ms: 8000.0,
            powerup_score_threshold: 100,
            powerup_spawn_chance: 0.3,
            powerup_reservation_px: 300.0,

            start_speed,
            min_speed: start_speed,
            max_speed: 480.0,
            speed_step: 12.0,
            speed_step_points: 100,

            hitbox_inset: preset.hitbox_inset(),
            near_miss_px: 120.0,
            pass_margin_px: 20.0,
            bonus_points: 50,

            shield_duration_ms: 5000.0,
            max_shield_charges: 1,
            slow_motion_duration_ms: 3000.0,
            slow_motion_factor: 0.5,
            boost_duration_ms: 4000.0,
            boost_multiplier: 2,

            starting_extra_lives: 0,
            max_extra_lives: 4,
        }
    }

    /// Parse settings from JSON and validate them. Missing fields fall back to
    /// the Normal preset.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Width of a single lane
    pub fn lane_width(&self) -> f32 {
        self.playfield_width / self.lane_count as f32
    }

    /// Horizontal centre of a lane
    pub fn lane_center(&self, lane: usize) -> f32 {
        (lane as f32 + 0.5) * self.lane_width()
    }

    /// Fixed top edge of the player
    pub fn player_y(&self) -> f32 {
        self.playfield_height - self.player_height - self.player_bottom_offset
    }

    /// Obstacles below this line count as passed
    pub fn pass_line(&self) -> f32 {
        self.player_y() + self.player_height + self.pass_margin_px
    }

    /// Obstacles below this line are pruned
    pub fn prune_line(&self) -> f32 {
        self.playfield_height + OBSTACLE_EXIT_MARGIN
    }

    /// Fastest any obstacle can fall (px/s), at top speed with full jitter
    pub fn max_fall_speed(&self) -> f32 {
        ObstacleCategory::ALL
            .iter()
            .map(|c| {
                let jitter = if c.is_vehicle() { self.speed_jitter } else { 0.0 };
                self.max_speed * c.speed_bias() + jitter
            })
            .fold(0.0, f32::max)
    }

    /// Furthest the widest obstacle's hitbox reaches toward the player's
    /// centre while both sit centred in adjacent lanes
    pub fn obstacle_reach(&self) -> f32 {
        let widest = ObstacleCategory::ALL
            .iter()
            .map(|c| c.size().x)
            .fold(0.0, f32::max);
        let player_half = (self.player_width / 2.0 - self.hitbox_inset).max(0.0);
        let obstacle_half = (widest / 2.0 - self.hitbox_inset).max(0.0);
        player_half + obstacle_half
    }

    /// Reject anything the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("playfield_width", self.playfield_width as f64)?;
        positive("playfield_height", self.playfield_height as f64)?;
        positive("player_width", self.player_width as f64)?;
        positive("player_height", self.player_height as f64)?;
        positive("base_interval_ms", self.base_interval_ms)?;
        positive("floor_interval_ms", self.floor_interval_ms)?;
        positive("powerup_cooldown_ms", self.powerup_cooldown_ms)?;
        positive("min_speed", self.min_speed as f64)?;
        positive("speed_step_points", self.speed_step_points as f64)?;
        positive("shield_duration_ms", self.shield_duration_ms)?;
        positive("slow_motion_duration_ms", self.slow_motion_duration_ms)?;
        positive("boost_duration_ms", self.boost_duration_ms)?;
        positive("max_shield_charges", self.max_shield_charges as f64)?;

        in_range("interval_score_factor", self.interval_score_factor, 0.0, f64::MAX)?;
        in_range("speed_step", self.speed_step as f64, 0.0, f64::MAX)?;
        in_range("speed_jitter", self.speed_jitter as f64, 0.0, f64::MAX)?;
        in_range("hitbox_inset", self.hitbox_inset as f64, 0.0, f64::MAX)?;
        in_range("near_miss_px", self.near_miss_px as f64, 0.0, f64::MAX)?;
        in_range("pass_margin_px", self.pass_margin_px as f64, 0.0, f64::MAX)?;
        in_range("reservation_window_px", self.reservation_window_px as f64, 0.0, f64::MAX)?;
        in_range("powerup_reservation_px", self.powerup_reservation_px as f64, 0.0, f64::MAX)?;
        in_range("powerup_spawn_chance", self.powerup_spawn_chance as f64, 0.0, 1.0)?;
        in_range("slow_motion_factor", self.slow_motion_factor as f64, 0.01, 1.0)?;
        in_range("lane_change_rate", self.lane_change_rate as f64, 0.01, 1.0)?;
        in_range("boost_multiplier", self.boost_multiplier as f64, 1.0, 100.0)?;
        in_range(
            "starting_extra_lives",
            self.starting_extra_lives as f64,
            0.0,
            self.max_extra_lives as f64,
        )?;

        if self.lane_count < 2 || self.lane_count > MAX_LANES {
            return Err(ConfigError::LaneCount {
                got: self.lane_count,
                max: MAX_LANES,
            });
        }
        if self.start_lane >= self.lane_count {
            return Err(ConfigError::StartLane {
                lane: self.start_lane,
                lanes: self.lane_count,
            });
        }
        if self.player_width > self.lane_width() {
            return Err(ConfigError::PlayerTooWide {
                width: self.player_width,
                lane_width: self.lane_width(),
            });
        }
        // Strict overlap: touching at exactly the lane spacing is still clear
        if self.obstacle_reach() > self.lane_width() {
            return Err(ConfigError::ObstacleTooWide {
                reach: self.obstacle_reach(),
                lane_width: self.lane_width(),
            });
        }
        if self.min_speed > self.max_speed {
            return Err(ConfigError::SpeedBounds {
                min: self.min_speed,
                max: self.max_speed,
            });
        }
        in_range(
            "start_speed",
            self.start_speed as f64,
            self.min_speed as f64,
            self.max_speed as f64,
        )?;
        if self.floor_interval_ms > self.base_interval_ms {
            return Err(ConfigError::SpawnInterval {
                floor_ms: self.floor_interval_ms,
                base_ms: self.base_interval_ms,
            });
        }

        // Every obstacle must be seen between the pass line and the prune line
        // on at least one tick, or it is dropped unscored
        let window = self.prune_line() - self.pass_line();
        if window <= 0.0 {
            return Err(ConfigError::PassLineOffscreen {
                pass_line: self.pass_line(),
                prune_line: self.prune_line(),
            });
        }
        let max_step = self.max_fall_speed() * MAX_TICK_DT;
        if max_step > window {
            return Err(ConfigError::PassWindowTooNarrow { max_step, window });
        }
        Ok(())
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    // NaN fails this comparison too
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
