//! Score, combo, difficulty and timed modifiers
//!
//! All session progression lives in one [`ProgressionState`] value. The free
//! functions below are the only things that mutate it, one per gameplay
//! outcome, so each rule can be exercised in isolation.
//!
//! Scoring: a pass is worth its category's score value. A perfect dodge
//! (passing within `near_miss_px` of the player) pays that value a second
//! time. SpeedBoost multiplies both.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::state::{ModifierKind, Obstacle, PowerUpKind};
use crate::consts::{PIXELS_PER_METER, REACTION_SAMPLES};
use crate::settings::Settings;

/// Timed effects currently on the player. Expiry times are active playtime (ms).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveModifiers {
    pub shield_charges: u8,
    pub shield_expires_ms: Option<f64>,
    pub slow_expires_ms: Option<f64>,
    pub boost_expires_ms: Option<f64>,
}

impl ActiveModifiers {
    pub fn shielded(&self) -> bool {
        self.shield_charges > 0
    }

    pub fn slowed(&self) -> bool {
        self.slow_expires_ms.is_some()
    }

    pub fn boosted(&self) -> bool {
        self.boost_expires_ms.is_some()
    }

    /// Motion multiplier for entity advance
    pub fn time_scale(&self, settings: &Settings) -> f32 {
        if self.slowed() {
            settings.slow_motion_factor
        } else {
            1.0
        }
    }
}

/// Running statistics for the current session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Metres of road covered
    pub distance_m: f64,
    pub obstacles_avoided: u32,
    pub perfect_dodges: u32,
    pub powerups_collected: u32,
    pub shields_used: u32,
    pub lives_used: u32,
    /// Most recent lane-change reaction times (ms)
    pub reaction_samples_ms: VecDeque<f64>,
}

impl SessionStats {
    /// Mean of the kept reaction samples, 0 when there are none
    pub fn average_reaction_ms(&self) -> f64 {
        if self.reaction_samples_ms.is_empty() {
            return 0.0;
        }
        self.reaction_samples_ms.iter().sum::<f64>() / self.reaction_samples_ms.len() as f64
    }
}

/// Score, combo and difficulty for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    /// Road speed (px/s), within `[min_speed, max_speed]`
    pub speed: f32,
    pub modifiers: ActiveModifiers,
    /// Spare lives; unlike modifiers these never expire
    pub extra_lives: u8,
    pub stats: SessionStats,
}

impl ProgressionState {
    pub fn new(settings: &Settings) -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            speed: settings
                .start_speed
                .clamp(settings.min_speed, settings.max_speed),
            modifiers: ActiveModifiers::default(),
            extra_lives: settings.starting_extra_lives.min(settings.max_extra_lives),
            stats: SessionStats::default(),
        }
    }
}

/// What a pass paid out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassOutcome {
    pub points: u64,
    pub perfect: bool,
    /// New speed if a difficulty step was crossed
    pub speed_up: Option<f32>,
}

/// What a pickup paid out
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectOutcome {
    pub points: u64,
    pub speed_up: Option<f32>,
}

/// Frozen end-of-session figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u64,
    pub max_combo: u32,
    pub final_speed: f32,
    pub distance_m: f64,
    /// Active playtime (ms)
    pub duration_ms: f64,
    pub obstacles_avoided: u32,
    pub perfect_dodges: u32,
    pub powerups_collected: u32,
    pub shields_used: u32,
    pub lives_used: u32,
    pub average_reaction_ms: f64,
}

/// Add points and step the difficulty for every `speed_step_points`
/// boundary crossed. Returns the new speed if it changed.
pub fn award_points(state: &mut ProgressionState, points: u64, settings: &Settings) -> Option<f32> {
    let before = state.score;
    state.score = state.score.saturating_add(points);

    let steps = state.score / settings.speed_step_points - before / settings.speed_step_points;
    if steps == 0 {
        return None;
    }
    let old_speed = state.speed;
    state.speed = (state.speed + settings.speed_step * steps as f32)
        .clamp(settings.min_speed, settings.max_speed)
        .max(old_speed);
    (state.speed > old_speed).then_some(state.speed)
}

/// An obstacle crossed the player's row without touching them
pub fn on_obstacle_passed(
    state: &mut ProgressionState,
    obstacle: &Obstacle,
    lateral_distance: f32,
    settings: &Settings,
) -> PassOutcome {
    let multiplier = if state.modifiers.boosted() {
        settings.boost_multiplier
    } else {
        1
    };
    let base = obstacle.category.score_value().saturating_mul(multiplier);
    let perfect = lateral_distance < settings.near_miss_px;
    let points = if perfect { base.saturating_mul(2) } else { base };

    let speed_up = award_points(state, points, settings);

    state.combo += 1;
    state.max_combo = state.max_combo.max(state.combo);
    state.stats.obstacles_avoided += 1;
    if perfect {
        state.stats.perfect_dodges += 1;
    }

    PassOutcome {
        points,
        perfect,
        speed_up,
    }
}

/// A shield charge soaked up this tick's hits
pub fn on_shield_absorbed(state: &mut ProgressionState) -> u8 {
    let modifiers = &mut state.modifiers;
    modifiers.shield_charges = modifiers.shield_charges.saturating_sub(1);
    if modifiers.shield_charges == 0 {
        modifiers.shield_expires_ms = None;
    }
    state.stats.shields_used += 1;
    modifiers.shield_charges
}

/// A spare life soaked up this tick's hits. The streak is broken all the same.
pub fn on_life_lost(state: &mut ProgressionState) -> u8 {
    state.extra_lives = state.extra_lives.saturating_sub(1);
    state.combo = 0;
    state.stats.lives_used += 1;
    state.extra_lives
}

/// The run is over. Resets combo and freezes the figures.
pub fn on_collision_fatal(state: &mut ProgressionState, now_ms: f64) -> SessionSummary {
    state.combo = 0;
    state.modifiers = ActiveModifiers::default();
    SessionSummary {
        score: state.score,
        max_combo: state.max_combo,
        final_speed: state.speed,
        distance_m: state.stats.distance_m,
        duration_ms: now_ms,
        obstacles_avoided: state.stats.obstacles_avoided,
        perfect_dodges: state.stats.perfect_dodges,
        powerups_collected: state.stats.powerups_collected,
        shields_used: state.stats.shields_used,
        lives_used: state.stats.lives_used,
        average_reaction_ms: state.stats.average_reaction_ms(),
    }
}

/// Apply a pickup. Timed effects are refreshed, not stacked.
pub fn on_powerup_collected(
    state: &mut ProgressionState,
    kind: PowerUpKind,
    now_ms: f64,
    settings: &Settings,
) -> CollectOutcome {
    state.stats.powerups_collected += 1;
    let modifiers = &mut state.modifiers;
    match kind {
        PowerUpKind::Shield => {
            modifiers.shield_charges = modifiers
                .shield_charges
                .saturating_add(1)
                .min(settings.max_shield_charges);
            modifiers.shield_expires_ms = Some(now_ms + settings.shield_duration_ms);
        }
        PowerUpKind::SlowMotion => {
            modifiers.slow_expires_ms = Some(now_ms + settings.slow_motion_duration_ms);
        }
        PowerUpKind::SpeedBoost => {
            modifiers.boost_expires_ms = Some(now_ms + settings.boost_duration_ms);
        }
        PowerUpKind::ExtraLife => {
            state.extra_lives = state
                .extra_lives
                .saturating_add(1)
                .min(settings.max_extra_lives);
        }
        PowerUpKind::BonusPoints => {
            let speed_up = award_points(state, settings.bonus_points, settings);
            return CollectOutcome {
                points: settings.bonus_points,
                speed_up,
            };
        }
    }
    CollectOutcome {
        points: 0,
        speed_up: None,
    }
}

/// Drop every modifier whose expiry is at or before `now_ms`
pub fn expire_modifiers(state: &mut ProgressionState, now_ms: f64) -> Vec<ModifierKind> {
    let modifiers = &mut state.modifiers;
    let mut expired = Vec::new();
    if modifiers.shield_expires_ms.is_some_and(|t| now_ms >= t) {
        modifiers.shield_expires_ms = None;
        modifiers.shield_charges = 0;
        expired.push(ModifierKind::Shield);
    }
    if modifiers.slow_expires_ms.is_some_and(|t| now_ms >= t) {
        modifiers.slow_expires_ms = None;
        expired.push(ModifierKind::SlowMotion);
    }
    if modifiers.boost_expires_ms.is_some_and(|t| now_ms >= t) {
        modifiers.boost_expires_ms = None;
        expired.push(ModifierKind::SpeedBoost);
    }
    expired
}

/// Accumulate road distance for one tick
pub fn record_distance(state: &mut ProgressionState, dt: f32, time_scale: f32) {
    state.stats.distance_m += (state.speed * dt * time_scale / PIXELS_PER_METER) as f64;
}

/// Keep the newest reaction samples only
pub fn record_reaction(state: &mut ProgressionState, reaction_ms: f64) {
    let samples = &mut state.stats.reaction_samples_ms;
    samples.push_back(reaction_ms);
    while samples.len() > REACTION_SAMPLES {
        samples.pop_front();
    }
}
