//! Collision detection between the player and falling entities
//!
//! Everything is an axis-aligned box. Overlap is strict: boxes that only
//! share an edge do not collide. Obstacle checks run against boxes shrunk by
//! a per-side inset so near misses read as misses on screen.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{Obstacle, Player, PowerUp};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_pos_size(pos: Vec2, size: Vec2) -> Self {
        Self {
            min: pos,
            max: pos + size,
        }
    }

    /// Shrink every side by `amount`. Never inverts: an inset larger than
    /// half an extent collapses that axis onto its centre line.
    pub fn inset(&self, amount: f32) -> Self {
        let half = (self.max - self.min) / 2.0;
        let shrink = Vec2::splat(amount).min(half);
        Self {
            min: self.min + shrink,
            max: self.max - shrink,
        }
    }

    /// Strict overlap test
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) / 2.0
    }
}

/// Result of the player touching one or more obstacles this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactOutcome {
    /// A shield charge ate every hit
    Absorbed,
    /// No shield, but a spare life covered every hit
    LifeLost,
    /// Run over
    Fatal,
}

#[derive(Debug, Clone)]
pub struct ObstacleContact {
    pub ids: BTreeSet<u32>,
    pub outcome: ContactOutcome,
}

/// Ids of obstacles whose inset hitbox overlaps the player's inset hitbox
pub fn player_vs_obstacles(player: &Player, obstacles: &[Obstacle], inset: f32) -> BTreeSet<u32> {
    let hitbox = player.bounds().inset(inset);
    obstacles
        .iter()
        .filter(|o| hitbox.overlaps(&o.bounds().inset(inset)))
        .map(|o| o.id)
        .collect()
}

/// Ids of uncollected power-ups touching the player's full bounds
pub fn player_vs_powerups(player: &Player, powerups: &[PowerUp]) -> BTreeSet<u32> {
    let bounds = player.bounds();
    powerups
        .iter()
        .filter(|p| !p.collected && bounds.overlaps(&p.bounds()))
        .map(|p| p.id)
        .collect()
}

/// Decide what a set of simultaneous hits means. One shield charge, or
/// failing that one spare life, covers all of them. Shields go first since
/// they expire anyway.
pub fn resolve_obstacle_contact(
    hits: BTreeSet<u32>,
    shielded: bool,
    spare_lives: u8,
) -> Option<ObstacleContact> {
    if hits.is_empty() {
        return None;
    }
    let outcome = if shielded {
        ContactOutcome::Absorbed
    } else if spare_lives > 0 {
        ContactOutcome::LifeLost
    } else {
        ContactOutcome::Fatal
    };
    Some(ObstacleContact { ids: hits, outcome })
}

/// Horizontal distance between the player's and an obstacle's centres
#[inline]
pub fn lateral_distance(player: &Player, obstacle: &Obstacle) -> f32 {
    (player.center_x() - obstacle.center_x()).abs()
}
