//! Live entity collections
//!
//! Owns obstacles, power-ups and particles. Motion is update-then-filter:
//! every entity moves, then everything past the bottom of the playfield is
//! dropped, all inside one `advance` call.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::{
    EntityIds, MAX_PARTICLES, Obstacle, Particle, ParticleKind, PowerUp,
};
use crate::consts::{OBSTACLE_EXIT_MARGIN, POWERUP_EXIT_MARGIN};

/// Per-lane view of how close the nearest entity is to the spawn line.
/// Each entry is the smallest top edge in that lane, `f32::INFINITY` if empty.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneOccupancy {
    pub obstacle_top: Vec<f32>,
    pub powerup_top: Vec<f32>,
}

impl LaneOccupancy {
    pub fn empty(lanes: usize) -> Self {
        Self {
            obstacle_top: vec![f32::INFINITY; lanes],
            powerup_top: vec![f32::INFINITY; lanes],
        }
    }

    pub fn lane_count(&self) -> usize {
        self.obstacle_top.len()
    }

    /// An obstacle in this lane still sits above `window`
    pub fn obstacle_reserved(&self, lane: usize, window: f32) -> bool {
        self.obstacle_top.get(lane).is_some_and(|&top| top < window)
    }

    /// A power-up in this lane still sits above `window`
    pub fn powerup_reserved(&self, lane: usize, window: f32) -> bool {
        self.powerup_top.get(lane).is_some_and(|&top| top < window)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    pub obstacles: Vec<Obstacle>,
    pub powerups: Vec<PowerUp>,
    pub particles: Vec<Particle>,
    pub ids: EntityIds,
    /// Bumped per burst so consecutive bursts scatter differently
    burst_seq: u32,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move everything along the fall axis, then prune what left the screen.
    /// `time_scale` is the slow-motion factor (1.0 when inactive). Particles
    /// are cosmetic and always run at real time.
    pub fn advance(&mut self, dt: f32, time_scale: f32, playfield_height: f32) {
        let step = dt * time_scale;

        for obstacle in &mut self.obstacles {
            obstacle.pos.y += obstacle.vel * step;
        }
        for powerup in &mut self.powerups {
            powerup.pos.y += powerup.vel * step;
        }

        let obstacle_limit = playfield_height + OBSTACLE_EXIT_MARGIN;
        let powerup_limit = playfield_height + POWERUP_EXIT_MARGIN;
        self.obstacles.retain(|o| o.pos.y <= obstacle_limit);
        self.powerups
            .retain(|p| !p.collected && p.pos.y <= powerup_limit);

        for particle in &mut self.particles {
            particle.pos += particle.vel * dt;
            particle.vel *= 0.98;
            particle.life -= dt;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        debug_assert!(
            !self.contains_id(obstacle.id),
            "duplicate entity id {}",
            obstacle.id
        );
        self.obstacles.push(obstacle);
    }

    pub fn add_powerup(&mut self, powerup: PowerUp) {
        debug_assert!(
            !self.contains_id(powerup.id),
            "duplicate entity id {}",
            powerup.id
        );
        self.powerups.push(powerup);
    }

    fn contains_id(&self, id: u32) -> bool {
        self.obstacles.iter().any(|o| o.id == id) || self.powerups.iter().any(|p| p.id == id)
    }

    pub fn remove_obstacles(&mut self, ids: &BTreeSet<u32>) {
        self.obstacles.retain(|o| !ids.contains(&o.id));
    }

    pub fn remove_powerups(&mut self, ids: &BTreeSet<u32>) {
        self.powerups.retain(|p| !ids.contains(&p.id));
    }

    /// Snapshot of lane usage for the spawner
    pub fn occupancy(&self, lanes: usize) -> LaneOccupancy {
        let mut occupancy = LaneOccupancy::empty(lanes);
        for obstacle in &self.obstacles {
            if let Some(top) = occupancy.obstacle_top.get_mut(obstacle.lane) {
                *top = top.min(obstacle.pos.y);
            }
        }
        for powerup in &self.powerups {
            if let Some(top) = occupancy.powerup_top.get_mut(powerup.lane) {
                *top = top.min(powerup.pos.y);
            }
        }
        occupancy
    }

    /// Scatter `count` particles around `origin`. Scatter comes from a hash
    /// of the burst counter so gameplay randomness is never consumed.
    pub fn burst(&mut self, origin: Vec2, kind: ParticleKind, count: u32) {
        self.burst_seq = self.burst_seq.wrapping_add(1);
        for j in 0..count {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            let hash = self
                .burst_seq
                .wrapping_mul(2654435761)
                .wrapping_add(j.wrapping_mul(7919));
            let hash = hash ^ (hash >> 15);
            let rand1 = (hash % 1000) as f32 / 1000.0 - 0.5;
            let rand2 = ((hash >> 10) % 1000) as f32 / 1000.0 - 0.5;
            let rand3 = ((hash >> 20) % 1000) as f32 / 1000.0;

            self.particles.push(Particle {
                pos: origin + Vec2::new(rand1, rand2) * 40.0,
                vel: Vec2::new(rand2, rand1) * 480.0,
                life: 1.0,
                size: 2.0 + rand3 * 4.0,
                kind,
            });
        }
    }
}
