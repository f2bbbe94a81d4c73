//! Obstacle and power-up spawning
//!
//! Decisions are a function of (active playtime, score, lane occupancy, RNG
//! draws). Cooldowns are timestamps on the active playtime clock.

use glam::Vec2;
use log::debug;
use serde::{Deserialize, Serialize};

use super::entities::LaneOccupancy;
use super::rng::RandomSource;
use super::state::{EntityIds, Obstacle, ObstacleCategory, PowerUp, PowerUpKind};
use crate::consts::{POWERUP_SIZE, POWERUP_SPAWN_Y};
use crate::settings::Settings;

/// Pick an index from a weight table with a uniform draw in `[0, 1)`.
///
/// Walks the cumulative weights and returns the first bucket the scaled draw
/// falls into. Non-positive weights are never picked unless every weight is
/// non-positive, in which case index 0 is returned.
pub fn weighted_pick(weights: &[f32], draw: f32) -> usize {
    let total: f32 = weights.iter().filter(|w| **w > 0.0).sum();
    if total <= 0.0 {
        return 0;
    }
    let mut remaining = draw.clamp(0.0, 1.0) * total;
    let mut last_positive = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        last_positive = i;
        if remaining < w {
            return i;
        }
        remaining -= w;
    }
    // Float rounding at the top of the range
    last_positive
}

/// Choose one of `count` items with a uniform draw
fn uniform_index(count: usize, draw: f32) -> usize {
    ((draw.clamp(0.0, 1.0) * count as f32) as usize).min(count.saturating_sub(1))
}

/// Inputs shared by both spawn decisions
#[derive(Debug, Clone, Copy)]
pub struct SpawnContext<'a> {
    /// Active playtime (ms)
    pub now_ms: f64,
    pub score: u64,
    /// Current road speed (px/s)
    pub speed: f32,
    pub occupied: &'a LaneOccupancy,
    pub settings: &'a Settings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Spawner {
    last_obstacle_ms: f64,
    last_powerup_ms: f64,
}

impl Spawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum gap between obstacle spawns at this score
    pub fn obstacle_interval_ms(settings: &Settings, score: u64) -> f64 {
        let shrink = settings.interval_score_factor * score as f64;
        (settings.base_interval_ms - shrink).max(settings.floor_interval_ms)
    }

    /// Lanes free of any obstacle inside the reservation window
    pub fn open_obstacle_lanes(occupied: &LaneOccupancy, window: f32) -> Vec<usize> {
        (0..occupied.lane_count())
            .filter(|&lane| !occupied.obstacle_reserved(lane, window))
            .collect()
    }

    /// Returns a new obstacle if one is due and a lane is open. A refused
    /// spawn leaves the cooldown untouched so the next tick tries again.
    pub fn maybe_spawn_obstacle<R: RandomSource>(
        &mut self,
        ctx: &SpawnContext<'_>,
        ids: &mut EntityIds,
        rng: &mut R,
    ) -> Option<Obstacle> {
        let settings = ctx.settings;
        let interval = Self::obstacle_interval_ms(settings, ctx.score);
        if ctx.now_ms - self.last_obstacle_ms < interval {
            return None;
        }

        let open = Self::open_obstacle_lanes(ctx.occupied, settings.reservation_window_px);
        if open.is_empty() {
            debug!("obstacle spawn skipped: all lanes reserved");
            return None;
        }
        if settings.keep_open_lane && open.len() == 1 {
            debug!("obstacle spawn skipped: would close the last open lane");
            return None;
        }

        let weights: Vec<f32> = ObstacleCategory::ALL
            .iter()
            .map(|c| c.spawn_weight())
            .collect();
        let category = ObstacleCategory::ALL[weighted_pick(&weights, rng.next_float())];
        let lane = open[uniform_index(open.len(), rng.next_float())];

        let jitter = if category.is_vehicle() {
            rng.next_float() * settings.speed_jitter
        } else {
            0.0
        };
        let vel = ctx.speed * category.speed_bias() + jitter;

        let size = category.size();
        let obstacle = Obstacle {
            id: ids.next_id(),
            category,
            lane,
            pos: Vec2::new(settings.lane_center(lane) - size.x / 2.0, -size.y),
            size,
            vel,
            passed: false,
            spawned_at_ms: ctx.now_ms,
        };
        self.last_obstacle_ms = ctx.now_ms;
        debug!(
            "spawned {:?} #{} in lane {} at {:.0} px/s ({:.0} ms)",
            category, obstacle.id, lane, vel, ctx.now_ms
        );
        Some(obstacle)
    }

    /// Returns a new power-up once the score threshold is met, the cooldown
    /// has elapsed and the spawn roll succeeds.
    pub fn maybe_spawn_powerup<R: RandomSource>(
        &mut self,
        ctx: &SpawnContext<'_>,
        ids: &mut EntityIds,
        rng: &mut R,
    ) -> Option<PowerUp> {
        let settings = ctx.settings;
        if ctx.score < settings.powerup_score_threshold {
            return None;
        }
        if ctx.now_ms - self.last_powerup_ms < settings.powerup_cooldown_ms {
            return None;
        }
        if rng.next_float() >= settings.powerup_spawn_chance {
            return None;
        }

        let open: Vec<usize> = (0..ctx.occupied.lane_count())
            .filter(|&lane| {
                !ctx.occupied
                    .powerup_reserved(lane, settings.powerup_reservation_px)
            })
            .collect();
        if open.is_empty() {
            return None;
        }

        let weights: Vec<f32> = PowerUpKind::ALL.iter().map(|k| k.spawn_weight()).collect();
        let kind = PowerUpKind::ALL[weighted_pick(&weights, rng.next_float())];
        let lane = open[uniform_index(open.len(), rng.next_float())];

        let powerup = PowerUp {
            id: ids.next_id(),
            kind,
            lane,
            pos: Vec2::new(
                settings.lane_center(lane) - POWERUP_SIZE / 2.0,
                POWERUP_SPAWN_Y,
            ),
            size: Vec2::splat(POWERUP_SIZE),
            vel: ctx.speed,
            collected: false,
        };
        self.last_powerup_ms = ctx.now_ms;
        debug!("spawned {:?} power-up #{} in lane {}", kind, powerup.id, lane);
        Some(powerup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::rng::{SequenceRng, seeded};

    fn ctx<'a>(
        now_ms: f64,
        score: u64,
        occupied: &'a LaneOccupancy,
        settings: &'a Settings,
    ) -> SpawnContext<'a> {
        SpawnContext {
            now_ms,
            score,
            speed: settings.start_speed,
            occupied,
            settings,
        }
    }

    #[test]
    fn test_weighted_pick_buckets() {
        let weights = [40.0, 15.0, 20.0, 15.0, 8.0, 2.0];
        assert_eq!(weighted_pick(&weights, 0.0), 0);
        assert_eq!(weighted_pick(&weights, 0.39), 0);
        assert_eq!(weighted_pick(&weights, 0.41), 1);
        assert_eq!(weighted_pick(&weights, 0.56), 2);
        assert_eq!(weighted_pick(&weights, 0.97), 4);
        assert_eq!(weighted_pick(&weights, 0.99), 5);
        assert_eq!(weighted_pick(&weights, 0.999_999_9), 5);
    }

    #[test]
    fn test_weighted_pick_skips_zero_weights() {
        assert_eq!(weighted_pick(&[0.0, 1.0, 0.0], 0.0), 1);
        assert_eq!(weighted_pick(&[0.0, 1.0, 0.0], 0.99), 1);
        assert_eq!(weighted_pick(&[0.0, 0.0], 0.5), 0);
        assert_eq!(weighted_pick(&[], 0.5), 0);
    }

    #[test]
    fn test_weighted_pick_distribution() {
        let weights = [3.0, 1.0];
        let mut rng = seeded(11);
        let mut counts = [0u32; 2];
        for _ in 0..4000 {
            counts[weighted_pick(&weights, rng.next_float())] += 1;
        }
        let ratio = counts[0] as f32 / counts[1] as f32;
        assert!((2.5..3.6).contains(&ratio), "ratio {ratio}");
    }

    #[test]
    fn test_interval_shrinks_to_floor() {
        let settings = Settings::default();
        assert_eq!(Spawner::obstacle_interval_ms(&settings, 0), 1500.0);
        assert_eq!(Spawner::obstacle_interval_ms(&settings, 100), 1250.0);
        assert_eq!(Spawner::obstacle_interval_ms(&settings, 280), 800.0);
        assert_eq!(Spawner::obstacle_interval_ms(&settings, 10_000), 800.0);
    }

    #[test]
    fn test_obstacle_waits_for_interval() {
        let settings = Settings::default();
        let occupied = LaneOccupancy::empty(settings.lane_count);
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        let mut rng = SequenceRng::new(vec![0.1, 0.5, 0.5]);

        assert!(spawner
            .maybe_spawn_obstacle(&ctx(1499.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .is_none());
        assert_eq!(rng.draws(), 0);

        let obstacle = spawner
            .maybe_spawn_obstacle(&ctx(1500.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .expect("spawn due");
        assert_eq!(obstacle.category, ObstacleCategory::Car);
        assert_eq!(obstacle.lane, 2);
        assert_eq!(obstacle.pos.y, -obstacle.size.y);
        assert_eq!(obstacle.spawned_at_ms, 1500.0);
        assert_eq!(obstacle.vel, settings.start_speed + 0.5 * settings.speed_jitter);

        // Cooldown restarts from the spawn
        assert!(spawner
            .maybe_spawn_obstacle(&ctx(2000.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .is_none());
    }

    #[test]
    fn test_hazards_have_no_jitter() {
        let settings = Settings::default();
        let occupied = LaneOccupancy::empty(settings.lane_count);
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        // 0.995 lands in the OilSpill bucket
        let mut rng = SequenceRng::new(vec![0.995, 0.0]);
        let obstacle = spawner
            .maybe_spawn_obstacle(&ctx(1500.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .unwrap();
        assert_eq!(obstacle.category, ObstacleCategory::OilSpill);
        assert_eq!(obstacle.vel, settings.start_speed);
        assert_eq!(rng.draws(), 2);
    }

    #[test]
    fn test_reserved_lanes_are_skipped() {
        let settings = Settings::default();
        let mut occupied = LaneOccupancy::empty(settings.lane_count);
        occupied.obstacle_top[0] = -100.0;
        occupied.obstacle_top[2] = 100.0;
        // Far down the road: no longer reserved
        occupied.obstacle_top[3] = 400.0;

        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        for draw in [0.0, 0.3, 0.6, 0.99] {
            spawner.last_obstacle_ms = 0.0;
            let mut rng = SequenceRng::new(vec![0.1, draw, 0.0]);
            let obstacle = spawner
                .maybe_spawn_obstacle(&ctx(1500.0, 0, &occupied, &settings), &mut ids, &mut rng)
                .unwrap();
            assert!(obstacle.lane == 1 || obstacle.lane == 3);
        }
    }

    #[test]
    fn test_all_lanes_reserved_is_soft_skip() {
        let settings = Settings {
            keep_open_lane: false,
            ..Settings::default()
        };
        let mut occupied = LaneOccupancy::empty(settings.lane_count);
        occupied.obstacle_top.iter_mut().for_each(|t| *t = 0.0);
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        let mut rng = seeded(1);
        assert!(spawner
            .maybe_spawn_obstacle(&ctx(5000.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .is_none());

        // Lanes clear: the overdue spawn happens right away
        let occupied = LaneOccupancy::empty(settings.lane_count);
        assert!(spawner
            .maybe_spawn_obstacle(&ctx(5016.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .is_some());
    }

    #[test]
    fn test_keep_open_lane_refuses_last_lane() {
        let settings = Settings::default();
        let mut occupied = LaneOccupancy::empty(settings.lane_count);
        occupied.obstacle_top[0] = 0.0;
        occupied.obstacle_top[1] = 0.0;
        occupied.obstacle_top[2] = 0.0;
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        let mut rng = seeded(1);
        assert!(spawner
            .maybe_spawn_obstacle(&ctx(1500.0, 0, &occupied, &settings), &mut ids, &mut rng)
            .is_none());
    }

    #[test]
    fn test_powerup_needs_score_threshold() {
        let settings = Settings::default();
        let occupied = LaneOccupancy::empty(settings.lane_count);
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        let mut rng = SequenceRng::new(vec![0.0]);
        assert!(spawner
            .maybe_spawn_powerup(&ctx(9000.0, 99, &occupied, &settings), &mut ids, &mut rng)
            .is_none());
        assert!(spawner
            .maybe_spawn_powerup(&ctx(9000.0, 100, &occupied, &settings), &mut ids, &mut rng)
            .is_some());
    }

    #[test]
    fn test_powerup_cooldown_and_roll() {
        let settings = Settings::default();
        let occupied = LaneOccupancy::empty(settings.lane_count);
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();

        let mut rng = SequenceRng::new(vec![0.0]);
        assert!(spawner
            .maybe_spawn_powerup(&ctx(7999.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .is_none());

        // Failed roll: no spawn, cooldown not restarted
        let mut rng = SequenceRng::new(vec![0.9]);
        assert!(spawner
            .maybe_spawn_powerup(&ctx(8000.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .is_none());

        let mut rng = SequenceRng::new(vec![0.1, 0.0, 0.0]);
        let powerup = spawner
            .maybe_spawn_powerup(&ctx(8016.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .unwrap();
        assert_eq!(powerup.kind, PowerUpKind::Shield);
        assert_eq!(powerup.lane, 0);
        assert_eq!(powerup.pos.y, POWERUP_SPAWN_Y);

        let mut rng = SequenceRng::new(vec![0.0]);
        assert!(spawner
            .maybe_spawn_powerup(&ctx(15_000.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .is_none());
    }

    #[test]
    fn test_powerup_avoids_nearby_powerups() {
        let settings = Settings::default();
        let mut occupied = LaneOccupancy::empty(settings.lane_count);
        occupied.powerup_top[0] = -50.0;
        occupied.powerup_top[1] = 100.0;
        occupied.powerup_top[2] = 200.0;
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        let mut rng = SequenceRng::new(vec![0.0, 0.5, 0.0]);
        let powerup = spawner
            .maybe_spawn_powerup(&ctx(8000.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .unwrap();
        assert_eq!(powerup.lane, 3);
    }

    #[test]
    fn test_ids_unique_across_kinds() {
        let settings = Settings::default();
        let occupied = LaneOccupancy::empty(settings.lane_count);
        let mut spawner = Spawner::new();
        let mut ids = EntityIds::default();
        let mut rng = SequenceRng::new(vec![0.0]);
        let o = spawner
            .maybe_spawn_obstacle(&ctx(9000.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .unwrap();
        let p = spawner
            .maybe_spawn_powerup(&ctx(9000.0, 500, &occupied, &settings), &mut ids, &mut rng)
            .unwrap();
        assert_ne!(o.id, p.id);
    }
}
