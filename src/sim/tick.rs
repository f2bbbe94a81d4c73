//! Per-frame simulation tick
//!
//! [`Simulation::tick`] runs once per animation frame. Inside a tick the
//! order never changes:
//!
//! 1. queued commands are applied (tick boundary)
//! 2. the active playtime clock advances and due modifiers expire
//! 3. player easing and entity motion
//! 4. obstacle collisions (shield, spare life, or game over)
//! 5. progression: passes, pickups, distance
//! 6. spawns, which only become visible and collidable next tick

use std::collections::VecDeque;

use glam::Vec2;
use log::{debug, info};
use rand_pcg::Pcg32;
use serde::Serialize;

use super::clock::ActiveClock;
use super::collision::{
    ContactOutcome, lateral_distance, player_vs_obstacles, player_vs_powerups,
    resolve_obstacle_contact,
};
use super::entities::EntityStore;
use super::progression::{
    ActiveModifiers, ProgressionState, SessionSummary, expire_modifiers, on_collision_fatal,
    on_life_lost, on_obstacle_passed, on_powerup_collected, on_shield_absorbed,
    record_distance, record_reaction,
};
use super::rng::{self, RandomSource};
use super::spawner::{SpawnContext, Spawner};
use super::state::{
    GameEvent, GamePhase, Obstacle, Particle, ParticleKind, Player, PowerUp,
};
use crate::consts::MAX_TICK_DT;
use crate::persistence::{SessionRecord, StatsSink};
use crate::settings::{ConfigError, Settings};

/// Discrete player/host intents, applied at the next tick boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    MoveLeft,
    MoveRight,
    TogglePause,
    Reset,
}

/// Player state as the renderer needs it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlayerView {
    pub lane: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub shielded: bool,
    pub slowed: bool,
    pub boosted: bool,
}

/// Read-only view of the session after the last tick
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub phase: GamePhase,
    pub tick: u64,
    pub active_ms: f64,
    pub player: PlayerView,
    pub obstacles: &'a [Obstacle],
    pub powerups: &'a [PowerUp],
    pub particles: &'a [Particle],
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub speed: f32,
    pub extra_lives: u8,
    pub modifiers: &'a ActiveModifiers,
    /// Everything that happened during the last tick
    pub events: &'a [GameEvent],
    /// Present once the session has terminated
    pub summary: Option<&'a SessionSummary>,
}

/// One play session and everything it owns
pub struct Simulation<R = Pcg32> {
    settings: Settings,
    phase: GamePhase,
    clock: ActiveClock,
    ticks: u64,
    player: Player,
    store: EntityStore,
    spawner: Spawner,
    progression: ProgressionState,
    rng: R,
    commands: VecDeque<Command>,
    events: Vec<GameEvent>,
    summary: Option<SessionSummary>,
    sink: Option<Box<dyn StatsSink>>,
}

impl Simulation<Pcg32> {
    /// Validate `settings` and create an idle session with a seeded RNG
    pub fn new(settings: Settings, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(settings, rng::seeded(seed))
    }
}

impl<R: RandomSource> Simulation<R> {
    /// Validate `settings` and create an idle session drawing from `rng`
    pub fn with_rng(settings: Settings, rng: R) -> Result<Self, ConfigError> {
        settings.validate()?;
        let player = Player::new(&settings);
        let progression = ProgressionState::new(&settings);
        Ok(Self {
            settings,
            phase: GamePhase::Idle,
            clock: ActiveClock::new(),
            ticks: 0,
            player,
            store: EntityStore::new(),
            spawner: Spawner::new(),
            progression,
            rng,
            commands: VecDeque::new(),
            events: Vec::new(),
            summary: None,
            sink: None,
        })
    }

    /// Where finished sessions are reported
    pub fn set_stats_sink(&mut self, sink: Box<dyn StatsSink>) {
        self.sink = Some(sink);
    }

    // === Input boundary ===

    pub fn push_command(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    pub fn start(&mut self) {
        self.push_command(Command::Start);
    }

    pub fn move_left(&mut self) {
        self.push_command(Command::MoveLeft);
    }

    pub fn move_right(&mut self) {
        self.push_command(Command::MoveRight);
    }

    pub fn toggle_pause(&mut self) {
        self.push_command(Command::TogglePause);
    }

    pub fn reset(&mut self) {
        self.push_command(Command::Reset);
    }

    // === Queries ===

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn progression(&self) -> &ProgressionState {
        &self.progression
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.store.obstacles
    }

    pub fn powerups(&self) -> &[PowerUp] {
        &self.store.powerups
    }

    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }

    /// Active playtime (ms)
    pub fn active_ms(&self) -> f64 {
        self.clock.now_ms()
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        let modifiers = &self.progression.modifiers;
        Snapshot {
            phase: self.phase,
            tick: self.ticks,
            active_ms: self.clock.now_ms(),
            player: PlayerView {
                lane: self.player.lane,
                x: self.player.x,
                y: self.player.y,
                width: self.player.size.x,
                height: self.player.size.y,
                shielded: modifiers.shielded(),
                slowed: modifiers.slowed(),
                boosted: modifiers.boosted(),
            },
            obstacles: &self.store.obstacles,
            powerups: &self.store.powerups,
            particles: &self.store.particles,
            score: self.progression.score,
            combo: self.progression.combo,
            max_combo: self.progression.max_combo,
            speed: self.progression.speed,
            extra_lives: self.progression.extra_lives,
            modifiers,
            events: &self.events,
            summary: self.summary.as_ref(),
        }
    }

    // === Tick ===

    /// Advance the session by `dt` seconds of wall time
    pub fn tick(&mut self, dt: f32) {
        self.events.clear();
        while let Some(command) = self.commands.pop_front() {
            self.apply_command(command);
        }

        if self.phase != GamePhase::Running {
            return;
        }

        let dt = if dt.is_finite() {
            dt.clamp(0.0, MAX_TICK_DT)
        } else {
            0.0
        };
        self.ticks += 1;
        self.clock.advance(dt);
        let now = self.clock.now_ms();

        // Modifier state is fixed for the rest of the tick from here on
        for modifier in expire_modifiers(&mut self.progression, now) {
            debug!("{:?} expired at {:.0} ms", modifier, now);
            self.events.push(GameEvent::ModifierExpired { modifier });
        }
        let time_scale = self.progression.modifiers.time_scale(&self.settings);

        self.player.ease_toward_lane(
            &self.settings,
            dt,
            self.settings.lane_change_rate * time_scale,
        );
        self.store
            .advance(dt, time_scale, self.settings.playfield_height);

        if !self.resolve_obstacle_hits(now) {
            return;
        }
        self.score_passes();
        self.collect_powerups(now);
        record_distance(&mut self.progression, dt, time_scale);

        self.spawn(now);
    }

    fn apply_command(&mut self, command: Command) {
        match (command, self.phase) {
            (Command::Start, GamePhase::Idle) => {
                info!("Session started");
                self.phase = GamePhase::Running;
                self.events.push(GameEvent::SessionStarted);
            }
            (Command::TogglePause, GamePhase::Running) => {
                info!("Paused at {:.0} ms", self.clock.now_ms());
                self.phase = GamePhase::Paused;
                self.events.push(GameEvent::Paused);
            }
            (Command::TogglePause, GamePhase::Paused) => {
                info!("Resumed at {:.0} ms", self.clock.now_ms());
                self.phase = GamePhase::Running;
                self.events.push(GameEvent::Resumed);
            }
            (Command::MoveLeft, GamePhase::Running) => self.change_lane(-1),
            (Command::MoveRight, GamePhase::Running) => self.change_lane(1),
            (Command::Reset, _) => self.reset_session(),
            (command, phase) => debug!("Ignoring {:?} while {:?}", command, phase),
        }
    }

    fn change_lane(&mut self, delta: i32) {
        let from = self.player.lane;
        if !self.player.shift_lane(delta, self.settings.lane_count) {
            return;
        }
        if let Some(reaction_ms) = self.reaction_time(from) {
            record_reaction(&mut self.progression, reaction_ms);
        }
        self.events.push(GameEvent::LaneChanged {
            lane: self.player.lane,
        });
    }

    /// Time since the closest obstacle bearing down on `lane` appeared
    fn reaction_time(&self, lane: usize) -> Option<f64> {
        self.store
            .obstacles
            .iter()
            .filter(|o| o.lane == lane && !o.passed && o.pos.y < self.player.y)
            .max_by(|a, b| a.pos.y.total_cmp(&b.pos.y))
            .map(|o| self.clock.now_ms() - o.spawned_at_ms)
    }

    fn reset_session(&mut self) {
        info!("Session reset");
        self.phase = GamePhase::Idle;
        self.clock = ActiveClock::new();
        self.ticks = 0;
        self.player = Player::new(&self.settings);
        self.store = EntityStore::new();
        self.spawner = Spawner::new();
        self.progression = ProgressionState::new(&self.settings);
        self.summary = None;
    }

    /// Returns false when the session just ended
    fn resolve_obstacle_hits(&mut self, now: f64) -> bool {
        let hits = player_vs_obstacles(
            &self.player,
            &self.store.obstacles,
            self.settings.hitbox_inset,
        );
        let Some(contact) = resolve_obstacle_contact(
            hits,
            self.progression.modifiers.shielded(),
            self.progression.extra_lives,
        ) else {
            return true;
        };

        let origin = Vec2::new(self.player.center_x(), self.player.y);
        self.store.remove_obstacles(&contact.ids);
        match contact.outcome {
            ContactOutcome::Absorbed => {
                let charges_left = on_shield_absorbed(&mut self.progression);
                debug!(
                    "Shield absorbed {} obstacle(s), {} charge(s) left",
                    contact.ids.len(),
                    charges_left
                );
                self.store.burst(origin, ParticleKind::ShieldHit, 8);
                self.events.push(GameEvent::ShieldAbsorbed {
                    obstacle_ids: contact.ids.into_iter().collect(),
                    charges_left,
                });
                true
            }
            ContactOutcome::LifeLost => {
                let lives_left = on_life_lost(&mut self.progression);
                info!("Life lost at {:.0} ms, {} spare left", now, lives_left);
                self.store.burst(origin, ParticleKind::Crash, 12);
                self.events.push(GameEvent::LifeLost {
                    obstacle_ids: contact.ids.into_iter().collect(),
                    lives_left,
                });
                true
            }
            ContactOutcome::Fatal => {
                self.store.burst(origin, ParticleKind::Crash, 12);
                self.terminate(now);
                false
            }
        }
    }

    fn score_passes(&mut self) {
        let pass_line = self.settings.pass_line();
        let mut bursts = Vec::new();

        for obstacle in self
            .store
            .obstacles
            .iter_mut()
            .filter(|o| !o.passed && o.pos.y > pass_line)
        {
            obstacle.passed = true;
            let lateral = lateral_distance(&self.player, obstacle);
            let outcome =
                on_obstacle_passed(&mut self.progression, obstacle, lateral, &self.settings);
            self.events.push(GameEvent::ObstaclePassed {
                id: obstacle.id,
                points: outcome.points,
                perfect: outcome.perfect,
            });
            if let Some(speed) = outcome.speed_up {
                debug!("Speed up: {:.0} px/s", speed);
                self.events.push(GameEvent::SpeedIncreased { speed });
            }
            bursts.push(Vec2::new(obstacle.center_x(), obstacle.pos.y));
        }

        for origin in bursts {
            self.store.burst(origin, ParticleKind::Pass, 3);
        }
    }

    fn collect_powerups(&mut self, now: f64) {
        let collected = player_vs_powerups(&self.player, &self.store.powerups);
        if collected.is_empty() {
            return;
        }

        let mut bursts = Vec::new();
        for powerup in self
            .store
            .powerups
            .iter_mut()
            .filter(|p| collected.contains(&p.id))
        {
            powerup.collected = true;
            let outcome =
                on_powerup_collected(&mut self.progression, powerup.kind, now, &self.settings);
            debug!("Collected {:?} power-up #{}", powerup.kind, powerup.id);
            self.events.push(GameEvent::PowerUpCollected {
                id: powerup.id,
                kind: powerup.kind,
                points: outcome.points,
            });
            if let Some(speed) = outcome.speed_up {
                self.events.push(GameEvent::SpeedIncreased { speed });
            }
            bursts.push((powerup.pos + powerup.size / 2.0, powerup.kind));
        }
        self.store.remove_powerups(&collected);

        for (origin, kind) in bursts {
            self.store.burst(origin, ParticleKind::Pickup(kind), 6);
        }
    }

    fn spawn(&mut self, now: f64) {
        let occupied = self.store.occupancy(self.settings.lane_count);
        let ctx = SpawnContext {
            now_ms: now,
            score: self.progression.score,
            speed: self.progression.speed,
            occupied: &occupied,
            settings: &self.settings,
        };

        if let Some(obstacle) =
            self.spawner
                .maybe_spawn_obstacle(&ctx, &mut self.store.ids, &mut self.rng)
        {
            self.events.push(GameEvent::ObstacleSpawned {
                id: obstacle.id,
                lane: obstacle.lane,
                category: obstacle.category,
            });
            self.store.add_obstacle(obstacle);
        }

        if let Some(powerup) =
            self.spawner
                .maybe_spawn_powerup(&ctx, &mut self.store.ids, &mut self.rng)
        {
            self.events.push(GameEvent::PowerUpSpawned {
                id: powerup.id,
                lane: powerup.lane,
                kind: powerup.kind,
            });
            self.store.add_powerup(powerup);
        }
    }

    fn terminate(&mut self, now: f64) {
        let summary = on_collision_fatal(&mut self.progression, now);
        info!(
            "Session over: score {}, max combo {}, {:.0} m in {:.1} s",
            summary.score,
            summary.max_combo,
            summary.distance_m,
            summary.duration_ms / 1000.0
        );
        self.phase = GamePhase::Terminated;
        self.events.push(GameEvent::SessionEnded {
            score: summary.score,
        });
        if let Some(sink) = self.sink.as_mut() {
            sink.record_session(&SessionRecord::from(&summary));
        }
        self.summary = Some(summary);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use crate::sim::rng::SequenceRng;
    use crate::sim::state::{ObstacleCategory, PowerUpKind};

    const DT: f32 = 0.01;

    fn running(settings: Settings) -> Simulation<SequenceRng> {
        let mut sim = Simulation::with_rng(settings, SequenceRng::new(vec![0.1, 0.5, 0.5]))
            .expect("valid settings");
        sim.start();
        sim.tick(0.0);
        assert_eq!(sim.phase(), GamePhase::Running);
        sim
    }

    /// Drop a stationary car into `lane` with its top edge at `y`
    fn place_car<R>(sim: &mut Simulation<R>, lane: usize, y: f32) -> u32 {
        let size = ObstacleCategory::Car.size();
        let id = sim.store.ids.next_id();
        sim.store.add_obstacle(Obstacle {
            id,
            category: ObstacleCategory::Car,
            lane,
            pos: Vec2::new(sim.settings.lane_center(lane) - size.x / 2.0, y),
            size,
            vel: 0.0,
            passed: false,
            spawned_at_ms: sim.clock.now_ms(),
        });
        id
    }

    fn place_powerup<R>(sim: &mut Simulation<R>, kind: PowerUpKind) -> u32 {
        let id = sim.store.ids.next_id();
        let player = sim.player.bounds();
        sim.store.add_powerup(PowerUp {
            id,
            kind,
            lane: sim.player.lane,
            pos: Vec2::new(player.min.x, player.min.y),
            size: Vec2::splat(40.0),
            vel: 0.0,
            collected: false,
        });
        id
    }

    fn spawned_this_tick<R: RandomSource>(sim: &Simulation<R>) -> bool {
        sim.events()
            .iter()
            .any(|e| matches!(e, GameEvent::ObstacleSpawned { .. }))
    }

    /// Tick until the first obstacle spawns; returns the playtime it spawned at
    fn tick_until_spawn<R: RandomSource>(sim: &mut Simulation<R>) -> f64 {
        for _ in 0..10_000 {
            sim.tick(DT);
            if spawned_this_tick(sim) {
                return sim.active_ms();
            }
        }
        panic!("no obstacle spawned");
    }

    #[test]
    fn test_idle_until_started() {
        let mut sim = Simulation::new(Settings::default(), 1).unwrap();
        sim.move_left();
        sim.tick(1.0 / 60.0);
        assert_eq!(sim.phase(), GamePhase::Idle);
        assert_eq!(sim.active_ms(), 0.0);
        assert_eq!(sim.player().lane, 1);

        sim.start();
        sim.tick(1.0 / 60.0);
        assert_eq!(sim.phase(), GamePhase::Running);
        assert!(sim.active_ms() > 0.0);
    }

    #[test]
    fn test_rejects_bad_config() {
        let settings = Settings {
            base_interval_ms: -1.0,
            ..Settings::default()
        };
        assert!(Simulation::new(settings, 1).is_err());

        // A Barrier centred in the next lane would overlap the player
        let crowded = Settings {
            lane_count: 6,
            playfield_width: 360.0,
            hitbox_inset: 0.0,
            ..Settings::default()
        };
        assert!(matches!(
            Simulation::new(crowded, 1),
            Err(ConfigError::ObstacleTooWide { .. })
        ));

        let unscoreable = Settings {
            pass_margin_px: 200.0,
            ..Settings::default()
        };
        assert!(matches!(
            Simulation::new(unscoreable, 1),
            Err(ConfigError::PassLineOffscreen { .. })
        ));
    }

    #[test]
    fn test_first_obstacle_within_interval_bounds() {
        let mut sim = running(Settings::default());
        let at = tick_until_spawn(&mut sim);
        assert!((800.0..=1500.0).contains(&at), "spawned at {at}");
        assert_eq!(sim.obstacles().len(), 1);
        // Spawned above the screen; cannot be touching anything yet
        assert!(sim.obstacles()[0].pos.y < 0.0);
    }

    #[test]
    fn test_pause_does_not_shift_spawn_schedule() {
        let mut reference = running(Settings::default());
        let expected = tick_until_spawn(&mut reference);

        let mut sim = running(Settings::default());
        for _ in 0..50 {
            sim.tick(DT);
        }
        sim.toggle_pause();
        // Ten seconds of wall time while paused
        for _ in 0..100 {
            sim.tick(0.1);
            assert_eq!(sim.phase(), GamePhase::Paused);
            assert!(!spawned_this_tick(&sim));
        }
        assert_eq!(sim.active_ms(), 500.0);

        sim.toggle_pause();
        sim.tick(DT);
        assert_eq!(sim.phase(), GamePhase::Running);
        assert!(!spawned_this_tick(&sim), "no catch-up spawn after resume");
        assert_eq!(tick_until_spawn(&mut sim), expected);
    }

    #[test]
    fn test_commands_wait_for_tick_boundary() {
        let mut sim = running(Settings::default());
        sim.move_left();
        assert_eq!(sim.player().lane, 1);
        sim.tick(DT);
        assert_eq!(sim.player().lane, 0);
        assert!(sim.events().contains(&GameEvent::LaneChanged { lane: 0 }));
    }

    #[test]
    fn test_shield_absorbs_simultaneous_hits() {
        let mut sim = running(Settings::default());
        on_powerup_collected(&mut sim.progression, PowerUpKind::Shield, 0.0, &sim.settings);
        let lane = sim.player.lane;
        let y = sim.player.y;
        let a = place_car(&mut sim, lane, y - 50.0);
        let b = place_car(&mut sim, lane, y + 20.0);

        sim.tick(0.0);

        assert_eq!(sim.phase(), GamePhase::Running);
        assert!(sim.obstacles().is_empty());
        assert!(!sim.progression().modifiers.shielded());
        assert_eq!(sim.progression().stats.shields_used, 1);
        assert!(sim.events().contains(&GameEvent::ShieldAbsorbed {
            obstacle_ids: vec![a, b],
            charges_left: 0,
        }));

        // The next hit is fatal
        place_car(&mut sim, lane, y);
        sim.tick(0.0);
        assert_eq!(sim.phase(), GamePhase::Terminated);
    }

    #[test]
    fn test_spare_life_absorbs_hit_then_runs_out() {
        let settings = Settings {
            starting_extra_lives: 1,
            ..Settings::default()
        };
        let mut sim = running(settings);
        let below = sim.player.y + sim.player.size.y + 30.0;
        place_car(&mut sim, 3, below);
        sim.tick(0.0);
        assert_eq!(sim.progression().combo, 1);

        let lane = sim.player.lane;
        let y = sim.player.y;
        let a = place_car(&mut sim, lane, y - 50.0);
        let b = place_car(&mut sim, lane, y + 20.0);
        sim.tick(0.0);

        assert_eq!(sim.phase(), GamePhase::Running);
        assert!(sim.events().contains(&GameEvent::LifeLost {
            obstacle_ids: vec![a, b],
            lives_left: 0,
        }));
        assert!(sim.obstacles().iter().all(|o| o.id != a && o.id != b));
        assert_eq!(sim.progression().combo, 0);
        assert_eq!(sim.progression().max_combo, 1);
        assert_eq!(sim.snapshot().extra_lives, 0);

        // No lives left: the next hit ends the run
        place_car(&mut sim, lane, y);
        sim.tick(0.0);
        assert_eq!(sim.phase(), GamePhase::Terminated);
        assert_eq!(sim.summary().map(|s| s.lives_used), Some(1));
    }

    #[test]
    fn test_extra_life_pickup_saves_next_hit() {
        // Quiet road: nothing spawns
        let settings = Settings {
            base_interval_ms: 1e9,
            floor_interval_ms: 1e9,
            ..Settings::default()
        };
        let mut sim = running(settings);
        place_powerup(&mut sim, PowerUpKind::ExtraLife);
        sim.tick(0.0);
        assert_eq!(sim.progression().extra_lives, 1);

        // Outlives every timed modifier
        for _ in 0..100 {
            sim.tick(0.1);
        }
        assert!(sim.obstacles().is_empty());
        assert_eq!(sim.progression().extra_lives, 1);

        let lane = sim.player.lane;
        let y = sim.player.y;
        place_car(&mut sim, lane, y);
        sim.tick(0.0);
        assert_eq!(sim.phase(), GamePhase::Running);
        assert_eq!(sim.progression().extra_lives, 0);
    }

    #[test]
    fn test_shield_used_before_spare_life() {
        let settings = Settings {
            starting_extra_lives: 1,
            ..Settings::default()
        };
        let mut sim = running(settings);
        on_powerup_collected(&mut sim.progression, PowerUpKind::Shield, 0.0, &sim.settings);
        let lane = sim.player.lane;
        let y = sim.player.y;
        place_car(&mut sim, lane, y);
        sim.tick(0.0);
        assert!(!sim.progression().modifiers.shielded());
        assert_eq!(sim.progression().extra_lives, 1);
    }

    #[test]
    fn test_fastest_obstacle_is_scored_before_pruning() {
        let mut sim = running(Settings::default());
        let id = place_car(&mut sim, 3, 0.0);
        let fastest = sim.settings.max_fall_speed();
        sim.store.obstacles.iter_mut().for_each(|o| o.vel = fastest);

        let mut scored = false;
        for _ in 0..12 {
            sim.tick(MAX_TICK_DT);
            scored |= sim
                .events()
                .iter()
                .any(|e| matches!(e, GameEvent::ObstaclePassed { id: passed, .. } if *passed == id));
        }
        assert!(scored);
        assert_eq!(sim.progression().stats.obstacles_avoided, 1);
        assert!(sim.obstacles().iter().all(|o| o.id != id));
    }

    #[test]
    fn test_fatal_collision_ends_session_once() {
        let records = Rc::new(RefCell::new(Vec::<SessionRecord>::new()));
        let mut sim = running(Settings::default());
        sim.set_stats_sink(Box::new(records.clone()));

        let lane = sim.player.lane;
        let below = sim.player.y + sim.player.size.y + 30.0;
        place_car(&mut sim, 3, below);
        place_car(&mut sim, 3, below + 10.0);
        sim.tick(0.0);
        assert_eq!(sim.progression().combo, 2);
        let score_before = sim.progression().score;
        assert!(score_before > 0);

        let y = sim.player.y;
        place_car(&mut sim, lane, y);
        sim.tick(DT);

        assert_eq!(sim.phase(), GamePhase::Terminated);
        assert_eq!(sim.progression().combo, 0);
        let summary = sim.summary().expect("summary").clone();
        assert_eq!(summary.score, score_before);
        assert_eq!(summary.max_combo, 2);
        assert!(summary.distance_m.is_finite());
        assert!(summary.average_reaction_ms.is_finite());
        assert_eq!(
            sim.events()
                .iter()
                .filter(|e| matches!(e, GameEvent::SessionEnded { .. }))
                .count(),
            1
        );

        // Terminated is absorbing
        let ms = sim.active_ms();
        sim.move_left();
        sim.toggle_pause();
        sim.start();
        for _ in 0..10 {
            sim.tick(DT);
            assert!(sim.events().is_empty());
        }
        assert_eq!(sim.phase(), GamePhase::Terminated);
        assert_eq!(sim.active_ms(), ms);

        let records = records.borrow();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].score, score_before);
        assert_eq!(records[0].obstacles_avoided, 2);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut sim = running(Settings::default());
        let y = sim.player.y;
        let lane = sim.player.lane;
        place_car(&mut sim, lane, y);
        sim.tick(DT);
        assert_eq!(sim.phase(), GamePhase::Terminated);

        sim.reset();
        sim.tick(DT);
        assert_eq!(sim.phase(), GamePhase::Idle);
        assert!(sim.summary().is_none());
        assert!(sim.obstacles().is_empty());
        assert_eq!(sim.progression().score, 0);
        assert_eq!(sim.active_ms(), 0.0);

        sim.start();
        sim.tick(DT);
        assert_eq!(sim.phase(), GamePhase::Running);
    }

    #[test]
    fn test_perfect_dodge_only_when_close() {
        let mut sim = running(Settings::default());
        let below = sim.player.y + sim.player.size.y + 30.0;
        let near = place_car(&mut sim, 2, below);
        let far = place_car(&mut sim, 3, below);
        sim.tick(0.0);

        assert!(sim.events().contains(&GameEvent::ObstaclePassed {
            id: near,
            points: 20,
            perfect: true,
        }));
        assert!(sim.events().contains(&GameEvent::ObstaclePassed {
            id: far,
            points: 10,
            perfect: false,
        }));
        assert_eq!(sim.progression().stats.perfect_dodges, 1);

        // Already passed obstacles never score twice
        sim.tick(0.0);
        assert_eq!(sim.progression().score, 30);
    }

    #[test]
    fn test_slow_motion_halves_motion_then_expires() {
        let mut sim = running(Settings::default());
        place_powerup(&mut sim, PowerUpKind::SlowMotion);
        sim.tick(0.0);
        assert!(sim.progression().modifiers.slowed());
        assert!(sim.powerups().is_empty());
        assert_eq!(sim.progression().stats.powerups_collected, 1);

        let id = place_car(&mut sim, 3, 0.0);
        sim.store.obstacles.iter_mut().for_each(|o| o.vel = 100.0);
        sim.tick(0.1);
        let y = sim.obstacles().iter().find(|o| o.id == id).unwrap().pos.y;
        assert!((y - 5.0).abs() < 1e-4, "moved to {y}");

        let mut expired_at = None;
        for _ in 0..400 {
            sim.tick(DT);
            if sim.events().contains(&GameEvent::ModifierExpired {
                modifier: crate::sim::ModifierKind::SlowMotion,
            }) {
                expired_at = Some(sim.active_ms());
                break;
            }
        }
        assert_eq!(expired_at, Some(3000.0));
        assert!(!sim.progression().modifiers.slowed());
    }

    #[test]
    fn test_bonus_points_pickup() {
        let mut sim = running(Settings::default());
        place_powerup(&mut sim, PowerUpKind::BonusPoints);
        sim.tick(0.0);
        assert_eq!(sim.progression().score, sim.settings().bonus_points);
    }

    #[test]
    fn test_lane_change_records_reaction_time() {
        let mut sim = running(Settings::default());
        let lane = sim.player.lane;
        place_car(&mut sim, lane, 100.0);
        for _ in 0..50 {
            sim.tick(DT);
        }
        sim.move_left();
        sim.tick(DT);
        let samples = &sim.progression().stats.reaction_samples_ms;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0], 500.0);
    }

    #[test]
    fn test_seeded_sessions_are_identical() {
        let play = |seed: u64| {
            let mut sim = Simulation::new(Settings::default(), seed).unwrap();
            sim.start();
            let mut frames = Vec::new();
            for i in 0..1500u32 {
                if i % 97 == 0 {
                    sim.move_left();
                }
                if i % 151 == 0 {
                    sim.move_right();
                }
                sim.tick(1.0 / 60.0);
                frames.push(serde_json::to_string(&sim.snapshot()).unwrap());
            }
            frames
        };
        assert_eq!(play(99), play(99));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Tick(f32),
        Left,
        Right,
        Pause,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            12 => (0.0f32..0.05).prop_map(Op::Tick),
            2 => Just(Op::Left),
            2 => Just(Op::Right),
            1 => Just(Op::Pause),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_progression_invariants(
            seed in any::<u64>(),
            ops in prop::collection::vec(op_strategy(), 1..600),
        ) {
            let settings = Settings::default();
            let mut sim = Simulation::new(settings.clone(), seed).unwrap();
            sim.start();
            sim.tick(0.0);

            let mut last_score = 0;
            let mut last_speed = sim.progression().speed;
            let mut endings = 0;

            for op in ops {
                let ticked = matches!(op, Op::Tick(_));
                match op {
                    Op::Tick(dt) => sim.tick(dt),
                    Op::Left => sim.move_left(),
                    Op::Right => sim.move_right(),
                    Op::Pause => sim.toggle_pause(),
                }

                let p = sim.progression();
                prop_assert!(p.combo <= p.max_combo);
                prop_assert!(p.score >= last_score);
                prop_assert!(p.speed >= last_speed);
                prop_assert!(p.speed >= settings.min_speed && p.speed <= settings.max_speed);
                last_score = p.score;
                last_speed = p.speed;

                let mut ids = BTreeSet::new();
                for id in sim.obstacles().iter().map(|o| o.id).chain(sim.powerups().iter().map(|p| p.id)) {
                    prop_assert!(ids.insert(id), "duplicate id {}", id);
                }
                prop_assert!(sim.powerups().iter().all(|p| !p.collected));

                // Events describe the last tick only
                if ticked {
                    endings += sim
                        .events()
                        .iter()
                        .filter(|e| matches!(e, GameEvent::SessionEnded { .. }))
                        .count();
                }
                prop_assert!(endings <= 1);
                if sim.phase() == GamePhase::Terminated {
                    prop_assert_eq!(endings, 1);
                    prop_assert_eq!(sim.summary().map(|s| s.score), Some(p.score));
                }
            }
        }
    }
}
