//! Neon Lanes entry point
//!
//! Native builds run a headless autopilot: a few seeded sessions played by a
//! simple dodging bot, folded into lifetime stats that are printed as JSON.
//!
//! Usage: `neon-lanes [seed] [easy|normal|hard]`

#[cfg(not(target_arch = "wasm32"))]
use std::cell::RefCell;
#[cfg(not(target_arch = "wasm32"))]
use std::rc::Rc;

#[cfg(not(target_arch = "wasm32"))]
use neon_lanes::{DifficultyPreset, GamePhase, LifetimeStats, Settings, Simulation};

#[cfg(not(target_arch = "wasm32"))]
const FRAME_DT: f32 = 1.0 / 60.0;
/// Five minutes of play per session at most
#[cfg(not(target_arch = "wasm32"))]
const MAX_FRAMES: u32 = 60 * 60 * 5;
#[cfg(not(target_arch = "wasm32"))]
const RUNS: u32 = 3;
/// How far above the car the bot looks for trouble (px)
#[cfg(not(target_arch = "wasm32"))]
const LOOKAHEAD_PX: f32 = 220.0;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);
    let preset = args
        .next()
        .and_then(|s| DifficultyPreset::from_str(&s))
        .unwrap_or_default();
    log::info!(
        "Neon Lanes (headless) starting, seed {} on {}",
        seed,
        preset.as_str()
    );

    let mut sim = match Simulation::new(Settings::from_preset(preset), seed) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("Invalid settings: {}", e);
            std::process::exit(1);
        }
    };
    let stats = Rc::new(RefCell::new(LifetimeStats::new()));
    sim.set_stats_sink(Box::new(stats.clone()));

    for run in 1..=RUNS {
        sim.reset();
        sim.start();
        for _ in 0..MAX_FRAMES {
            steer(&mut sim);
            sim.tick(FRAME_DT);
            if sim.phase() == GamePhase::Terminated {
                break;
            }
        }

        match sim.summary().map(serde_json::to_string) {
            Some(Ok(json)) => log::info!("Run {} summary: {}", run, json),
            Some(Err(e)) => log::warn!("Run {} summary not serializable: {}", run, e),
            None => log::info!(
                "Run {} survived the time limit with {} points",
                run,
                sim.progression().score
            ),
        }
    }

    match stats.borrow().to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to serialize lifetime stats: {}", e),
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Hosts embed the library directly; nothing to run here
}

/// Something unpassed in `lane` is about to reach the car
#[cfg(not(target_arch = "wasm32"))]
fn lane_blocked(sim: &Simulation, lane: usize) -> bool {
    let player = sim.player();
    let horizon = player.y - LOOKAHEAD_PX;
    sim.obstacles().iter().any(|o| {
        o.lane == lane
            && !o.passed
            && o.pos.y + o.size.y > horizon
            && o.pos.y < player.y + player.size.y
    })
}

/// Sidestep into a clear neighbouring lane, left first
#[cfg(not(target_arch = "wasm32"))]
fn steer(sim: &mut Simulation) {
    let lane = sim.player().lane;
    if !lane_blocked(sim, lane) {
        return;
    }
    let lanes = sim.settings().lane_count;
    let left_clear = lane > 0 && !lane_blocked(sim, lane - 1);
    let right_clear = lane + 1 < lanes && !lane_blocked(sim, lane + 1);
    if left_clear {
        sim.move_left();
    } else if right_clear {
        sim.move_right();
    }
}
