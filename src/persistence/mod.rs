//! Session hand-off to stats storage
//!
//! The simulation never touches storage. When a run ends it builds a
//! [`SessionRecord`] and passes it to whatever [`StatsSink`] the host
//! attached. [`LifetimeStats`] is the stock sink: cross-session aggregates,
//! achievements and the leaderboard, serializable to JSON for the host to store.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::highscores::HighScores;
use crate::sim::SessionSummary;

/// Sessions kept in the recent history
pub const MAX_RECENT_SESSIONS: usize = 50;

/// One finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub score: u64,
    pub distance_m: f64,
    pub duration_ms: f64,
    pub obstacles_avoided: u32,
    pub powerups_collected: u32,
    pub max_combo: u32,
    pub perfect_dodges: u32,
}

impl From<&SessionSummary> for SessionRecord {
    fn from(summary: &SessionSummary) -> Self {
        Self {
            score: summary.score,
            distance_m: summary.distance_m,
            duration_ms: summary.duration_ms,
            obstacles_avoided: summary.obstacles_avoided,
            powerups_collected: summary.powerups_collected,
            max_combo: summary.max_combo,
            perfect_dodges: summary.perfect_dodges,
        }
    }
}

/// Receives finished sessions
pub trait StatsSink {
    fn record_session(&mut self, record: &SessionRecord);
}

/// Lets a host keep a handle on the sink it gave the simulation
impl<S: StatsSink> StatsSink for Rc<RefCell<S>> {
    fn record_session(&mut self, record: &SessionRecord) {
        self.borrow_mut().record_session(record);
    }
}

impl StatsSink for Vec<SessionRecord> {
    fn record_session(&mut self, record: &SessionRecord) {
        self.push(record.clone());
    }
}

/// Unlockable milestones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstThousand,
    SpeedDemon,
    RacingLegend,
    NeonMaster,
    PersistentRacer,
    RacingVeteran,
    MarathonRunner,
    PowerCollector,
}

impl Achievement {
    pub const ALL: [Achievement; 8] = [
        Achievement::FirstThousand,
        Achievement::SpeedDemon,
        Achievement::RacingLegend,
        Achievement::NeonMaster,
        Achievement::PersistentRacer,
        Achievement::RacingVeteran,
        Achievement::MarathonRunner,
        Achievement::PowerCollector,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Achievement::FirstThousand => "First Thousand",
            Achievement::SpeedDemon => "Speed Demon",
            Achievement::RacingLegend => "Racing Legend",
            Achievement::NeonMaster => "Neon Master",
            Achievement::PersistentRacer => "Persistent Racer",
            Achievement::RacingVeteran => "Racing Veteran",
            Achievement::MarathonRunner => "Marathon Runner",
            Achievement::PowerCollector => "Power Collector",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Achievement::FirstThousand => "Score 1,000 points in a single race",
            Achievement::SpeedDemon => "Score 5,000 points in a single race",
            Achievement::RacingLegend => "Score 10,000 points in a single race",
            Achievement::NeonMaster => "Score 25,000 points in a single race",
            Achievement::PersistentRacer => "Play 10 games",
            Achievement::RacingVeteran => "Play 50 games",
            Achievement::MarathonRunner => "Travel 1,000 meters in a single race",
            Achievement::PowerCollector => "Collect 10 power-ups in a single race",
        }
    }

    /// Does this run (with lifetime totals already updated) earn it?
    fn earned(&self, stats: &LifetimeStats, record: &SessionRecord) -> bool {
        match self {
            Achievement::FirstThousand => record.score >= 1_000,
            Achievement::SpeedDemon => record.score >= 5_000,
            Achievement::RacingLegend => record.score >= 10_000,
            Achievement::NeonMaster => record.score >= 25_000,
            Achievement::PersistentRacer => stats.games_played >= 10,
            Achievement::RacingVeteran => stats.games_played >= 50,
            Achievement::MarathonRunner => record.distance_m >= 1_000.0,
            Achievement::PowerCollector => record.powerups_collected >= 10,
        }
    }
}

/// Cross-session aggregates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifetimeStats {
    pub games_played: u32,
    pub high_score: u64,
    pub total_score: u64,
    pub total_distance_m: f64,
    pub total_time_ms: f64,
    /// Best combo across all runs
    pub best_streak: u32,
    pub achievements: Vec<Achievement>,
    /// Newest first
    pub recent: Vec<SessionRecord>,
    pub high_scores: HighScores,
}

impl LifetimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a run into the totals. Returns achievements unlocked by it.
    pub fn record(&mut self, record: &SessionRecord) -> Vec<Achievement> {
        self.games_played += 1;
        self.high_score = self.high_score.max(record.score);
        self.total_score = self.total_score.saturating_add(record.score);
        self.total_distance_m += record.distance_m;
        self.total_time_ms += record.duration_ms;
        self.best_streak = self.best_streak.max(record.max_combo);

        self.recent.insert(0, record.clone());
        self.recent.truncate(MAX_RECENT_SESSIONS);
        self.high_scores.add_record(record);

        let unlocked: Vec<Achievement> = Achievement::ALL
            .into_iter()
            .filter(|a| !self.achievements.contains(a) && a.earned(self, record))
            .collect();
        for achievement in &unlocked {
            log::info!("Achievement unlocked: {}", achievement.name());
        }
        self.achievements.extend(unlocked.iter().copied());
        unlocked
    }

    /// Mean score per game, rounded
    pub fn average_score(&self) -> u64 {
        if self.games_played == 0 {
            return 0;
        }
        (self.total_score as f64 / self.games_played as f64).round() as u64
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl StatsSink for LifetimeStats {
    fn record_session(&mut self, record: &SessionRecord) {
        self.record(record);
    }
}
