//! Coach statistics tracking and persistence.
//!
//! Counters are updated lock-free from the self-play workers and written to
//! a JSON file after every iteration.

use crate::arena::GameOutcome;
use crate::selfplay::Episode;
use crate::storage::GatingRecord;
use engine_core::Player;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

/// Aggregated coach statistics, designed for lock-free updates.
#[derive(Debug)]
pub struct CoachStats {
    episodes: AtomicU32,
    plies: AtomicU64,
    /// Episodes dropped after exhausting their retries
    failed_episodes: AtomicU32,
    /// Extra attempts spent on episodes that eventually finished
    retries: AtomicU32,
    one_wins: AtomicU32,
    two_wins: AtomicU32,
    draws: AtomicU32,
    capped: AtomicU32,
    heuristic: AtomicU32,
    examples: AtomicU64,
    oracle_examples: AtomicU64,
    simulations: AtomicU64,
    search_us: AtomicU64,
    iterations: AtomicU32,
    accepted: AtomicU32,
    rejected: AtomicU32,
    /// f64 bits; NaN until a gating round had a decided game
    last_win_rate: AtomicU64,
    start_time: Instant,
    stats_path: PathBuf,
    env_id: String,
}

/// Serializable stats for JSON output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachStatsSnapshot {
    pub env_id: String,
    pub episodes: u32,
    pub failed_episodes: u32,
    pub retries: u32,
    pub total_plies: u64,
    pub avg_episode_length: f64,
    pub player_one_wins: u32,
    pub player_two_wins: u32,
    pub draws: u32,
    pub capped: u32,
    pub heuristic: u32,
    pub examples: u64,
    pub oracle_examples: u64,
    pub simulations: u64,
    pub avg_search_us_per_simulation: f64,
    pub iterations: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub last_win_rate: Option<f64>,
    pub episodes_per_second: f64,
    pub runtime_seconds: f64,
    pub timestamp: u64,
}

impl CoachStats {
    pub fn new(stats_path: impl Into<PathBuf>, env_id: &str) -> Self {
        let stats_path = stats_path.into();
        if let Some(parent) = stats_path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("Failed to create stats directory: {}", e);
            }
        }

        Self {
            episodes: AtomicU32::new(0),
            plies: AtomicU64::new(0),
            failed_episodes: AtomicU32::new(0),
            retries: AtomicU32::new(0),
            one_wins: AtomicU32::new(0),
            two_wins: AtomicU32::new(0),
            draws: AtomicU32::new(0),
            capped: AtomicU32::new(0),
            heuristic: AtomicU32::new(0),
            examples: AtomicU64::new(0),
            oracle_examples: AtomicU64::new(0),
            simulations: AtomicU64::new(0),
            search_us: AtomicU64::new(0),
            iterations: AtomicU32::new(0),
            accepted: AtomicU32::new(0),
            rejected: AtomicU32::new(0),
            last_win_rate: AtomicU64::new(f64::NAN.to_bits()),
            start_time: Instant::now(),
            stats_path,
            env_id: env_id.to_string(),
        }
    }

    /// Record a finished self-play episode.
    pub fn record_episode(&self, episode: &Episode) {
        self.episodes.fetch_add(1, Ordering::Relaxed);
        self.plies.fetch_add(episode.plies as u64, Ordering::Relaxed);
        self.retries
            .fetch_add(episode.attempts.saturating_sub(1), Ordering::Relaxed);
        self.examples
            .fetch_add(episode.examples.len() as u64, Ordering::Relaxed);
        self.oracle_examples
            .fetch_add(episode.oracle_examples as u64, Ordering::Relaxed);
        self.simulations
            .fetch_add(episode.stats.simulations, Ordering::Relaxed);
        self.search_us.fetch_add(
            episode.stats.total_time.as_micros() as u64,
            Ordering::Relaxed,
        );

        let winner = if episode.result > 0.0 {
            Some(Player::One)
        } else if episode.result < 0.0 {
            Some(Player::Two)
        } else {
            None
        };
        let counter = match GameOutcome::classify(episode.reason, episode.result, winner) {
            GameOutcome::Won(Player::One) => &self.one_wins,
            GameOutcome::Won(Player::Two) => &self.two_wins,
            GameOutcome::Drawn => &self.draws,
            GameOutcome::Capped => &self.capped,
            GameOutcome::Heuristic(_) => &self.heuristic,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_episode(&self) {
        self.failed_episodes.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the gating decision that closes an iteration.
    pub fn record_gating(&self, record: &GatingRecord) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
        if record.accepted {
            self.accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(rate) = record.win_rate {
            self.last_win_rate.store(rate.to_bits(), Ordering::Relaxed);
        }
    }

    /// Get a snapshot of current stats.
    pub fn snapshot(&self) -> CoachStatsSnapshot {
        let episodes = self.episodes.load(Ordering::Relaxed);
        let plies = self.plies.load(Ordering::Relaxed);
        let simulations = self.simulations.load(Ordering::Relaxed);
        let search_us = self.search_us.load(Ordering::Relaxed);
        let runtime = self.start_time.elapsed().as_secs_f64();
        let last_win_rate = f64::from_bits(self.last_win_rate.load(Ordering::Relaxed));

        CoachStatsSnapshot {
            env_id: self.env_id.clone(),
            episodes,
            failed_episodes: self.failed_episodes.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_plies: plies,
            avg_episode_length: if episodes > 0 {
                plies as f64 / episodes as f64
            } else {
                0.0
            },
            player_one_wins: self.one_wins.load(Ordering::Relaxed),
            player_two_wins: self.two_wins.load(Ordering::Relaxed),
            draws: self.draws.load(Ordering::Relaxed),
            capped: self.capped.load(Ordering::Relaxed),
            heuristic: self.heuristic.load(Ordering::Relaxed),
            examples: self.examples.load(Ordering::Relaxed),
            oracle_examples: self.oracle_examples.load(Ordering::Relaxed),
            simulations,
            avg_search_us_per_simulation: if simulations > 0 {
                search_us as f64 / simulations as f64
            } else {
                0.0
            },
            iterations: self.iterations.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            last_win_rate: (!last_win_rate.is_nan()).then_some(last_win_rate),
            episodes_per_second: if runtime > 0.0 {
                episodes as f64 / runtime
            } else {
                0.0
            },
            runtime_seconds: runtime,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }

    /// Write stats to JSON file (atomic write-then-rename).
    pub fn write_stats(&self) {
        let snapshot = self.snapshot();

        let json = match serde_json::to_string_pretty(&snapshot) {
            Ok(j) => j,
            Err(e) => {
                warn!("Failed to serialize coach stats: {}", e);
                return;
            }
        };

        let temp_path = self.stats_path.with_extension("json.tmp");
        match fs::File::create(&temp_path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(json.as_bytes()) {
                    warn!("Failed to write coach stats: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("Failed to create temp stats file: {}", e);
                return;
            }
        }

        if let Err(e) = fs::rename(&temp_path, &self.stats_path) {
            warn!("Failed to rename stats file: {}", e);
            let _ = fs::remove_file(&temp_path);
            return;
        }

        debug!("Wrote coach stats to {}", self.stats_path.display());
    }

    pub fn stats_path(&self) -> &Path {
        &self.stats_path
    }
}
