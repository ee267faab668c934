//! Self-play coordinator.
//!
//! One iteration is: parallel self-play with the current snapshot, a
//! training round over the example history, and a gating match between the
//! previous and the candidate snapshot. The candidate replaces the current
//! snapshot only when it wins often enough; otherwise the coordinator rolls
//! back to the previous one.

use crate::arena::{Arena, ArenaReport, Competitor};
use crate::config::TrainConfig;
use crate::model::{load_snapshot, save_snapshot, Trainer};
use crate::oracle::Oracle;
use crate::policy::Policy;
use crate::samples::{cap_examples, ExampleHistory, TrainingExample};
use crate::selfplay::{play_episode_with_retries, Episode, EpisodeConfig, EpisodeStats};
use crate::stats::CoachStats;
use crate::storage::{ExampleStore, GatingRecord};
use crate::workers::{effective_workers, job_seed, progress_bar, WorkerPool};
use anyhow::{Context, Result};
use engine_core::Game;
use games_mill::MillGame;
use mcts::{Evaluator, MctsConfig};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything the loop needs besides the game, the trainer and storage.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Iterations to run in this invocation.
    pub iterations: u32,
    pub episodes_per_iteration: u32,
    pub workers: usize,
    pub seed: u64,
    pub episode: EpisodeConfig,
    pub episode_retries: u32,
    pub max_examples_per_iteration: usize,
    pub history_iterations: usize,
    /// Log a search timing breakdown every this many episodes; 0 disables.
    pub log_interval: u32,
    pub arena_games: u32,
    pub arena_workers: usize,
    pub arena_max_moves: u32,
    pub arena_seed: u64,
    pub arena_search: MctsConfig,
    pub update_threshold: f64,
    pub model_path: PathBuf,
}

impl CoordinatorSettings {
    pub fn from_config(config: &TrainConfig) -> Self {
        Self {
            iterations: config.iterations,
            episodes_per_iteration: config.episodes_per_iteration,
            workers: config.workers,
            seed: config.seed,
            episode: EpisodeConfig {
                mcts: config.search.training_config(),
                temp_threshold: config.temp_threshold,
                max_moves: config.max_moves,
                oracle_fraction: config.oracle_fraction,
            },
            episode_retries: config.episode_retries,
            max_examples_per_iteration: config.max_examples_per_iteration,
            history_iterations: config.history_iterations,
            log_interval: config.log_interval,
            arena_games: config.arena_games,
            arena_workers: config.arena_workers,
            arena_max_moves: config.arena_max_moves,
            arena_seed: config.arena_seed,
            arena_search: config.search.evaluation_config(),
            update_threshold: config.update_threshold,
            model_path: config.model_path(),
        }
    }
}

/// Examples produced by one self-play round.
#[derive(Debug, Default)]
struct SelfPlayBatch {
    examples: Vec<TrainingExample>,
    episodes: u32,
    dropped: u32,
    cancelled: bool,
}

/// What a `run` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorSummary {
    pub iterations_run: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub episodes: u32,
    pub dropped_episodes: u32,
    pub last_iteration: Option<u32>,
    pub last_win_rate: Option<f64>,
    pub cancelled: bool,
}

/// Accept a candidate iff it won at least `threshold` of the decided games.
/// Draws, capped and heuristic games never count.
pub fn gate_accepts(new_wins: u32, old_wins: u32, threshold: f64) -> bool {
    let decided = new_wins + old_wins;
    decided > 0 && new_wins as f64 / decided as f64 >= threshold
}

/// Gating record for a match where the candidate played as competitor two.
pub fn gating_record(iteration: u32, report: &ArenaReport, threshold: f64) -> GatingRecord {
    GatingRecord {
        iteration,
        new_wins: report.two_won,
        old_wins: report.one_won,
        draws: report.draws,
        capped: report.capped,
        heuristic: report.heuristic.total(),
        accepted: gate_accepts(report.two_won, report.one_won, threshold),
        win_rate: report.two_win_rate(),
    }
}

pub struct SelfPlayCoordinator<T: Trainer> {
    game: MillGame,
    settings: CoordinatorSettings,
    trainer: T,
    current: Arc<T::Model>,
    history: ExampleHistory,
    store: Option<ExampleStore>,
    stats: Arc<CoachStats>,
    oracle: Option<Arc<dyn Oracle>>,
    cancel: Arc<AtomicBool>,
    next_iteration: u32,
}

impl<T: Trainer> SelfPlayCoordinator<T> {
    pub fn new(
        game: MillGame,
        settings: CoordinatorSettings,
        trainer: T,
        stats: Arc<CoachStats>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let current = Arc::new(trainer.initial());
        let history = ExampleHistory::new(settings.history_iterations);
        Self {
            game,
            settings,
            trainer,
            current,
            history,
            store: None,
            stats,
            oracle: None,
            cancel,
            next_iteration: 0,
        }
    }

    /// Persist examples and gating decisions in `store`.
    pub fn with_store(mut self, store: ExampleStore) -> Result<Self> {
        store
            .store_metadata(&self.game.metadata())
            .context("failed to store game metadata")?;
        self.store = Some(store);
        Ok(self)
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Pick up where a previous run stopped: example history and iteration
    /// counter from the store, current snapshot from the model file.
    pub fn resume(&mut self) -> Result<()> {
        if let Some(store) = &self.store {
            for (iteration, examples) in store.load_history(self.settings.history_iterations)? {
                self.history.push(iteration, examples);
            }
            if let Some(last) = store.last_iteration()? {
                self.next_iteration = last + 1;
            }
        }

        if self.settings.model_path.exists() {
            let model: T::Model = load_snapshot(&self.settings.model_path)?;
            self.current = Arc::new(model);
            info!(path = %self.settings.model_path.display(), "Loaded accepted snapshot");
        } else {
            info!("No accepted snapshot yet, starting from the initial model");
        }

        info!(
            next_iteration = self.next_iteration,
            history_iterations = self.history.len(),
            history_examples = self.history.total_examples(),
            "Resumed coordinator state"
        );
        Ok(())
    }

    pub fn current_model(&self) -> &T::Model {
        &self.current
    }

    pub fn history(&self) -> &ExampleHistory {
        &self.history
    }

    pub fn next_iteration(&self) -> u32 {
        self.next_iteration
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Run the configured number of iterations, stopping early on cancel.
    pub fn run(&mut self) -> Result<CoordinatorSummary> {
        let mut summary = CoordinatorSummary::default();
        let first = self.next_iteration;
        info!(
            first_iteration = first,
            iterations = self.settings.iterations,
            episodes = self.settings.episodes_per_iteration,
            workers = self.settings.workers,
            "Coordinator starting"
        );

        for iteration in first..first + self.settings.iterations {
            if self.cancelled() {
                summary.cancelled = true;
                break;
            }
            let start = Instant::now();

            let batch = self.self_play(iteration)?;
            summary.episodes += batch.episodes;
            summary.dropped_episodes += batch.dropped;
            if batch.cancelled {
                info!(iteration, "Self-play cancelled, iteration discarded");
                summary.cancelled = true;
                break;
            }
            if batch.examples.is_empty() {
                warn!(iteration, "Self-play produced no examples, skipping training");
                self.next_iteration = iteration + 1;
                continue;
            }

            let examples = cap_examples(batch.examples, self.settings.max_examples_per_iteration);
            if let Some(store) = &self.store {
                store.store_iteration(iteration, &examples)?;
            }
            let evicted = self.history.push(iteration, examples);
            if !evicted.is_empty() {
                debug!(iteration, ?evicted, "Evicted old iterations from history");
                if let (Some(store), Some(oldest)) = (&self.store, self.history.oldest_iteration())
                {
                    store.prune_before(oldest)?;
                }
            }

            let training = self.history.examples();
            let candidate = Arc::new(
                self.trainer
                    .train(&self.current, &training)
                    .with_context(|| format!("training failed in iteration {iteration}"))?,
            );

            let report = self.gate(iteration, &candidate)?;
            if self.cancelled() {
                info!(iteration, "Gating cancelled, keeping the previous snapshot");
                summary.cancelled = true;
                break;
            }

            let record = gating_record(iteration, &report, self.settings.update_threshold);
            if record.accepted {
                save_snapshot(candidate.as_ref(), &self.settings.model_path)?;
                self.current = candidate;
                summary.accepted += 1;
            } else {
                summary.rejected += 1;
            }
            info!(
                iteration,
                new_wins = record.new_wins,
                old_wins = record.old_wins,
                draws = record.draws,
                capped = record.capped,
                heuristic = record.heuristic,
                win_rate = ?record.win_rate,
                accepted = record.accepted,
                examples = training.len(),
                elapsed_s = format!("{:.1}", start.elapsed().as_secs_f64()),
                "{}",
                if record.accepted {
                    "Accepted new snapshot"
                } else {
                    "Rejected new snapshot, rolled back"
                }
            );

            if let Some(store) = &self.store {
                store.store_gating(&record)?;
            }
            self.stats.record_gating(&record);
            self.stats.write_stats();

            summary.iterations_run += 1;
            summary.last_iteration = Some(iteration);
            if record.win_rate.is_some() {
                summary.last_win_rate = record.win_rate;
            }
            self.next_iteration = iteration + 1;
        }

        info!(
            iterations = summary.iterations_run,
            accepted = summary.accepted,
            rejected = summary.rejected,
            cancelled = summary.cancelled,
            "Coordinator finished"
        );
        Ok(summary)
    }

    fn self_play(&self, iteration: u32) -> Result<SelfPlayBatch> {
        let episodes = self.settings.episodes_per_iteration as usize;
        let evaluator = Arc::clone(&self.current);
        let workers = effective_workers(self.settings.workers, evaluator.device_bound());
        let pool = WorkerPool::new(workers);
        let iteration_seed = job_seed(self.settings.seed, iteration as u64);
        let oracle = self.oracle.as_deref();
        let config = &self.settings.episode;
        let game = &self.game;
        let retries = self.settings.episode_retries;

        info!(iteration, episodes, workers, "Self-play starting");
        let progress = progress_bar(episodes as u64, "episodes");
        let mut search_stats = EpisodeStats::default();
        let mut finished = 0u64;

        let outcome = pool.run(
            episodes,
            &self.cancel,
            |index| {
                play_episode_with_retries(
                    game,
                    &*evaluator,
                    config,
                    job_seed(iteration_seed, index as u64),
                    retries,
                    oracle,
                )
            },
            |episode: &Option<Episode>| {
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                match episode {
                    Some(episode) => {
                        self.stats.record_episode(episode);
                        search_stats.add(&episode.stats);
                        finished += 1;
                        debug!(
                            iteration,
                            reason = %episode.reason,
                            result = episode.result,
                            plies = episode.plies,
                            examples = episode.examples.len(),
                            attempts = episode.attempts,
                            duration_ms = episode.duration.as_millis() as u64,
                            "Episode complete"
                        );
                        let interval = self.settings.log_interval as u64;
                        if interval > 0 && finished % interval == 0 {
                            search_stats.log_summary(finished);
                        }
                    }
                    None => self.stats.record_failed_episode(),
                }
            },
        )?;
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let mut batch = SelfPlayBatch {
            cancelled: outcome.cancelled,
            ..Default::default()
        };
        for (_, episode) in outcome.items {
            match episode {
                Some(episode) => {
                    batch.episodes += 1;
                    batch.examples.extend(episode.examples);
                }
                None => batch.dropped += 1,
            }
        }
        if !outcome.lost_workers.is_empty() {
            warn!(
                iteration,
                lost_workers = ?outcome.lost_workers,
                discarded = outcome.discarded,
                "Continuing with the episodes of the remaining workers"
            );
        }

        info!(
            iteration,
            episodes = batch.episodes,
            dropped = batch.dropped,
            examples = batch.examples.len(),
            "Self-play finished"
        );
        Ok(batch)
    }

    /// Previous snapshot as competitor one, candidate as competitor two.
    fn gate(&self, iteration: u32, candidate: &Arc<T::Model>) -> Result<ArenaReport> {
        let previous: Arc<dyn Evaluator> = self.current.clone();
        let candidate: Arc<dyn Evaluator> = candidate.clone();
        let device_bound = previous.device_bound() || candidate.device_bound();
        let workers = effective_workers(self.settings.arena_workers, device_bound);
        let arena = Arena::new(
            self.game.clone(),
            self.settings.arena_games,
            self.settings.arena_max_moves,
            job_seed(self.settings.arena_seed, iteration as u64),
        )
        .with_workers(workers)
        .with_retries(self.settings.episode_retries);
        let search = &self.settings.arena_search;

        let progress = progress_bar(self.settings.arena_games as u64, "games");
        let report = arena.run(
            |competitor, seed| {
                let evaluator = match competitor {
                    Competitor::One => Arc::clone(&previous),
                    Competitor::Two => Arc::clone(&candidate),
                };
                Ok(Policy::search_backed(evaluator, search.clone(), seed))
            },
            &self.cancel,
            progress.as_ref(),
        )?;
        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FrequencyModel, FrequencyTrainer};
    use games_mill::Rules;
    use tempfile::tempdir;

    fn settings(model_path: PathBuf) -> CoordinatorSettings {
        CoordinatorSettings {
            iterations: 2,
            episodes_per_iteration: 3,
            workers: 2,
            seed: 5,
            episode: EpisodeConfig {
                mcts: MctsConfig::for_testing()
                    .with_simulations(8)
                    .with_temperature(1.0),
                temp_threshold: 4,
                max_moves: 10,
                oracle_fraction: 0.0,
            },
            episode_retries: 1,
            max_examples_per_iteration: 1000,
            history_iterations: 2,
            log_interval: 0,
            arena_games: 2,
            arena_workers: 2,
            arena_max_moves: 10,
            arena_seed: 9,
            arena_search: MctsConfig::for_evaluation().with_simulations(8),
            update_threshold: 0.55,
            model_path,
        }
    }

    fn coordinator(
        dir: &std::path::Path,
        cancel: Arc<AtomicBool>,
    ) -> SelfPlayCoordinator<FrequencyTrainer> {
        let stats = Arc::new(CoachStats::new(dir.join("coach_stats.json"), "mill"));
        let store = ExampleStore::new(&dir.join("replay.db")).unwrap();
        SelfPlayCoordinator::new(
            MillGame::new(Rules::default()),
            settings(dir.join("models").join("best.json")),
            FrequencyTrainer::default(),
            stats,
            cancel,
        )
        .with_store(store)
        .unwrap()
    }

    #[test]
    fn test_gate_accepts() {
        assert!(gate_accepts(6, 4, 0.55));
        assert!(gate_accepts(11, 9, 0.55));
        assert!(!gate_accepts(5, 5, 0.55));
        // Nothing decided: never accept, even at threshold 0.
        assert!(!gate_accepts(0, 0, 0.0));
        assert!(gate_accepts(1, 0, 1.0));
    }

    #[test]
    fn test_gating_record_ignores_undecided_games() {
        let report = ArenaReport {
            one_won: 1,
            two_won: 3,
            draws: 5,
            capped: 7,
            ..Default::default()
        };
        let record = gating_record(4, &report, 0.7);
        assert_eq!(record.new_wins, 3);
        assert_eq!(record.old_wins, 1);
        assert_eq!(record.win_rate, Some(0.75));
        assert!(record.accepted);

        let capped_only = ArenaReport {
            capped: 10,
            ..Default::default()
        };
        let record = gating_record(5, &capped_only, 0.0);
        assert!(!record.accepted);
        assert_eq!(record.win_rate, None);
    }

    #[test]
    fn test_run_and_resume() {
        let dir = tempdir().unwrap();
        let cancel = Arc::new(AtomicBool::new(false));

        let mut first = coordinator(dir.path(), Arc::clone(&cancel));
        let summary = first.run().unwrap();
        assert_eq!(summary.iterations_run, 2);
        assert_eq!(summary.episodes, 6);
        assert_eq!(summary.last_iteration, Some(1));
        assert!(!summary.cancelled);
        // Ten plies cannot decide a game, so every gating round is capped.
        assert_eq!(summary.rejected, 2);
        assert_eq!(first.current_model(), &FrequencyModel::uniform());
        assert!(!dir.path().join("models").join("best.json").exists());

        let stats = std::fs::read_to_string(dir.path().join("coach_stats.json")).unwrap();
        assert!(stats.contains("\"rejected\": 2"));

        let store = ExampleStore::new(&dir.path().join("replay.db")).unwrap();
        let records = store.gating_records().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| !r.accepted && r.capped == 2));

        let mut second = coordinator(dir.path(), cancel);
        second.resume().unwrap();
        assert_eq!(second.next_iteration(), 2);
        assert_eq!(second.history().len(), 2);
        assert_eq!(second.history().latest_iteration(), Some(1));
    }

    #[test]
    fn test_history_window_prunes_store() {
        let dir = tempdir().unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let mut coordinator = coordinator(dir.path(), cancel);
        coordinator.settings.iterations = 3;
        coordinator.run().unwrap();

        assert_eq!(coordinator.history().oldest_iteration(), Some(1));
        let store = ExampleStore::new(&dir.path().join("replay.db")).unwrap();
        let stored: Vec<u32> = store
            .load_history(10)
            .unwrap()
            .into_iter()
            .map(|(i, _)| i)
            .collect();
        assert_eq!(stored, vec![1, 2]);
    }

    #[test]
    fn test_oracle_examples_join_history() {
        use crate::oracle::testing::FirstMoveOracle;
        use crate::oracle::Wdl;

        let dir = tempdir().unwrap();
        let mut coordinator = coordinator(dir.path(), Arc::new(AtomicBool::new(false)))
            .with_oracle(Arc::new(FirstMoveOracle { wdl: Wdl::Draw }));
        coordinator.settings.iterations = 1;
        coordinator.settings.episode.oracle_fraction = 1.0;
        coordinator.run().unwrap();

        // Three episodes of ten plies: ten symmetric copies per ply plus one
        // oracle example per ply.
        assert_eq!(coordinator.history().total_examples(), 3 * 10 * 11);
    }

    #[test]
    fn test_cancelled_before_start() {
        let dir = tempdir().unwrap();
        let cancel = Arc::new(AtomicBool::new(true));
        let mut coordinator = coordinator(dir.path(), cancel);
        let summary = coordinator.run().unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.iterations_run, 0);
        assert_eq!(coordinator.next_iteration(), 0);
    }

    #[test]
    fn test_resume_loads_accepted_snapshot() {
        let dir = tempdir().unwrap();
        let mut model = FrequencyModel::uniform();
        model.generation = 7;
        save_snapshot(&model, &dir.path().join("models").join("best.json")).unwrap();

        let mut coordinator = coordinator(dir.path(), Arc::new(AtomicBool::new(false)));
        coordinator.resume().unwrap();
        assert_eq!(coordinator.current_model().generation, 7);
        assert_eq!(coordinator.next_iteration(), 0);
    }
}
