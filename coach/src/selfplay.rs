//! Self-play episodes.
//!
//! One episode owns its board, search graph and RNG. The search runs at the
//! configured temperature for the first `temp_threshold` plies and greedily
//! afterwards; the graph is re-rooted after every move. Each searched
//! position is recorded under all ten board symmetries, and value targets
//! are back-filled from the final result once the game is over.

use crate::oracle::{oracle_example, Oracle};
use crate::samples::{augment_position, backfill_values, TrainingExample};
use crate::workers::job_seed;
use anyhow::{anyhow, Result};
use engine_core::game_utils::relative_value;
use engine_core::{Game, Player};
use games_mill::{MillGame, TerminalReason};
use mcts::{Evaluator, MctsConfig, MctsSearch, SearchError, SearchStats};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone)]
pub struct EpisodeConfig {
    /// Search settings; `temperature` applies before the threshold.
    pub mcts: MctsConfig,
    pub temp_threshold: u32,
    pub max_moves: u32,
    /// Chance that a position also yields an oracle-labelled example.
    pub oracle_fraction: f64,
}

/// A finished self-play game.
#[derive(Debug, Clone)]
pub struct Episode {
    /// Self-play examples in move order, then the oracle-labelled ones.
    pub examples: Vec<TrainingExample>,
    /// Number of trailing oracle-labelled examples.
    pub oracle_examples: usize,
    pub reason: TerminalReason,
    /// Final result from the first player's perspective.
    pub result: f32,
    pub plies: u32,
    pub stats: SearchStats,
    pub duration: Duration,
    /// Attempts needed, including the successful one.
    pub attempts: u32,
}

/// Per-episode search statistics, summarized for logging.
#[derive(Debug, Default)]
pub struct EpisodeStats {
    pub searches: u64,
    pub simulations: u64,
    pub evaluations: u64,
    pub terminal_hits: u64,
    pub transposition_hits: u64,
    pub select_time: Duration,
    pub eval_time: Duration,
    pub backup_time: Duration,
    pub total_time: Duration,
}

impl EpisodeStats {
    pub fn add(&mut self, stats: &SearchStats) {
        self.searches += stats.searches;
        self.simulations += stats.simulations;
        self.evaluations += stats.evaluations;
        self.terminal_hits += stats.terminal_hits;
        self.transposition_hits += stats.transposition_hits;
        self.select_time += stats.select_time;
        self.eval_time += stats.eval_time;
        self.backup_time += stats.backup_time;
        self.total_time += stats.total_time;
    }

    /// Log a breakdown of where search time went.
    pub fn log_summary(&self, episode: u64) {
        let total_us = self.total_time.as_micros().max(1) as f64;
        let pct = |d: Duration| format!("{:.1}%", d.as_micros() as f64 * 100.0 / total_us);
        info!(
            episode,
            searches = self.searches,
            simulations = self.simulations,
            evaluations = self.evaluations,
            terminal_hits = self.terminal_hits,
            transposition_hits = self.transposition_hits,
            select = %pct(self.select_time),
            eval = %pct(self.eval_time),
            backup = %pct(self.backup_time),
            total_ms = self.total_time.as_millis() as u64,
            "Search timing breakdown"
        );
    }
}

/// Play one episode.
///
/// Evaluator failures come back as `SearchError::EvaluatorError` so the
/// caller can retry; an action the rules refuse is `IllegalAction`.
pub fn play_episode(
    game: &MillGame,
    evaluator: &dyn Evaluator,
    config: &EpisodeConfig,
    seed: u64,
    oracle: Option<&dyn Oracle>,
) -> Result<Episode, SearchError> {
    let start = Instant::now();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut search: MctsSearch<MillGame> = MctsSearch::new(config.mcts.clone());
    let symmetry = game.symmetry();

    let mut board = game.initial_state();
    let mut examples = Vec::new();
    let mut labelled = Vec::new();
    let mut stats = SearchStats::default();
    let mut plies = 0u32;

    let (queried, result, reason) = loop {
        let mover = board.to_move();
        if let Some(terminal) = board.check_terminal(mover) {
            break (mover, terminal.value, terminal.reason);
        }
        if plies >= config.max_moves {
            break (mover, 0.0, TerminalReason::MoveCap);
        }

        let temperature = if plies < config.temp_threshold {
            config.mcts.temperature
        } else {
            0.0
        };
        search.set_temperature(temperature);

        let searched = search.run(game, evaluator, &board, &mut rng)?;
        stats.merge(&searched.stats);
        examples.extend(augment_position(symmetry, &board, &searched.policy));

        if let Some(oracle) = oracle {
            if config.oracle_fraction > 0.0 && rng.gen::<f64>() < config.oracle_fraction {
                match oracle_example(oracle, &board) {
                    Ok(Some(example)) => labelled.push(example),
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "Oracle label skipped"),
                }
            }
        }

        trace!(
            ply = plies,
            action = searched.action,
            value = searched.value,
            temperature,
            "Self-play move"
        );
        board = game
            .apply(&board, searched.action)
            .map_err(|source| SearchError::IllegalAction {
                action: searched.action,
                source,
            })?;
        search.advance(searched.action);
        plies += 1;
    };

    // Oracle examples keep their own values.
    backfill_values(&mut examples, queried, result);
    let oracle_examples = labelled.len();
    examples.extend(labelled);

    Ok(Episode {
        examples,
        oracle_examples,
        reason,
        result: relative_value(result, queried, Player::One),
        plies,
        stats,
        duration: start.elapsed(),
        attempts: 1,
    })
}

/// Play an episode, retrying with a fresh graph and seed when the evaluator
/// fails. Returns `Ok(None)` once the retries are used up; any other error
/// aborts.
pub fn play_episode_with_retries(
    game: &MillGame,
    evaluator: &dyn Evaluator,
    config: &EpisodeConfig,
    seed: u64,
    retries: u32,
    oracle: Option<&dyn Oracle>,
) -> Result<Option<Episode>> {
    for attempt in 0..=retries {
        let attempt_seed = if attempt == 0 {
            seed
        } else {
            job_seed(seed, attempt as u64)
        };
        match play_episode(game, evaluator, config, attempt_seed, oracle) {
            Ok(mut episode) => {
                episode.attempts = attempt + 1;
                return Ok(Some(episode));
            }
            Err(e) if e.is_evaluator_failure() => {
                warn!(attempt, retries, error = %e, "Evaluator failed, retrying episode");
            }
            Err(e) => return Err(anyhow!(e).context("self-play episode failed")),
        }
    }
    warn!(retries, "Episode dropped after repeated evaluator failures");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::FirstMoveOracle;
    use crate::oracle::Wdl;
    use engine_core::ActionMask;
    use games_mill::{Curriculum, Rules, NUM_ACTIONS, NUM_SYMMETRIES};
    use mcts::{EvalResult, EvaluatorError, UniformEvaluator};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn config(max_moves: u32) -> EpisodeConfig {
        EpisodeConfig {
            mcts: MctsConfig::for_testing()
                .with_simulations(12)
                .with_temperature(1.0),
            temp_threshold: 4,
            max_moves,
            oracle_fraction: 0.0,
        }
    }

    /// Fails every call once `fail_after` calls have been made.
    struct BrokenEvaluator {
        calls: AtomicU32,
        fail_after: u32,
    }

    impl Evaluator for BrokenEvaluator {
        fn evaluate(&self, obs: &[f32], legal: &ActionMask) -> Result<EvalResult, EvaluatorError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) >= self.fail_after {
                return Err(EvaluatorError::EvaluationFailed("device lost".into()));
            }
            UniformEvaluator::new().evaluate(obs, legal)
        }
    }

    #[test]
    fn test_episode_records_every_symmetry() {
        let game = MillGame::default();
        let episode = play_episode(&game, &UniformEvaluator::new(), &config(10), 1, None).unwrap();

        assert_eq!(episode.plies, 10);
        assert_eq!(episode.reason, TerminalReason::MoveCap);
        assert_eq!(episode.result, 0.0);
        assert_eq!(episode.examples.len(), 10 * NUM_SYMMETRIES);
        for example in &episode.examples {
            assert_eq!(example.policy.len(), NUM_ACTIONS);
            assert_eq!(example.value, 0.0);
        }
        assert_eq!(episode.stats.searches, 10);
    }

    #[test]
    fn test_episode_is_deterministic() {
        let game = MillGame::default();
        let a = play_episode(&game, &UniformEvaluator::new(), &config(20), 5, None).unwrap();
        let b = play_episode(&game, &UniformEvaluator::new(), &config(20), 5, None).unwrap();
        assert_eq!(a.examples, b.examples);
        assert_eq!(a.plies, b.plies);
    }

    #[test]
    fn test_values_backfilled_from_mover_perspective() {
        // Placing-only games stop after placement with a heuristic score.
        let rules = Rules::default().with_curriculum(Curriculum::PlacingOnly { weight: 1.0 });
        let game = MillGame::new(rules);
        let episode = play_episode(&game, &UniformEvaluator::new(), &config(300), 3, None).unwrap();

        assert_eq!(episode.reason, TerminalReason::Heuristic);
        for example in &episode.examples {
            let expected = relative_value(episode.result, Player::One, example.mover);
            assert!((example.value - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_greedy_after_threshold() {
        let game = MillGame::default();
        let mut cfg = config(6);
        cfg.temp_threshold = 2;
        let episode = play_episode(&game, &UniformEvaluator::new(), &cfg, 9, None).unwrap();

        // Greedy plies record one-hot targets.
        let late = &episode.examples[2 * NUM_SYMMETRIES..];
        for example in late {
            assert_eq!(example.policy.iter().filter(|&&p| p > 0.0).count(), 1);
        }
    }

    #[test]
    fn test_oracle_examples_added() {
        let game = MillGame::default();
        let mut cfg = config(8);
        cfg.oracle_fraction = 1.0;
        let oracle = FirstMoveOracle { wdl: Wdl::Draw };
        let episode =
            play_episode(&game, &UniformEvaluator::new(), &cfg, 2, Some(&oracle)).unwrap();

        assert_eq!(episode.oracle_examples, 8);
        assert_eq!(episode.examples.len(), 8 * NUM_SYMMETRIES + 8);
    }

    #[test]
    fn test_oracle_values_survive_backfill() {
        let game = MillGame::default();
        let mut cfg = config(4);
        cfg.oracle_fraction = 1.0;
        let oracle = FirstMoveOracle { wdl: Wdl::Win };
        let episode =
            play_episode(&game, &UniformEvaluator::new(), &cfg, 2, Some(&oracle)).unwrap();

        assert_eq!(episode.reason, TerminalReason::MoveCap);
        let split = episode.examples.len() - episode.oracle_examples;
        assert_eq!(split, 4 * NUM_SYMMETRIES);
        assert!(episode.examples[..split].iter().all(|e| e.value == 0.0));
        let oracle_values: Vec<f32> = episode.examples[split..].iter().map(|e| e.value).collect();
        assert_eq!(oracle_values, vec![1.0; 4]);
    }

    #[test]
    fn test_evaluator_failure_is_retried() {
        let game = MillGame::default();
        // The first attempt fails on its fourth call; later attempts succeed.
        struct FailOnce {
            calls: AtomicU32,
        }
        impl Evaluator for FailOnce {
            fn evaluate(
                &self,
                obs: &[f32],
                legal: &ActionMask,
            ) -> Result<EvalResult, EvaluatorError> {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 3 {
                    return Err(EvaluatorError::NonFinite("value is NaN".into()));
                }
                UniformEvaluator::new().evaluate(obs, legal)
            }
        }

        let evaluator = FailOnce {
            calls: AtomicU32::new(0),
        };
        let episode = play_episode_with_retries(&game, &evaluator, &config(5), 4, 2, None)
            .unwrap()
            .unwrap();
        assert_eq!(episode.attempts, 2);
        assert_eq!(episode.plies, 5);
    }

    #[test]
    fn test_episode_dropped_after_retries() {
        let game = MillGame::default();
        let evaluator = BrokenEvaluator {
            calls: AtomicU32::new(0),
            fail_after: 0,
        };
        let result = play_episode_with_retries(&game, &evaluator, &config(5), 4, 2, None).unwrap();
        assert!(result.is_none());
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_episode_stats_summary() {
        let mut stats = EpisodeStats::default();
        let search = SearchStats {
            searches: 2,
            simulations: 20,
            evaluations: 15,
            ..SearchStats::default()
        };
        stats.add(&search);
        stats.add(&search);
        assert_eq!(stats.searches, 4);
        assert_eq!(stats.simulations, 40);
        assert_eq!(stats.evaluations, 30);
        stats.log_summary(1);
    }
}
