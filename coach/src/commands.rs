//! Subcommand entry points.

use crate::arena::{Arena, ArenaReport, Competitor};
use crate::config::{PitConfig, PlayerKind, TrainConfig};
use crate::coordinator::{CoordinatorSettings, CoordinatorSummary, SelfPlayCoordinator};
use crate::model::{FrequencyModel, FrequencyTrainer};
use crate::policy::Policy;
use crate::stats::CoachStats;
use crate::storage::ExampleStore;
use crate::workers::{effective_workers, progress_bar};
use anyhow::{Context, Result};
use engine_core::Game;
use games_mill::MillGame;
use mcts::Evaluator;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

/// Run the self-play / train / gate loop.
pub fn run_train(config: &TrainConfig, cancel: Arc<AtomicBool>) -> Result<CoordinatorSummary> {
    let rules = config.rules.to_rules()?;
    let game = MillGame::new(rules);
    let env_id = game.metadata().env_id;

    let db_path = config.replay_db_path();
    let store = ExampleStore::new(&db_path)
        .with_context(|| format!("failed to open example store {}", db_path.display()))?;
    if !config.resume {
        if let Some(last) = store.last_iteration()? {
            warn!(
                last_iteration = last,
                "Example store holds earlier iterations; pass --resume to continue from them"
            );
        }
    }
    info!(
        db = %db_path.display(),
        stored_examples = store.count_examples()?,
        "Example store ready"
    );

    let stats = Arc::new(CoachStats::new(config.stats_path(), &env_id));
    let mut coordinator = SelfPlayCoordinator::new(
        game,
        CoordinatorSettings::from_config(config),
        FrequencyTrainer::default(),
        Arc::clone(&stats),
        cancel,
    )
    .with_store(store)?;
    if config.resume {
        coordinator.resume()?;
    }

    let summary = coordinator.run()?;
    stats.write_stats();
    Ok(summary)
}

/// Play a match between two configured players and print the report.
pub fn run_pit(config: &PitConfig, cancel: Arc<AtomicBool>) -> Result<ArenaReport> {
    let rules = config.rules.to_rules()?;
    let game = MillGame::new(rules);

    let model_path = config.model_path();
    let model = if model_path.exists() {
        FrequencyModel::load(&model_path)?
    } else {
        info!(
            path = %model_path.display(),
            "No model snapshot found, search players use a uniform model"
        );
        FrequencyModel::uniform()
    };
    let evaluator: Arc<dyn Evaluator> = Arc::new(model);
    let search = config.search.evaluation_config();

    let workers = effective_workers(
        config.workers,
        config.has_human() || evaluator.device_bound(),
    );
    let arena = Arena::new(game, config.games, config.max_moves, config.seed).with_workers(workers);

    let progress = if config.has_human() {
        None
    } else {
        progress_bar(config.games as u64, "games")
    };
    let report = arena.run(
        |competitor, seed| {
            let kind = match competitor {
                Competitor::One => config.player_one,
                Competitor::Two => config.player_two,
            };
            Ok(match kind {
                PlayerKind::Mcts => {
                    Policy::search_backed(Arc::clone(&evaluator), search.clone(), seed)
                }
                PlayerKind::Greedy => Policy::heuristic(),
                PlayerKind::Random => Policy::random(seed),
                PlayerKind::Human => Policy::stdio(),
            })
        },
        &cancel,
        progress.as_ref(),
    )?;
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    println!(
        "{:?} (one) vs {:?} (two)",
        config.player_one, config.player_two
    );
    print!("{report}");
    if let Some(rate) = report.two_win_rate() {
        println!("two win rate over decided games: {:.3}", rate);
    }
    Ok(report)
}
