//! MCTS benchmarks for performance profiling.
//!
//! Run with: `cargo bench -p mcts`
//!
//! These benchmarks measure:
//! - Full MCTS search with varying simulation counts
//! - Search from different game phases (opening, movement, capture)
//! - Tree operations (selection, policy extraction, re-rooting)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use engine_core::{Game, Player};
use games_mill::{Board, MillGame, Phase, Rules, POINT_COUNT};
use mcts::{MctsConfig, MctsSearch, UniformEvaluator};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn position(white: &[usize], black: &[usize], phase: Phase) -> Board {
    let mut cells = [0i8; POINT_COUNT];
    for &p in white {
        cells[p] = 1;
    }
    for &p in black {
        cells[p] = -1;
    }
    Board::from_position(Rules::default(), cells, Player::One, phase, [0, 0]).unwrap()
}

/// Search once from `board` with a fresh tree.
fn search_once(game: &MillGame, board: &Board, config: &MctsConfig) {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let mut search = MctsSearch::new(config.clone());
    black_box(
        search
            .run(game, &UniformEvaluator::new(), board, &mut rng)
            .unwrap(),
    );
}

// =============================================================================
// Full MCTS Search Benchmarks
// =============================================================================

fn bench_mcts_search_simulations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_search_simulations");
    let game = MillGame::default();
    let board = game.initial_state();

    for sims in [40, 100, 200, 400, 800] {
        group.throughput(Throughput::Elements(sims as u64));
        group.bench_with_input(BenchmarkId::new("opening", sims), &sims, |b, &sims| {
            let config = MctsConfig::for_testing().with_simulations(sims);
            b.iter(|| search_once(&game, &board, &config));
        });
    }

    group.finish();
}

fn bench_mcts_game_phases(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_game_phases");
    let game = MillGame::default();
    let config = MctsConfig::for_testing().with_simulations(200);

    let opening = game.initial_state();
    group.bench_function("placing", |b| {
        b.iter(|| search_once(&game, &opening, &config));
    });

    let moving = position(&[0, 3, 6, 15], &[23, 20, 17, 8], Phase::Moving);
    group.bench_function("moving", |b| {
        b.iter(|| search_once(&game, &moving, &config));
    });

    let flying = position(&[0, 9, 22, 6], &[1, 10, 19], Phase::Flying);
    group.bench_function("flying", |b| {
        b.iter(|| search_once(&game, &flying, &config));
    });

    group.finish();
}

// =============================================================================
// Tree Reuse Benchmarks
// =============================================================================

fn bench_tree_reuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_tree_reuse");
    let game = MillGame::default();
    let config = MctsConfig::for_testing().with_simulations(100);

    // Ten plies with the tree carried across moves
    group.bench_function("advance_10_plies", |b| {
        b.iter(|| {
            let mut rng = ChaCha20Rng::seed_from_u64(42);
            let mut search = MctsSearch::new(config.clone());
            let mut board = game.initial_state();
            for _ in 0..10 {
                let result = search
                    .run(&game, &UniformEvaluator::new(), &board, &mut rng)
                    .unwrap();
                board = game.apply(&board, result.action).unwrap();
                search.advance(result.action);
            }
            black_box(board)
        });
    });

    // Same plies, fresh tree every move
    group.bench_function("fresh_10_plies", |b| {
        b.iter(|| {
            let mut rng = ChaCha20Rng::seed_from_u64(42);
            let mut board = game.initial_state();
            for _ in 0..10 {
                let mut search = MctsSearch::new(config.clone());
                let result = search
                    .run(&game, &UniformEvaluator::new(), &board, &mut rng)
                    .unwrap();
                board = game.apply(&board, result.action).unwrap();
            }
            black_box(board)
        });
    });

    group.finish();
}

// =============================================================================
// Tree Operation Benchmarks
// =============================================================================

fn bench_tree_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_tree_ops");
    let game = MillGame::default();
    let board = game.initial_state();
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let mut search = MctsSearch::new(MctsConfig::for_testing().with_simulations(800));
    search
        .run(&game, &UniformEvaluator::new(), &board, &mut rng)
        .unwrap();
    let tree = search.tree().unwrap();

    group.bench_function("select_edge", |b| {
        b.iter(|| black_box(tree.select_edge(tree.root(), 1.5)));
    });

    group.bench_function("root_policy", |b| {
        b.iter(|| black_box(tree.root_policy(games_mill::NUM_ACTIONS, 1.0)));
    });

    group.bench_function("root_policy_temperature", |b| {
        b.iter(|| black_box(tree.root_policy(games_mill::NUM_ACTIONS, 0.5)));
    });

    group.bench_function("tree_stats", |b| {
        b.iter(|| black_box(tree.stats()));
    });

    group.finish();
}

// =============================================================================
// Configuration Comparison Benchmarks
// =============================================================================

fn bench_mcts_configs(c: &mut Criterion) {
    let mut group = c.benchmark_group("mcts_configs");
    let game = MillGame::default();
    let board = game.initial_state();
    let sims = 200u32;

    // Training config (with Dirichlet noise)
    let training = MctsConfig::for_training().with_simulations(sims);
    group.bench_function("training_config", |b| {
        b.iter(|| search_once(&game, &board, &training));
    });

    // Evaluation config (no noise, greedy)
    let evaluation = MctsConfig::for_evaluation().with_simulations(sims);
    group.bench_function("evaluation_config", |b| {
        b.iter(|| search_once(&game, &board, &evaluation));
    });

    for c_puct in [0.5, 1.5, 2.5, 4.0] {
        group.bench_with_input(BenchmarkId::new("c_puct", c_puct), &c_puct, |b, &c_puct| {
            let config = MctsConfig::for_testing()
                .with_simulations(sims)
                .with_c_puct(c_puct);
            b.iter(|| search_once(&game, &board, &config));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_mcts_search_simulations,
    bench_mcts_game_phases,
    bench_tree_reuse,
    bench_tree_operations,
    bench_mcts_configs,
);

criterion_main!(benches);
