//! Tests for the configuration module.

use super::*;
use std::io::Write;

#[test]
fn test_default_config() {
    let config = CentralConfig::default();
    assert_eq!(config.common.env_id, "mill");
    assert_eq!(config.common.data_dir, "./data");
    assert_eq!(config.common.log_level, "info");
    assert_eq!(config.selfplay.workers, 4);
    assert_eq!(config.arena.games, 40);
    assert_eq!(config.mcts.num_simulations, 40);
}

#[test]
fn test_selfplay_defaults() {
    let config = CentralConfig::default();
    assert_eq!(config.selfplay.iterations, 100);
    assert_eq!(config.selfplay.episodes_per_iteration, 50);
    assert_eq!(config.selfplay.seed, 42);
    assert_eq!(config.selfplay.temp_threshold, 15);
    assert_eq!(config.selfplay.max_moves, 300);
    assert_eq!(config.selfplay.max_examples_per_iteration, 200_000);
    assert_eq!(config.selfplay.history_iterations, 20);
    assert_eq!(config.selfplay.episode_retries, 3);
    assert_eq!(config.selfplay.log_interval, 10);
}

#[test]
fn test_arena_defaults() {
    let config = CentralConfig::default();
    assert!((config.arena.update_threshold - 0.55).abs() < f64::EPSILON);
    assert_eq!(config.arena.workers, 4);
    assert_eq!(config.arena.max_moves, 300);
}

#[test]
fn test_mcts_defaults() {
    let config = CentralConfig::default();
    assert!((config.mcts.c_puct - 1.5).abs() < f64::EPSILON);
    assert!((config.mcts.temperature - 1.0).abs() < f64::EPSILON);
    assert!((config.mcts.dirichlet_alpha - 0.3).abs() < f64::EPSILON);
    assert!((config.mcts.dirichlet_epsilon - 0.25).abs() < f64::EPSILON);
    assert_eq!(config.mcts.max_depth, 512);
}

#[test]
fn test_rules_defaults() {
    let config = CentralConfig::default();
    assert!(config.rules.flying_enabled);
    assert!(config.rules.threefold_repetition);
    assert_eq!(config.rules.n_move_rule, 100);
    assert_eq!(config.rules.endgame_n_move_rule, 100);
    assert!((config.rules.draw_value - 0.0001).abs() < f64::EPSILON);
    assert!((config.rules.draw_material_bias - 0.03).abs() < f64::EPSILON);
    assert_eq!(config.rules.curriculum, "full");
}

#[test]
fn test_cartridge_env_overrides() {
    std::env::set_var("CARTRIDGE_SELFPLAY_WORKERS", "9");
    std::env::set_var("CARTRIDGE_ARENA_UPDATE_THRESHOLD", "0.6");
    std::env::set_var("CARTRIDGE_RULES_CURRICULUM", "placing_only");

    let config = load_config();
    assert_eq!(config.selfplay.workers, 9);
    assert!((config.arena.update_threshold - 0.6).abs() < f64::EPSILON);
    assert_eq!(config.rules.curriculum, "placing_only");

    std::env::remove_var("CARTRIDGE_SELFPLAY_WORKERS");
    std::env::remove_var("CARTRIDGE_ARENA_UPDATE_THRESHOLD");
    std::env::remove_var("CARTRIDGE_RULES_CURRICULUM");
}

#[test]
fn test_unparseable_env_override_is_ignored() {
    std::env::set_var("CARTRIDGE_MCTS_MAX_DEPTH", "deep");
    let config = apply_env_overrides(CentralConfig::default());
    assert_eq!(config.mcts.max_depth, 512);
    std::env::remove_var("CARTRIDGE_MCTS_MAX_DEPTH");
}

#[test]
fn test_parse_config_toml() {
    let toml_content = r#"
[common]
data_dir = "/custom/data"

[selfplay]
iterations = 5
episodes_per_iteration = 8
temp_threshold = 20

[arena]
games = 10

[rules]
flying_enabled = false
stalemate_action = "draw"
"#;
    let config: CentralConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.common.data_dir, "/custom/data");
    assert_eq!(config.selfplay.iterations, 5);
    assert_eq!(config.selfplay.episodes_per_iteration, 8);
    assert_eq!(config.selfplay.temp_threshold, 20);
    assert_eq!(config.arena.games, 10);
    assert!(!config.rules.flying_enabled);
    assert_eq!(config.rules.stalemate_action, "draw");
}

#[test]
fn test_partial_config() {
    let toml_content = r#"
[mcts]
num_simulations = 200
"#;
    let config: CentralConfig = toml::from_str(toml_content).unwrap();
    assert_eq!(config.mcts.num_simulations, 200);
    assert!((config.mcts.c_puct - 1.5).abs() < f64::EPSILON); // Default
    assert_eq!(config.common.data_dir, "./data"); // Default
    assert_eq!(config.arena.games, 40); // Default
}

#[test]
fn test_load_from_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[arena]\ngames = 12\nseed = 99").unwrap();

    let config = load_from_path(file.path());
    assert_eq!(config.arena.games, 12);
    assert_eq!(config.arena.seed, 99);
}

#[test]
fn test_load_from_bad_path_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_from_path(&dir.path().join("missing.toml"));
    assert_eq!(config.arena.games, 40);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[arena\ngames = ").unwrap();
    let config = load_from_path(file.path());
    assert_eq!(config.arena.games, 40);
}

#[test]
fn test_explicit_config_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[arena]\ngames = 6").unwrap();

    std::env::set_var("CARTRIDGE_CONFIG", file.path());
    let found = find_config_path();
    let config = load_config();
    std::env::remove_var("CARTRIDGE_CONFIG");

    assert_eq!(found.as_deref(), Some(file.path()));
    assert_eq!(config.arena.games, 6);
}

#[test]
fn test_storage_paths() {
    let mut config = CentralConfig::default();
    config.common.data_dir = "/srv/mill".into();
    assert_eq!(
        config.replay_db_path(),
        std::path::PathBuf::from("/srv/mill/replay.db")
    );
    assert_eq!(
        config.model_path(),
        std::path::PathBuf::from("/srv/mill/models/best.json")
    );

    config.storage.stats_file = "/tmp/stats.json".into();
    assert_eq!(
        config.stats_path(),
        std::path::PathBuf::from("/tmp/stats.json")
    );
}

#[test]
fn test_config_clone() {
    let config = CentralConfig::default();
    let cloned = config.clone();
    assert_eq!(config.common.env_id, cloned.common.env_id);
    assert_eq!(config.selfplay.seed, cloned.selfplay.seed);
}
