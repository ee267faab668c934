//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",      // Current directory
    "../config.toml",   // Parent directory (when running from subdirectory)
    "/app/config.toml", // Docker container
];

/// Locate the config file: `CARTRIDGE_CONFIG` first, then
/// [`CONFIG_SEARCH_PATHS`] in order.
pub fn find_config_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("CARTRIDGE_CONFIG") {
        let path = PathBuf::from(&explicit);
        if path.is_file() {
            return Some(path);
        }
        warn!(path = %explicit, "CARTRIDGE_CONFIG does not point to a file, searching defaults");
    }
    CONFIG_SEARCH_PATHS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Load the central configuration.
///
/// Uses the file found by [`find_config_path`], or the embedded defaults
/// when there is none, then applies environment overrides.
pub fn load_config() -> CentralConfig {
    match find_config_path() {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            load_from_path(&path)
        }
        None => {
            debug!("No config.toml found, using built-in defaults");
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Load configuration from a specific path. Unreadable or malformed files
/// fall back to the defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| toml::from_str::<CentralConfig>(&content).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => apply_env_overrides(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unusable config file, using defaults");
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (i32, u64, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: CARTRIDGE_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.env_id, "CARTRIDGE_COMMON_ENV_ID");
    env_override!(config, common.data_dir, "CARTRIDGE_COMMON_DATA_DIR");
    env_override!(config, common.log_level, "CARTRIDGE_COMMON_LOG_LEVEL");

    // Self-play
    env_override!(
        config,
        selfplay.iterations,
        "CARTRIDGE_SELFPLAY_ITERATIONS",
        parse
    );
    env_override!(
        config,
        selfplay.episodes_per_iteration,
        "CARTRIDGE_SELFPLAY_EPISODES_PER_ITERATION",
        parse
    );
    env_override!(
        config,
        selfplay.workers,
        "CARTRIDGE_SELFPLAY_WORKERS",
        parse
    );
    env_override!(config, selfplay.seed, "CARTRIDGE_SELFPLAY_SEED", parse);
    env_override!(
        config,
        selfplay.temp_threshold,
        "CARTRIDGE_SELFPLAY_TEMP_THRESHOLD",
        parse
    );
    env_override!(
        config,
        selfplay.max_moves,
        "CARTRIDGE_SELFPLAY_MAX_MOVES",
        parse
    );
    env_override!(
        config,
        selfplay.max_examples_per_iteration,
        "CARTRIDGE_SELFPLAY_MAX_EXAMPLES_PER_ITERATION",
        parse
    );
    env_override!(
        config,
        selfplay.history_iterations,
        "CARTRIDGE_SELFPLAY_HISTORY_ITERATIONS",
        parse
    );
    env_override!(
        config,
        selfplay.episode_retries,
        "CARTRIDGE_SELFPLAY_EPISODE_RETRIES",
        parse
    );
    env_override!(
        config,
        selfplay.oracle_fraction,
        "CARTRIDGE_SELFPLAY_ORACLE_FRACTION",
        parse
    );
    env_override!(
        config,
        selfplay.log_interval,
        "CARTRIDGE_SELFPLAY_LOG_INTERVAL",
        parse
    );

    // Arena
    env_override!(config, arena.games, "CARTRIDGE_ARENA_GAMES", parse);
    env_override!(
        config,
        arena.update_threshold,
        "CARTRIDGE_ARENA_UPDATE_THRESHOLD",
        parse
    );
    env_override!(config, arena.workers, "CARTRIDGE_ARENA_WORKERS", parse);
    env_override!(
        config,
        arena.max_moves,
        "CARTRIDGE_ARENA_MAX_MOVES",
        parse
    );
    env_override!(config, arena.seed, "CARTRIDGE_ARENA_SEED", parse);

    // MCTS
    env_override!(
        config,
        mcts.num_simulations,
        "CARTRIDGE_MCTS_NUM_SIMULATIONS",
        parse
    );
    env_override!(config, mcts.c_puct, "CARTRIDGE_MCTS_C_PUCT", parse);
    env_override!(
        config,
        mcts.temperature,
        "CARTRIDGE_MCTS_TEMPERATURE",
        parse
    );
    env_override!(
        config,
        mcts.dirichlet_alpha,
        "CARTRIDGE_MCTS_DIRICHLET_ALPHA",
        parse
    );
    env_override!(
        config,
        mcts.dirichlet_epsilon,
        "CARTRIDGE_MCTS_DIRICHLET_EPSILON",
        parse
    );
    env_override!(config, mcts.max_depth, "CARTRIDGE_MCTS_MAX_DEPTH", parse);

    // Rules
    env_override!(
        config,
        rules.flying_enabled,
        "CARTRIDGE_RULES_FLYING_ENABLED",
        parse
    );
    env_override!(
        config,
        rules.n_move_rule,
        "CARTRIDGE_RULES_N_MOVE_RULE",
        parse
    );
    env_override!(
        config,
        rules.endgame_n_move_rule,
        "CARTRIDGE_RULES_ENDGAME_N_MOVE_RULE",
        parse
    );
    env_override!(
        config,
        rules.threefold_repetition,
        "CARTRIDGE_RULES_THREEFOLD_REPETITION",
        parse
    );
    env_override!(
        config,
        rules.draw_value,
        "CARTRIDGE_RULES_DRAW_VALUE",
        parse
    );
    env_override!(
        config,
        rules.draw_material_bias,
        "CARTRIDGE_RULES_DRAW_MATERIAL_BIAS",
        parse
    );
    env_override!(
        config,
        rules.board_full_action,
        "CARTRIDGE_RULES_BOARD_FULL_ACTION"
    );
    env_override!(
        config,
        rules.stalemate_action,
        "CARTRIDGE_RULES_STALEMATE_ACTION"
    );
    env_override!(config, rules.curriculum, "CARTRIDGE_RULES_CURRICULUM");
    env_override!(
        config,
        rules.curriculum_weight,
        "CARTRIDGE_RULES_CURRICULUM_WEIGHT",
        parse
    );

    // Storage
    env_override!(config, storage.replay_db, "CARTRIDGE_STORAGE_REPLAY_DB");
    env_override!(config, storage.model_file, "CARTRIDGE_STORAGE_MODEL_FILE");
    env_override!(config, storage.stats_file, "CARTRIDGE_STORAGE_STATS_FILE");

    config
}
