//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;
use std::path::{Path, PathBuf};

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_env_id() -> String {
    defaults::env_id().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_iterations() -> u32 {
    defaults::iterations()
}
fn d_episodes() -> u32 {
    defaults::episodes_per_iteration()
}
fn d_selfplay_workers() -> usize {
    defaults::selfplay_workers()
}
fn d_selfplay_seed() -> u64 {
    defaults::selfplay_seed()
}
fn d_temp_threshold() -> u32 {
    defaults::temp_threshold()
}
fn d_selfplay_max_moves() -> u32 {
    defaults::selfplay_max_moves()
}
fn d_max_examples() -> usize {
    defaults::max_examples_per_iteration()
}
fn d_history() -> usize {
    defaults::history_iterations()
}
fn d_retries() -> u32 {
    defaults::episode_retries()
}
fn d_oracle_fraction() -> f64 {
    defaults::oracle_fraction()
}
fn d_log_interval() -> u32 {
    defaults::log_interval()
}
fn d_arena_games() -> u32 {
    defaults::arena_games()
}
fn d_update_threshold() -> f64 {
    defaults::update_threshold()
}
fn d_arena_workers() -> usize {
    defaults::arena_workers()
}
fn d_arena_max_moves() -> u32 {
    defaults::arena_max_moves()
}
fn d_arena_seed() -> u64 {
    defaults::arena_seed()
}
fn d_num_sims() -> u32 {
    defaults::num_simulations()
}
fn d_c_puct() -> f64 {
    defaults::c_puct()
}
fn d_temperature() -> f64 {
    defaults::temperature()
}
fn d_dirichlet_alpha() -> f64 {
    defaults::dirichlet_alpha()
}
fn d_dirichlet_epsilon() -> f64 {
    defaults::dirichlet_epsilon()
}
fn d_max_depth() -> u32 {
    defaults::max_depth()
}
fn d_flying() -> bool {
    defaults::flying_enabled()
}
fn d_n_move() -> u32 {
    defaults::n_move_rule()
}
fn d_endgame_n_move() -> u32 {
    defaults::endgame_n_move_rule()
}
fn d_threefold() -> bool {
    defaults::threefold_repetition()
}
fn d_draw_value() -> f64 {
    defaults::draw_value()
}
fn d_draw_bias() -> f64 {
    defaults::draw_material_bias()
}
fn d_board_full() -> String {
    defaults::board_full_action().into()
}
fn d_stalemate() -> String {
    defaults::stalemate_action().into()
}
fn d_curriculum() -> String {
    defaults::curriculum().into()
}
fn d_curriculum_weight() -> f64 {
    defaults::curriculum_weight()
}
fn d_replay_db() -> String {
    defaults::replay_db().into()
}
fn d_model_file() -> String {
    defaults::model_file().into()
}
fn d_stats_file() -> String {
    defaults::stats_file().into()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub selfplay: SelfPlayConfig,
    #[serde(default)]
    pub arena: ArenaConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_env_id")]
    pub env_id: String,
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir().into(),
            env_id: defaults::env_id().into(),
            log_level: defaults::log_level().into(),
        }
    }
}

/// Self-play and training loop configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelfPlayConfig {
    #[serde(default = "d_iterations")]
    pub iterations: u32,
    #[serde(default = "d_episodes")]
    pub episodes_per_iteration: u32,
    #[serde(default = "d_selfplay_workers")]
    pub workers: usize,
    #[serde(default = "d_selfplay_seed")]
    pub seed: u64,
    /// Plies sampled at temperature 1 before greedy play
    #[serde(default = "d_temp_threshold")]
    pub temp_threshold: u32,
    #[serde(default = "d_selfplay_max_moves")]
    pub max_moves: u32,
    #[serde(default = "d_max_examples")]
    pub max_examples_per_iteration: usize,
    #[serde(default = "d_history")]
    pub history_iterations: usize,
    #[serde(default = "d_retries")]
    pub episode_retries: u32,
    #[serde(default = "d_oracle_fraction")]
    pub oracle_fraction: f64,
    #[serde(default = "d_log_interval")]
    pub log_interval: u32,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            iterations: defaults::iterations(),
            episodes_per_iteration: defaults::episodes_per_iteration(),
            workers: defaults::selfplay_workers(),
            seed: defaults::selfplay_seed(),
            temp_threshold: defaults::temp_threshold(),
            max_moves: defaults::selfplay_max_moves(),
            max_examples_per_iteration: defaults::max_examples_per_iteration(),
            history_iterations: defaults::history_iterations(),
            episode_retries: defaults::episode_retries(),
            oracle_fraction: defaults::oracle_fraction(),
            log_interval: defaults::log_interval(),
        }
    }
}

/// Arena (model gating) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ArenaConfig {
    #[serde(default = "d_arena_games")]
    pub games: u32,
    #[serde(default = "d_update_threshold")]
    pub update_threshold: f64,
    #[serde(default = "d_arena_workers")]
    pub workers: usize,
    #[serde(default = "d_arena_max_moves")]
    pub max_moves: u32,
    #[serde(default = "d_arena_seed")]
    pub seed: u64,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            games: defaults::arena_games(),
            update_threshold: defaults::update_threshold(),
            workers: defaults::arena_workers(),
            max_moves: defaults::arena_max_moves(),
            seed: defaults::arena_seed(),
        }
    }
}

/// MCTS (Monte Carlo Tree Search) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MctsConfig {
    #[serde(default = "d_num_sims")]
    pub num_simulations: u32,
    #[serde(default = "d_c_puct")]
    pub c_puct: f64,
    #[serde(default = "d_temperature")]
    pub temperature: f64,
    #[serde(default = "d_dirichlet_alpha")]
    pub dirichlet_alpha: f64,
    #[serde(default = "d_dirichlet_epsilon")]
    pub dirichlet_epsilon: f64,
    #[serde(default = "d_max_depth")]
    pub max_depth: u32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: defaults::num_simulations(),
            c_puct: defaults::c_puct(),
            temperature: defaults::temperature(),
            dirichlet_alpha: defaults::dirichlet_alpha(),
            dirichlet_epsilon: defaults::dirichlet_epsilon(),
            max_depth: defaults::max_depth(),
        }
    }
}

/// Game rule variants. Enumerations are kept as strings here and parsed
/// by the consumer, which owns the rule types.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RulesConfig {
    #[serde(default = "d_flying")]
    pub flying_enabled: bool,
    #[serde(default = "d_n_move")]
    pub n_move_rule: u32,
    #[serde(default = "d_endgame_n_move")]
    pub endgame_n_move_rule: u32,
    #[serde(default = "d_threefold")]
    pub threefold_repetition: bool,
    #[serde(default = "d_draw_value")]
    pub draw_value: f64,
    #[serde(default = "d_draw_bias")]
    pub draw_material_bias: f64,
    /// "draw" or "first_player_loses"
    #[serde(default = "d_board_full")]
    pub board_full_action: String,
    /// "loss" or "draw"
    #[serde(default = "d_stalemate")]
    pub stalemate_action: String,
    /// "full", "placing_only" or "no_flying"
    #[serde(default = "d_curriculum")]
    pub curriculum: String,
    #[serde(default = "d_curriculum_weight")]
    pub curriculum_weight: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            flying_enabled: defaults::flying_enabled(),
            n_move_rule: defaults::n_move_rule(),
            endgame_n_move_rule: defaults::endgame_n_move_rule(),
            threefold_repetition: defaults::threefold_repetition(),
            draw_value: defaults::draw_value(),
            draw_material_bias: defaults::draw_material_bias(),
            board_full_action: defaults::board_full_action().into(),
            stalemate_action: defaults::stalemate_action().into(),
            curriculum: defaults::curriculum().into(),
            curriculum_weight: defaults::curriculum_weight(),
        }
    }
}

/// File locations, relative to `common.data_dir` unless absolute
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(default = "d_replay_db")]
    pub replay_db: String,
    #[serde(default = "d_model_file")]
    pub model_file: String,
    #[serde(default = "d_stats_file")]
    pub stats_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            replay_db: defaults::replay_db().into(),
            model_file: defaults::model_file().into(),
            stats_file: defaults::stats_file().into(),
        }
    }
}

impl CentralConfig {
    /// Resolve a storage path against the data directory.
    pub fn data_path(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new(&self.common.data_dir).join(path)
        }
    }

    pub fn replay_db_path(&self) -> PathBuf {
        self.data_path(&self.storage.replay_db)
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_path(&self.storage.model_file)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_path(&self.storage.stats_file)
    }
}
