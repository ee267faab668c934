//! Command-line configuration for the coach.
//!
//! Every flag defaults from the central config (config.toml plus
//! `CARTRIDGE_*` environment overrides), so the priority is
//! CLI > env > file > built-in defaults.

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use engine_config::{load_config, CentralConfig};
use games_mill::{BoardFullAction, Curriculum, Rules, StalemateAction};
use mcts::MctsConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_data_dir() -> String {
    CENTRAL_CONFIG.common.data_dir.clone()
}
fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}
fn default_iterations() -> u32 {
    CENTRAL_CONFIG.selfplay.iterations
}
fn default_episodes() -> u32 {
    CENTRAL_CONFIG.selfplay.episodes_per_iteration
}
fn default_workers() -> usize {
    CENTRAL_CONFIG.selfplay.workers
}
fn default_seed() -> u64 {
    CENTRAL_CONFIG.selfplay.seed
}
fn default_temp_threshold() -> u32 {
    CENTRAL_CONFIG.selfplay.temp_threshold
}
fn default_max_moves() -> u32 {
    CENTRAL_CONFIG.selfplay.max_moves
}
fn default_max_examples() -> usize {
    CENTRAL_CONFIG.selfplay.max_examples_per_iteration
}
fn default_history_iterations() -> usize {
    CENTRAL_CONFIG.selfplay.history_iterations
}
fn default_episode_retries() -> u32 {
    CENTRAL_CONFIG.selfplay.episode_retries
}
fn default_oracle_fraction() -> f64 {
    CENTRAL_CONFIG.selfplay.oracle_fraction
}
fn default_log_interval() -> u32 {
    CENTRAL_CONFIG.selfplay.log_interval
}
fn default_arena_games() -> u32 {
    CENTRAL_CONFIG.arena.games
}
fn default_update_threshold() -> f64 {
    CENTRAL_CONFIG.arena.update_threshold
}
fn default_arena_workers() -> usize {
    CENTRAL_CONFIG.arena.workers
}
fn default_arena_max_moves() -> u32 {
    CENTRAL_CONFIG.arena.max_moves
}
fn default_arena_seed() -> u64 {
    CENTRAL_CONFIG.arena.seed
}
fn default_num_simulations() -> u32 {
    CENTRAL_CONFIG.mcts.num_simulations
}
fn default_c_puct() -> f64 {
    CENTRAL_CONFIG.mcts.c_puct
}
fn default_temperature() -> f64 {
    CENTRAL_CONFIG.mcts.temperature
}
fn default_dirichlet_alpha() -> f64 {
    CENTRAL_CONFIG.mcts.dirichlet_alpha
}
fn default_dirichlet_epsilon() -> f64 {
    CENTRAL_CONFIG.mcts.dirichlet_epsilon
}
fn default_max_depth() -> u32 {
    CENTRAL_CONFIG.mcts.max_depth
}
fn default_flying_enabled() -> bool {
    CENTRAL_CONFIG.rules.flying_enabled
}
fn default_n_move_rule() -> u32 {
    CENTRAL_CONFIG.rules.n_move_rule
}
fn default_endgame_n_move_rule() -> u32 {
    CENTRAL_CONFIG.rules.endgame_n_move_rule
}
fn default_threefold() -> bool {
    CENTRAL_CONFIG.rules.threefold_repetition
}
fn default_draw_value() -> f64 {
    CENTRAL_CONFIG.rules.draw_value
}
fn default_draw_material_bias() -> f64 {
    CENTRAL_CONFIG.rules.draw_material_bias
}
fn default_board_full_action() -> String {
    CENTRAL_CONFIG.rules.board_full_action.clone()
}
fn default_stalemate_action() -> String {
    CENTRAL_CONFIG.rules.stalemate_action.clone()
}
fn default_curriculum() -> String {
    CENTRAL_CONFIG.rules.curriculum.clone()
}
fn default_curriculum_weight() -> f64 {
    CENTRAL_CONFIG.rules.curriculum_weight
}
fn default_replay_db() -> String {
    CENTRAL_CONFIG.storage.replay_db.clone()
}
fn default_model_file() -> String {
    CENTRAL_CONFIG.storage.model_file.clone()
}
fn default_stats_file() -> String {
    CENTRAL_CONFIG.storage.stats_file.clone()
}

#[derive(Parser, Debug, Clone)]
#[command(name = "coach")]
#[command(about = "Cartridge coach - self-play training and arena matches for mill")]
#[command(
    long_about = "Runs the self-play / train / gate loop for Nine Men's Morris, or pits two
players against each other in an arena.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the self-play coordinator loop
    Train(TrainConfig),
    /// Play an arena match between two players and print the report
    Pit(PitConfig),
}

impl Cli {
    pub fn log_level(&self) -> &str {
        match &self.command {
            Command::Train(c) => &c.log_level,
            Command::Pit(c) => &c.log_level,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.command {
            Command::Train(c) => c.validate(),
            Command::Pit(c) => c.validate(),
        }
    }
}

/// Search parameters shared by both subcommands.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct SearchArgs {
    /// Number of MCTS simulations per move
    #[arg(long, default_value_t = default_num_simulations())]
    pub num_simulations: u32,

    /// PUCT exploration constant
    #[arg(long, default_value_t = default_c_puct())]
    pub c_puct: f64,

    /// Self-play temperature before the temperature threshold
    #[arg(long, default_value_t = default_temperature())]
    pub temperature: f64,

    /// Dirichlet concentration for root noise (0 disables noise)
    #[arg(long, default_value_t = default_dirichlet_alpha())]
    pub dirichlet_alpha: f64,

    /// Weight of root noise in the mixed prior
    #[arg(long, default_value_t = default_dirichlet_epsilon())]
    pub dirichlet_epsilon: f64,

    /// Maximum descent depth per simulation
    #[arg(long, default_value_t = default_max_depth())]
    pub max_depth: u32,
}

impl SearchArgs {
    /// Self-play search: root noise on.
    pub fn training_config(&self) -> MctsConfig {
        MctsConfig::for_training()
            .with_simulations(self.num_simulations)
            .with_c_puct(self.c_puct as f32)
            .with_temperature(self.temperature as f32)
            .with_noise(self.dirichlet_alpha as f32, self.dirichlet_epsilon as f32)
            .with_max_depth(self.max_depth)
    }

    /// Arena search: no noise, greedy move choice.
    pub fn evaluation_config(&self) -> MctsConfig {
        MctsConfig::for_evaluation()
            .with_simulations(self.num_simulations)
            .with_c_puct(self.c_puct as f32)
            .with_max_depth(self.max_depth)
    }

    fn validate(&self) -> Result<()> {
        if self.num_simulations == 0 {
            return Err(anyhow!("num_simulations must be greater than 0"));
        }
        if self.c_puct <= 0.0 {
            return Err(anyhow!("c_puct must be positive, got {}", self.c_puct));
        }
        if self.temperature < 0.0 {
            return Err(anyhow!("temperature cannot be negative"));
        }
        if self.dirichlet_alpha < 0.0 {
            return Err(anyhow!("dirichlet_alpha cannot be negative"));
        }
        if !(0.0..=1.0).contains(&self.dirichlet_epsilon) {
            return Err(anyhow!(
                "dirichlet_epsilon must be within [0, 1], got {}",
                self.dirichlet_epsilon
            ));
        }
        if self.max_depth == 0 {
            return Err(anyhow!("max_depth must be greater than 0"));
        }
        Ok(())
    }
}

/// Rule set flags shared by both subcommands.
#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct RuleArgs {
    /// Allow flying with three pieces left
    #[arg(long, default_value_t = default_flying_enabled(), action = clap::ArgAction::Set)]
    pub flying_enabled: bool,

    /// Relocations without placement or removal before a draw
    #[arg(long, default_value_t = default_n_move_rule())]
    pub n_move_rule: u32,

    /// Shorter move limit once a side is down to three pieces
    #[arg(long, default_value_t = default_endgame_n_move_rule())]
    pub endgame_n_move_rule: u32,

    /// Draw on the third occurrence of a position
    #[arg(long, default_value_t = default_threefold(), action = clap::ArgAction::Set)]
    pub threefold_repetition: bool,

    /// Base value of a drawn game
    #[arg(long, default_value_t = default_draw_value())]
    pub draw_value: f64,

    /// Per-piece material adjustment of the draw value
    #[arg(long, default_value_t = default_draw_material_bias())]
    pub draw_material_bias: f64,

    /// Full board outcome: draw or first_player_loses
    #[arg(long, default_value_t = default_board_full_action())]
    pub board_full_action: String,

    /// Blocked side outcome: loss or draw
    #[arg(long, default_value_t = default_stalemate_action())]
    pub stalemate_action: String,

    /// Curriculum stage: full, placing_only or no_flying
    #[arg(long, default_value_t = default_curriculum())]
    pub curriculum: String,

    /// Material weight of the placing_only heuristic score
    #[arg(long, default_value_t = default_curriculum_weight())]
    pub curriculum_weight: f64,
}

impl RuleArgs {
    /// Build the rule set, rejecting unknown variant names.
    pub fn to_rules(&self) -> Result<Rules> {
        let board_full_action = match self.board_full_action.as_str() {
            "draw" => BoardFullAction::Draw,
            "first_player_loses" => BoardFullAction::FirstPlayerLoses,
            other => {
                return Err(anyhow!(
                    "invalid board_full_action '{}', expected draw or first_player_loses",
                    other
                ))
            }
        };
        let stalemate_action = match self.stalemate_action.as_str() {
            "loss" => StalemateAction::Loss,
            "draw" => StalemateAction::Draw,
            other => {
                return Err(anyhow!(
                    "invalid stalemate_action '{}', expected loss or draw",
                    other
                ))
            }
        };
        let curriculum = match self.curriculum.as_str() {
            "full" => Curriculum::FullRules,
            "placing_only" => Curriculum::PlacingOnly {
                weight: self.curriculum_weight as f32,
            },
            "no_flying" => Curriculum::NoFlying,
            other => {
                return Err(anyhow!(
                    "invalid curriculum '{}', expected full, placing_only or no_flying",
                    other
                ))
            }
        };

        Ok(Rules {
            flying_enabled: self.flying_enabled,
            n_move_rule: self.n_move_rule,
            endgame_n_move_rule: self.endgame_n_move_rule,
            threefold_repetition: self.threefold_repetition,
            draw_value: self.draw_value as f32,
            draw_material_bias: self.draw_material_bias as f32,
            board_full_action,
            stalemate_action,
            curriculum,
            ..Rules::default()
        })
    }

    fn validate(&self) -> Result<()> {
        if self.n_move_rule == 0 {
            return Err(anyhow!("n_move_rule must be greater than 0"));
        }
        if self.endgame_n_move_rule == 0 {
            return Err(anyhow!("endgame_n_move_rule must be greater than 0"));
        }
        if !(-1.0..=1.0).contains(&self.draw_value) {
            return Err(anyhow!("draw_value must be within [-1, 1]"));
        }
        self.to_rules().map(|_| ())
    }
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Data directory for the example store, models and stats
    #[arg(long, default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Coordinator iterations to run
    #[arg(long, default_value_t = default_iterations())]
    pub iterations: u32,

    /// Self-play episodes per iteration
    #[arg(long = "episodes", default_value_t = default_episodes())]
    pub episodes_per_iteration: u32,

    /// Self-play worker threads
    #[arg(long, default_value_t = default_workers())]
    pub workers: usize,

    /// Run seed; every episode and arena game seed derives from it
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    /// Plies played at the search temperature before switching to greedy
    #[arg(long, default_value_t = default_temp_threshold())]
    pub temp_threshold: u32,

    /// Hard per-episode move cap
    #[arg(long, default_value_t = default_max_moves())]
    pub max_moves: u32,

    /// Most recent examples kept from one iteration
    #[arg(long, default_value_t = default_max_examples())]
    pub max_examples_per_iteration: usize,

    /// Iterations of examples kept for training
    #[arg(long, default_value_t = default_history_iterations())]
    pub history_iterations: usize,

    /// Fresh attempts for an episode whose evaluator failed
    #[arg(long, default_value_t = default_episode_retries())]
    pub episode_retries: u32,

    /// Fraction of positions that also get an oracle label when an oracle is attached
    #[arg(long, default_value_t = default_oracle_fraction())]
    pub oracle_fraction: f64,

    /// Log progress every N episodes (0 to disable)
    #[arg(long, default_value_t = default_log_interval())]
    pub log_interval: u32,

    /// Arena games per gating round
    #[arg(long, default_value_t = default_arena_games())]
    pub arena_games: u32,

    /// Arena worker threads
    #[arg(long, default_value_t = default_arena_workers())]
    pub arena_workers: usize,

    /// Hard per-game move cap in the arena
    #[arg(long, default_value_t = default_arena_max_moves())]
    pub arena_max_moves: u32,

    /// Arena seed
    #[arg(long, default_value_t = default_arena_seed())]
    pub arena_seed: u64,

    /// Win rate the new snapshot needs to be accepted
    #[arg(long, default_value_t = default_update_threshold())]
    pub update_threshold: f64,

    /// Reload the example history and best model from the data directory
    #[arg(long)]
    pub resume: bool,

    /// Example store path, relative to the data directory
    #[arg(long, default_value_t = default_replay_db())]
    pub replay_db: String,

    /// Accepted model path, relative to the data directory
    #[arg(long, default_value_t = default_model_file())]
    pub model_file: String,

    /// Stats snapshot path, relative to the data directory
    #[arg(long, default_value_t = default_stats_file())]
    pub stats_file: String,

    #[command(flatten)]
    pub search: SearchArgs,

    #[command(flatten)]
    pub rules: RuleArgs,
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.log_level)?;

        if self.data_dir.is_empty() {
            return Err(anyhow!("data_dir cannot be empty"));
        }
        if self.iterations == 0 {
            return Err(anyhow!("iterations must be greater than 0"));
        }
        if self.episodes_per_iteration == 0 {
            return Err(anyhow!("episodes must be greater than 0"));
        }
        if self.workers == 0 {
            return Err(anyhow!("workers must be greater than 0"));
        }
        if self.max_moves == 0 {
            return Err(anyhow!("max_moves must be greater than 0"));
        }
        if self.max_examples_per_iteration == 0 {
            return Err(anyhow!("max_examples_per_iteration must be greater than 0"));
        }
        if self.history_iterations == 0 {
            return Err(anyhow!("history_iterations must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.oracle_fraction) {
            return Err(anyhow!(
                "oracle_fraction must be within [0, 1], got {}",
                self.oracle_fraction
            ));
        }
        if self.arena_games == 0 {
            return Err(anyhow!("arena_games must be greater than 0"));
        }
        if self.arena_workers == 0 {
            return Err(anyhow!("arena_workers must be greater than 0"));
        }
        if self.arena_max_moves == 0 {
            return Err(anyhow!("arena_max_moves must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.update_threshold) {
            return Err(anyhow!(
                "update_threshold must be within [0, 1], got {}",
                self.update_threshold
            ));
        }

        self.search.validate()?;
        self.rules.validate()
    }

    pub fn replay_db_path(&self) -> PathBuf {
        data_path(&self.data_dir, &self.replay_db)
    }

    pub fn model_path(&self) -> PathBuf {
        data_path(&self.data_dir, &self.model_file)
    }

    pub fn stats_path(&self) -> PathBuf {
        data_path(&self.data_dir, &self.stats_file)
    }
}

/// Kinds of player selectable from the command line.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerKind {
    /// Search guided by the stored model (uniform priors when none exists)
    Mcts,
    /// One-ply material greedy
    Greedy,
    /// Uniform over legal moves
    Random,
    /// Moves typed on stdin
    Human,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct PitConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    /// Data directory holding the accepted model
    #[arg(long, default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Player one of the report (moves first in the first half)
    #[arg(long, value_enum, default_value_t = PlayerKind::Mcts)]
    pub player_one: PlayerKind,

    /// Player two of the report (moves first in the second half)
    #[arg(long, value_enum, default_value_t = PlayerKind::Greedy)]
    pub player_two: PlayerKind,

    /// Games to play
    #[arg(long, default_value_t = default_arena_games())]
    pub games: u32,

    /// Worker threads (forced to 1 with a human player)
    #[arg(long, default_value_t = default_arena_workers())]
    pub workers: usize,

    /// Hard per-game move cap
    #[arg(long, default_value_t = default_arena_max_moves())]
    pub max_moves: u32,

    /// Arena seed
    #[arg(long, default_value_t = default_arena_seed())]
    pub seed: u64,

    /// Model snapshot for mcts players, relative to the data directory
    #[arg(long, default_value_t = default_model_file())]
    pub model_file: String,

    #[command(flatten)]
    pub search: SearchArgs,

    #[command(flatten)]
    pub rules: RuleArgs,
}

impl PitConfig {
    pub fn validate(&self) -> Result<()> {
        validate_log_level(&self.log_level)?;

        if self.games == 0 {
            return Err(anyhow!("games must be greater than 0"));
        }
        if self.workers == 0 {
            return Err(anyhow!("workers must be greater than 0"));
        }
        if self.max_moves == 0 {
            return Err(anyhow!("max_moves must be greater than 0"));
        }

        self.search.validate()?;
        self.rules.validate()
    }

    pub fn has_human(&self) -> bool {
        self.player_one == PlayerKind::Human || self.player_two == PlayerKind::Human
    }

    pub fn model_path(&self) -> PathBuf {
        data_path(&self.data_dir, &self.model_file)
    }
}

fn validate_log_level(level: &str) -> Result<()> {
    if level.parse::<LevelFilter>().is_err() {
        return Err(anyhow!(
            "invalid log level '{}', expected one of trace, debug, info, warn, error",
            level
        ));
    }
    Ok(())
}

/// Resolve a storage path against the data directory. Absolute paths are
/// kept as given.
fn data_path(data_dir: &str, relative: &str) -> PathBuf {
    let path = Path::new(relative);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        Path::new(data_dir).join(path)
    }
}
