//! Centralized configuration loading from config.toml.
//!
//! This crate provides configuration structs and loading logic shared
//! across the Rust components (coach binary, benches, tests).
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`CARTRIDGE_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults
//!
//! Command-line flags of the coach take their defaults from the loaded
//! configuration, so they sit above all three.
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! CARTRIDGE_<SECTION>_<KEY>=value
//!
//! Examples:
//!     CARTRIDGE_COMMON_DATA_DIR=/data
//!     CARTRIDGE_SELFPLAY_WORKERS=8
//!     CARTRIDGE_ARENA_UPDATE_THRESHOLD=0.6
//!     CARTRIDGE_MCTS_NUM_SIMULATIONS=100
//!     CARTRIDGE_RULES_CURRICULUM=placing_only
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, find_config_path, load_config, load_from_path, CONFIG_SEARCH_PATHS,
};
pub use structs::*;

#[cfg(test)]
mod tests;
