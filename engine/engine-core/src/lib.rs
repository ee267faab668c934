//! Core traits and types for the Cartridge game engine
//!
//! This crate provides the fundamental abstractions shared by games and search:
//! - `Game`: Typed trait for rule engines consumed by the search
//! - `Player`: Two-sided turn marker with perspective helpers
//! - `ActionMask`: Fixed-width legality bitset over a discrete action space
//! - `GameMetadata`: Display and configuration metadata for consumers

pub mod action_mask;
pub mod game_utils;
pub mod metadata;
pub mod typed;

// Re-export main types for convenience
pub use action_mask::ActionMask;
pub use metadata::GameMetadata;
pub use typed::{Capabilities, EngineId, Game, GameError, Player};
