//! Game metadata for display and configuration
//!
//! This module provides display-oriented metadata about games that the coach
//! records alongside stored training examples so a store can be read back
//! without access to the rule engine.

use serde::{Deserialize, Serialize};

/// Metadata about a game for display and configuration
///
/// This struct contains all the information needed to:
/// - Display the game (board dimensions, player symbols)
/// - Configure evaluators and trainers (obs_size, num_actions)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    /// Environment identifier (e.g., "mill")
    pub env_id: String,

    /// Human-readable display name
    pub display_name: String,

    /// Board width in cells
    pub board_width: usize,

    /// Board height in cells
    pub board_height: usize,

    /// Number of cells that can actually hold a piece
    pub playable_points: usize,

    /// Number of possible actions
    pub num_actions: usize,

    /// Size of observation vector (number of f32 values)
    pub obs_size: usize,

    /// Number of players (typically 2)
    pub player_count: usize,

    /// Display names for each player (e.g., ["White", "Black"])
    pub player_names: Vec<String>,

    /// Single-character symbols for each player (e.g., ['W', 'B'])
    pub player_symbols: Vec<char>,

    /// Brief description of the game rules
    pub description: String,
}

impl GameMetadata {
    /// Create a new GameMetadata with required fields
    pub fn new(env_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            env_id: env_id.into(),
            display_name: display_name.into(),
            board_width: 0,
            board_height: 0,
            playable_points: 0,
            num_actions: 0,
            obs_size: 0,
            player_count: 2,
            player_names: vec!["Player 1".to_string(), "Player 2".to_string()],
            player_symbols: vec!['1', '2'],
            description: String::new(),
        }
    }

    /// Builder method for board dimensions
    ///
    /// Playable points default to every cell; sparse boards override them with
    /// [`GameMetadata::with_playable_points`].
    pub fn with_board(mut self, width: usize, height: usize) -> Self {
        self.board_width = width;
        self.board_height = height;
        self.playable_points = width * height;
        self
    }

    /// Builder method for sparse boards
    pub fn with_playable_points(mut self, points: usize) -> Self {
        self.playable_points = points;
        self
    }

    /// Builder method for action count
    pub fn with_actions(mut self, num_actions: usize) -> Self {
        self.num_actions = num_actions;
        self
    }

    /// Builder method for observation size
    pub fn with_observation(mut self, obs_size: usize) -> Self {
        self.obs_size = obs_size;
        self
    }

    /// Builder method for player information
    pub fn with_players(mut self, count: usize, names: Vec<String>, symbols: Vec<char>) -> Self {
        self.player_count = count;
        self.player_names = names;
        self.player_symbols = symbols;
        self
    }

    /// Builder method for description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Get the total number of board cells
    pub fn board_size(&self) -> usize {
        self.board_width * self.board_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_builder() {
        let meta = GameMetadata::new("mill", "Nine Men's Morris")
            .with_board(7, 7)
            .with_playable_points(24)
            .with_actions(576)
            .with_observation(56)
            .with_players(
                2,
                vec!["White".to_string(), "Black".to_string()],
                vec!['W', 'B'],
            )
            .with_description("Form mills to capture.");

        assert_eq!(meta.env_id, "mill");
        assert_eq!(meta.board_width, 7);
        assert_eq!(meta.board_height, 7);
        assert_eq!(meta.playable_points, 24);
        assert_eq!(meta.num_actions, 576);
        assert_eq!(meta.obs_size, 56);
        assert_eq!(meta.player_count, 2);
        assert_eq!(meta.player_names, vec!["White", "Black"]);
        assert_eq!(meta.player_symbols, vec!['W', 'B']);
        assert_eq!(meta.description, "Form mills to capture.");
    }

    #[test]
    fn test_board_size() {
        let meta = GameMetadata::new("test", "Test").with_board(7, 6);
        assert_eq!(meta.board_size(), 42);
        assert_eq!(meta.playable_points, 42);
    }

    #[test]
    fn test_serialization() {
        let meta = GameMetadata::new("mill", "Mill")
            .with_board(7, 7)
            .with_actions(576);

        let json = serde_json::to_string(&meta).unwrap();
        let parsed: GameMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(meta, parsed);
    }
}
