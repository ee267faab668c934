//! Nine Men's Morris (mill) implementation for the Cartridge engine
//!
//! Two players each place nine pieces on the 24 points of three concentric
//! squares, then slide them along the board lines. Closing a line of three
//! (a mill) lets the mover remove an opposing piece. A side reduced to three
//! pieces may fly to any empty point; a side left with two pieces, or with
//! no move, loses.
//!
//! # Usage
//!
//! ```rust
//! use engine_core::Game;
//! use games_mill::{MillGame, Rules};
//!
//! let game = MillGame::new(Rules::default());
//! let board = game.initial_state();
//! assert_eq!(game.legal_mask(&board).count(), 24);
//!
//! let next = game.apply(&board, 9).unwrap();
//! assert_eq!(next.placements(), 1);
//! ```

pub mod board;
pub mod codec;
pub mod geometry;
pub mod rules;
pub mod symmetry;
pub mod terminal;


pub use board::{Board, BoardError, Forfeit, Move, Phase, OBS_SIZE};
pub use codec::{action_to_move, move_to_action, parse_move, NotationError, NUM_ACTIONS};
pub use geometry::{parse_point, point_name, POINT_COUNT};
pub use rules::{BoardFullAction, Curriculum, Rules, StalemateAction};
pub use symmetry::{SymmetryTable, NUM_SYMMETRIES};
pub use terminal::{Terminal, TerminalReason};

use engine_core::typed::{Capabilities, EngineId, Game, GameError};
use engine_core::{ActionMask, GameMetadata, Player};
use std::sync::Arc;

/// Upper bound on plies for one game, captures included.
pub const MAX_HORIZON: u32 = 1000;

/// Mill rule engine.
///
/// Holds the rule set and the shared symmetry table. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct MillGame {
    rules: Rules,
    symmetry: Arc<SymmetryTable>,
}

impl MillGame {
    /// Create a rule engine with a freshly built symmetry table.
    pub fn new(rules: Rules) -> Self {
        Self::with_symmetry(rules, Arc::new(SymmetryTable::new()))
    }

    /// Create a rule engine sharing an existing symmetry table.
    pub fn with_symmetry(rules: Rules, symmetry: Arc<SymmetryTable>) -> Self {
        Self { rules, symmetry }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn symmetry(&self) -> &Arc<SymmetryTable> {
        &self.symmetry
    }

    /// Legality mask for a board.
    pub fn mask_for(board: &Board) -> ActionMask {
        ActionMask::from_actions(
            NUM_ACTIONS,
            board.legal_moves().into_iter().map(move_to_action),
        )
    }
}

impl Default for MillGame {
    fn default() -> Self {
        Self::new(Rules::default())
    }
}

impl Game for MillGame {
    type State = Board;

    fn engine_id(&self) -> EngineId {
        EngineId {
            env_id: "mill".to_string(),
            build_id: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            id: self.engine_id(),
            num_actions: NUM_ACTIONS,
            obs_size: OBS_SIZE,
            max_horizon: MAX_HORIZON,
        }
    }

    fn metadata(&self) -> GameMetadata {
        GameMetadata::new("mill", "Nine Men's Morris")
            .with_board(geometry::GRID_SIZE, geometry::GRID_SIZE)
            .with_playable_points(POINT_COUNT)
            .with_actions(NUM_ACTIONS)
            .with_observation(OBS_SIZE)
            .with_players(
                2,
                vec!["White".to_string(), "Black".to_string()],
                vec!['W', 'B'],
            )
            .with_description(
                "Place, slide and fly pieces; close a line of three to remove an opposing piece.",
            )
    }

    fn initial_state(&self) -> Board {
        Board::new(self.rules)
    }

    fn to_play(&self, state: &Board) -> Player {
        state.to_move()
    }

    fn legal_mask(&self, state: &Board) -> ActionMask {
        Self::mask_for(state)
    }

    fn apply(&self, state: &Board, action: usize) -> Result<Board, GameError> {
        if action >= NUM_ACTIONS {
            return Err(GameError::ActionOutOfRange {
                action,
                size: NUM_ACTIONS,
            });
        }
        let mv = action_to_move(state.phase(), action).ok_or(GameError::IllegalAction { action })?;
        let mut next = state.clone();
        next.apply_move(mv).map_err(|_| GameError::IllegalAction { action })?;
        Ok(next)
    }

    fn terminal_value(&self, state: &Board) -> Option<f32> {
        state.check_terminal(state.to_move()).map(|t| t.value)
    }

    fn state_key(&self, state: &Board) -> u64 {
        state.canonical_key()
    }

    fn observation(&self, state: &Board) -> Vec<f32> {
        state.observation()
    }
}
