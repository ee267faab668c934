//! Typed Game trait consumed by the search and the coach
//!
//! A game exposes an immutable rule set over a cloneable state value. The
//! search never mutates a state in place: it asks the game to apply an
//! action and receives the successor, so transposed positions can be shared
//! freely between tree nodes.

use crate::action_mask::ActionMask;
use crate::metadata::GameMetadata;

/// Engine identification information
#[derive(Debug, Clone, PartialEq)]
pub struct EngineId {
    pub env_id: String,
    pub build_id: String,
}

/// Game capabilities and configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities {
    pub id: EngineId,
    /// Size of the flat discrete action space
    pub num_actions: usize,
    /// Number of f32 values in one observation
    pub obs_size: usize,
    /// Upper bound on plies before a game is cut off
    pub max_horizon: u32,
}

/// The two sides of a zero-sum game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Player {
    One,
    Two,
}

impl Player {
    /// The other side.
    #[inline]
    pub fn opponent(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// +1 for the first player, -1 for the second.
    #[inline]
    pub fn sign(self) -> i8 {
        match self {
            Player::One => 1,
            Player::Two => -1,
        }
    }

    /// Slot for per-player arrays.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Player::One => 0,
            Player::Two => 1,
        }
    }

    /// Parse the 1-based numbering used on disk.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }

    /// 1-based numbering used on disk.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }
}

/// Error returned when the rules refuse an action.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GameError {
    #[error("Illegal action {action} in current position")]
    IllegalAction { action: usize },
    #[error("Action {action} outside action space of size {size}")]
    ActionOutOfRange { action: usize, size: usize },
    #[error("Game is already over")]
    GameOver,
}

/// Main trait for game implementations
///
/// Implementations are immutable rule sets: every method takes `&self` and
/// state transitions return a fresh value. All values returned by
/// `terminal_value` are from the perspective of `to_play(state)`.
///
/// # Example
///
/// ```rust
/// # use engine_core::typed::*;
/// # use engine_core::{ActionMask, GameMetadata};
/// #[derive(Debug)]
/// struct Countdown;
///
/// impl Game for Countdown {
///     type State = (u8, Player);
///
///     fn engine_id(&self) -> EngineId {
///         EngineId { env_id: "countdown".into(), build_id: "0".into() }
///     }
///     fn capabilities(&self) -> Capabilities {
///         Capabilities { id: self.engine_id(), num_actions: 2, obs_size: 1, max_horizon: 10 }
///     }
///     fn metadata(&self) -> GameMetadata {
///         GameMetadata::new("countdown", "Countdown").with_actions(2)
///     }
///     fn initial_state(&self) -> Self::State { (5, Player::One) }
///     fn to_play(&self, state: &Self::State) -> Player { state.1 }
///     fn legal_mask(&self, state: &Self::State) -> ActionMask {
///         ActionMask::from_actions(2, (0..2).filter(|&a| a < state.0 as usize))
///     }
///     fn apply(&self, state: &Self::State, action: usize) -> Result<Self::State, GameError> {
///         if !self.legal_mask(state).contains(action) {
///             return Err(GameError::IllegalAction { action });
///         }
///         Ok((state.0 - action as u8 - 1, state.1.opponent()))
///     }
///     fn terminal_value(&self, state: &Self::State) -> Option<f32> {
///         (state.0 == 0).then_some(-1.0)
///     }
///     fn state_key(&self, state: &Self::State) -> u64 {
///         (state.0 as u64) << 1 | state.1.index() as u64
///     }
///     fn observation(&self, state: &Self::State) -> Vec<f32> { vec![state.0 as f32] }
/// }
///
/// let game = Countdown;
/// let next = game.apply(&game.initial_state(), 1).unwrap();
/// assert_eq!(next, (3, Player::Two));
/// ```
pub trait Game: Send + Sync + std::fmt::Debug + 'static {
    /// Game state type - cheap to clone
    type State: Clone + Send + Sync + std::fmt::Debug + 'static;

    /// Get engine identification information
    fn engine_id(&self) -> EngineId;

    /// Get game capabilities and configuration
    fn capabilities(&self) -> Capabilities;

    /// Get game metadata for display and configuration
    fn metadata(&self) -> GameMetadata;

    /// Starting position
    fn initial_state(&self) -> Self::State;

    /// Side that chooses the next action
    fn to_play(&self, state: &Self::State) -> Player;

    /// Legal actions in `state`, as a mask over the full action space
    fn legal_mask(&self, state: &Self::State) -> ActionMask;

    /// Apply `action` and return the successor state.
    ///
    /// Fails with `GameError::IllegalAction` when the action is not in
    /// `legal_mask(state)`.
    fn apply(&self, state: &Self::State, action: usize) -> Result<Self::State, GameError>;

    /// Final value from `to_play(state)`'s perspective, or `None` while the
    /// game is still running
    fn terminal_value(&self, state: &Self::State) -> Option<f32>;

    /// Canonical 64-bit key. Two states share a key only if they are
    /// interchangeable for search purposes.
    fn state_key(&self, state: &Self::State) -> u64;

    /// Evaluator input for `state`, relative to the side to move
    fn observation(&self, state: &Self::State) -> Vec<f32>;
}
