//! Monte Carlo Tree Search (MCTS) implementation for AlphaZero-style game playing.
//!
//! This crate provides a game-agnostic MCTS implementation that works with any
//! game implementing the `engine-core` Game trait. Positions reached through
//! different move orders share a node via a transposition table keyed by
//! `Game::state_key`.
//!
//! # Overview
//!
//! MCTS is a search algorithm that builds a search tree by running simulations.
//! Each simulation consists of four phases:
//!
//! 1. **Selection**: Traverse the graph using PUCT to balance exploration
//!    and exploitation
//! 2. **Expansion**: When reaching a leaf, expand it by adding an edge for
//!    each legal action; children are created the first time an edge is taken
//! 3. **Evaluation**: Use a policy/value network (or uniform prior for testing)
//!    to estimate the value of the new state
//! 4. **Backpropagation**: Update edge statistics along the recorded path,
//!    flipping the sign only where the player to move changes
//!
//! # Usage
//!
//! ```rust
//! use engine_core::Game;
//! use games_mill::MillGame;
//! use mcts::{MctsConfig, MctsSearch, UniformEvaluator};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha20Rng;
//!
//! let game = MillGame::default();
//! let board = game.initial_state();
//!
//! let mut search = MctsSearch::new(MctsConfig::for_testing());
//! let mut rng = ChaCha20Rng::seed_from_u64(42);
//! let result = search
//!     .run(&game, &UniformEvaluator::new(), &board, &mut rng)
//!     .unwrap();
//!
//! // Keep the explored subtree for the next move
//! let next = game.apply(&board, result.action).unwrap();
//! search.advance(result.action);
//! let tree = search.tree().unwrap();
//! assert_eq!(tree.get(tree.root()).key, game.state_key(&next));
//! ```
//!
//! # Configuration
//!
//! The [`MctsConfig`] struct controls search behavior:
//!
//! - `num_simulations`: Number of simulations per search (default: 40)
//! - `c_puct`: Exploration constant for PUCT (default: 1.5)
//! - `dirichlet_alpha`: Noise parameter for exploration at root (default: 0.3)
//! - `temperature`: Temperature for action selection (1.0 = proportional, 0.0 = greedy)
//! - `max_depth`: Descent depth after which a simulation backs up a neutral value
//!
//! # Evaluators
//!
//! The search requires an [`Evaluator`] to estimate policy and value:
//!
//! - [`UniformEvaluator`]: Returns uniform policy over legal moves (for testing)
//! - Trained models implement the trait in the coach and are shared as `Arc<dyn Evaluator>`
//!
//! # Architecture
//!
//! ```text
//! +-------------------------------------------------------------+
//! |                        MctsSearch<G>                        |
//! +-------------------------------------------------------------+
//! |  +-------------------+  +------------+  +-----------------+ |
//! |  | MctsTree          |  |  G: Game   |  |   Evaluator     | |
//! |  | arena + key table |  | (rules)    |  | (policy/value)  | |
//! |  +---------+---------+  +-----+------+  +--------+--------+ |
//! |            |                  |                  |          |
//! |            v                  v                  v          |
//! |  +-------------------------------------------------------+  |
//! |  |    select -> materialize -> expand -> backpropagate   |  |
//! |  +-------------------------------------------------------+  |
//! +-------------------------------------------------------------+
//! ```

pub mod config;
pub mod evaluator;
pub mod node;
pub mod search;
pub mod tree;

// Re-export main types
pub use config::MctsConfig;
pub use evaluator::{uniform_policy, EvalResult, Evaluator, EvaluatorError, UniformEvaluator};
pub use node::{Edge, MctsNode, NodeId};
pub use search::{
    dirichlet_noise, masked_priors, run_mcts, sample_action, MctsSearch, SearchError, SearchResult,
    SearchStats,
};
pub use tree::{MctsTree, PathStep, TreeStats};
