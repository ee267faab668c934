//! Optional perfect-play oracle.
//!
//! An oracle is consulted outside the search hot path, either to label
//! extra training positions or to drive the `ExternalEngine` policy.

use crate::samples::TrainingExample;
use engine_core::Player;
use games_mill::{move_to_action, Board, Move, NUM_ACTIONS};
use thiserror::Error;

/// Game-theoretic result of a position for the queried side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wdl {
    Win,
    Draw,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleVerdict {
    pub wdl: Wdl,
    /// Plies to the end of the game under perfect play.
    pub distance: u32,
}

#[derive(Debug, Clone, Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
    #[error("Position not covered by the oracle")]
    NotCovered,
}

pub trait Oracle: Send + Sync {
    fn evaluate(&self, board: &Board, player: Player) -> Result<OracleVerdict, OracleError>;

    /// Every optimal move for `player`. May be empty for terminal positions.
    fn best_moves(&self, board: &Board, player: Player) -> Result<Vec<Move>, OracleError>;
}

/// Build an oracle-labelled example for the side to move: uniform policy
/// over the optimal moves, value from the verdict.
///
/// Returns `Ok(None)` when the oracle has no optimal move to offer.
pub fn oracle_example(
    oracle: &dyn Oracle,
    board: &Board,
) -> Result<Option<TrainingExample>, OracleError> {
    let mover = board.to_move();
    let best = oracle.best_moves(board, mover)?;
    let legal: Vec<usize> = best
        .into_iter()
        .filter(|&mv| board.is_legal(mv))
        .map(move_to_action)
        .collect();
    if legal.is_empty() {
        return Ok(None);
    }

    let verdict = oracle.evaluate(board, mover)?;
    let value = match verdict.wdl {
        Wdl::Win => 1.0,
        Wdl::Loss => -1.0,
        Wdl::Draw => board.draw_result(mover),
    };

    let mut policy = vec![0.0; NUM_ACTIONS];
    let share = 1.0 / legal.len() as f32;
    for action in legal {
        policy[action] += share;
    }

    Ok(Some(TrainingExample {
        board: board.canonical_cells(),
        mover,
        policy,
        phase: board.phase_label(),
        value,
    }))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Oracle that always recommends the lowest legal move.
    pub struct FirstMoveOracle {
        pub wdl: Wdl,
    }

    impl Oracle for FirstMoveOracle {
        fn evaluate(&self, _board: &Board, _player: Player) -> Result<OracleVerdict, OracleError> {
            Ok(OracleVerdict {
                wdl: self.wdl,
                distance: 0,
            })
        }

        fn best_moves(&self, board: &Board, _player: Player) -> Result<Vec<Move>, OracleError> {
            let mut moves = board.legal_moves();
            moves.sort_by_key(|&mv| move_to_action(mv));
            moves.truncate(1);
            Ok(moves)
        }
    }

    /// Oracle that is never reachable.
    pub struct OfflineOracle;

    impl Oracle for OfflineOracle {
        fn evaluate(&self, _board: &Board, _player: Player) -> Result<OracleVerdict, OracleError> {
            Err(OracleError::Unavailable("offline".into()))
        }

        fn best_moves(&self, _board: &Board, _player: Player) -> Result<Vec<Move>, OracleError> {
            Err(OracleError::Unavailable("offline".into()))
        }
    }
}
