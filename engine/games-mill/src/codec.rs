//! Move <-> action index codec.
//!
//! The action space is a fixed `24 x 24` grid. Relocations use
//! `from * 24 + to`. Placements and removals are a single point and use the
//! point index directly, so in those phases only the first 24 slots are
//! reachable. Decoding therefore needs the phase.

use crate::board::{Move, Phase};
use crate::geometry::{parse_point, POINT_COUNT};

/// Size of the action space.
pub const NUM_ACTIONS: usize = POINT_COUNT * POINT_COUNT;

/// Encode a move.
#[inline]
pub fn move_to_action(mv: Move) -> usize {
    match mv {
        Move::Place(p) | Move::Remove(p) => p as usize,
        Move::Move { from, to } => from as usize * POINT_COUNT + to as usize,
    }
}

/// Decode an action under `phase`. Returns `None` for indices the phase can
/// never produce.
pub fn action_to_move(phase: Phase, action: usize) -> Option<Move> {
    match phase {
        Phase::Placing if action < POINT_COUNT => Some(Move::Place(action as u8)),
        Phase::Capturing if action < POINT_COUNT => Some(Move::Remove(action as u8)),
        Phase::Moving | Phase::Flying if action < NUM_ACTIONS => Some(Move::Move {
            from: (action / POINT_COUNT) as u8,
            to: (action % POINT_COUNT) as u8,
        }),
        _ => None,
    }
}

/// Errors from parsing move notation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotationError {
    #[error("Unrecognised move token '{0}'")]
    BadToken(String),
    #[error("Move '{token}' does not fit the {phase:?} phase")]
    WrongPhase { token: String, phase: Phase },
}

/// Parse a move token in the context of `phase`.
///
/// Accepted forms: `d6` (placement, or removal while capturing), `xd6`
/// (removal), `a1-a4` or `a1a4` (relocation).
pub fn parse_move(phase: Phase, token: &str) -> Result<Move, NotationError> {
    let token = token.trim();
    let bad = || NotationError::BadToken(token.to_string());
    let wrong = || NotationError::WrongPhase {
        token: token.to_string(),
        phase,
    };

    if let Some(rest) = token.strip_prefix(|c: char| c == 'x' || c == 'X') {
        let p = parse_point(rest).ok_or_else(bad)?;
        return match phase {
            Phase::Capturing => Ok(Move::Remove(p as u8)),
            _ => Err(wrong()),
        };
    }

    let compact: String = token.chars().filter(|&c| c != '-').collect();
    if !compact.is_ascii() {
        return Err(bad());
    }
    match compact.len() {
        2 => {
            let p = parse_point(&compact).ok_or_else(bad)? as u8;
            match phase {
                Phase::Placing => Ok(Move::Place(p)),
                Phase::Capturing => Ok(Move::Remove(p)),
                _ => Err(wrong()),
            }
        }
        4 => {
            let from = parse_point(&compact[..2]).ok_or_else(bad)? as u8;
            let to = parse_point(&compact[2..]).ok_or_else(bad)? as u8;
            match phase {
                Phase::Moving | Phase::Flying => Ok(Move::Move { from, to }),
                _ => Err(wrong()),
            }
        }
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_uses_point_index() {
        assert_eq!(move_to_action(Move::Place(7)), 7);
        assert_eq!(move_to_action(Move::Remove(23)), 23);
        assert_eq!(action_to_move(Phase::Placing, 7), Some(Move::Place(7)));
        assert_eq!(action_to_move(Phase::Capturing, 23), Some(Move::Remove(23)));
    }

    #[test]
    fn test_relocation_uses_pair_index() {
        let mv = Move::Move { from: 4, to: 7 };
        assert_eq!(move_to_action(mv), 4 * 24 + 7);
        assert_eq!(action_to_move(Phase::Moving, 4 * 24 + 7), Some(mv));
        assert_eq!(action_to_move(Phase::Flying, 4 * 24 + 7), Some(mv));
    }

    #[test]
    fn test_out_of_phase_indices_rejected() {
        assert_eq!(action_to_move(Phase::Placing, 24), None);
        assert_eq!(action_to_move(Phase::Capturing, 100), None);
        assert_eq!(action_to_move(Phase::Moving, NUM_ACTIONS), None);
    }

    #[test]
    fn test_parse_move_forms() {
        assert_eq!(parse_move(Phase::Placing, "a7"), Ok(Move::Place(0)));
        assert_eq!(parse_move(Phase::Capturing, "xa7"), Ok(Move::Remove(0)));
        assert_eq!(parse_move(Phase::Capturing, "a7"), Ok(Move::Remove(0)));
        assert_eq!(
            parse_move(Phase::Moving, "a7-d7"),
            Ok(Move::Move { from: 0, to: 9 })
        );
        assert_eq!(
            parse_move(Phase::Flying, " a7d7 "),
            Ok(Move::Move { from: 0, to: 9 })
        );
    }

    #[test]
    fn test_parse_move_errors() {
        assert!(matches!(
            parse_move(Phase::Placing, "a7-d7"),
            Err(NotationError::WrongPhase { .. })
        ));
        assert!(matches!(
            parse_move(Phase::Moving, "xa7"),
            Err(NotationError::WrongPhase { .. })
        ));
        assert!(matches!(
            parse_move(Phase::Placing, "d4"),
            Err(NotationError::BadToken(_))
        ));
        assert!(matches!(
            parse_move(Phase::Placing, "hello"),
            Err(NotationError::BadToken(_))
        ));
    }

    #[test]
    fn test_display_matches_parse() {
        let moves = [
            (Phase::Placing, Move::Place(10)),
            (Phase::Capturing, Move::Remove(3)),
            (Phase::Moving, Move::Move { from: 1, to: 4 }),
        ];
        for (phase, mv) in moves {
            assert_eq!(parse_move(phase, &mv.to_string()), Ok(mv));
        }
    }
}
