//! Terminal detection.
//!
//! Conditions are checked in a fixed priority order so that a position that
//! satisfies several of them always reports the same reason.

use crate::board::{Board, Phase};
use crate::rules::{BoardFullAction, Curriculum, StalemateAction};
use engine_core::Player;

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminalReason {
    /// A side has fewer pieces than the rules require.
    FewerThanThree,
    /// The side to move is blocked and the rules score that as a loss.
    NoLegalMoves,
    /// Every point is occupied and the rules score that as a loss.
    FullBoardLoss,
    FullBoardDraw,
    Resigned,
    TimedOut,
    ThreefoldRepetition,
    FiftyMove,
    EndgameFiftyMove,
    /// The side to move is blocked and the rules score that as a draw.
    StalemateDraw,
    /// Cut off by the per-game move cap. Draw-like but not a rule draw.
    MoveCap,
    /// Curriculum early stop scored by material. Not a verified result.
    Heuristic,
}

impl TerminalReason {
    /// Stable tag used in logs and stored statistics.
    pub fn tag(self) -> &'static str {
        match self {
            TerminalReason::FewerThanThree => "loseFewerThanThree",
            TerminalReason::NoLegalMoves => "loseNoLegalMoves",
            TerminalReason::FullBoardLoss => "loseFullBoard",
            TerminalReason::FullBoardDraw => "drawFullBoard",
            TerminalReason::Resigned => "loseResign",
            TerminalReason::TimedOut => "loseTimeout",
            TerminalReason::ThreefoldRepetition => "drawThreefoldRepetition",
            TerminalReason::FiftyMove => "drawFiftyMove",
            TerminalReason::EndgameFiftyMove => "drawEndgameFiftyMove",
            TerminalReason::StalemateDraw => "drawStalemateCondition",
            TerminalReason::MoveCap => "moveCap",
            TerminalReason::Heuristic => "heuristicEarlyStop",
        }
    }

    /// Rule draws. Identified by tag prefix rather than by result magnitude,
    /// since draw results carry a small material bias.
    pub fn is_draw(self) -> bool {
        self.tag().starts_with("draw")
    }

    /// Reasons backed by the rules rather than by a cap or a heuristic.
    pub fn is_verified(self) -> bool {
        !matches!(self, TerminalReason::MoveCap | TerminalReason::Heuristic)
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A finished game as seen from one side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Terminal {
    pub reason: TerminalReason,
    /// +1 win, -1 loss, small draw scalar, or a heuristic score, from the
    /// perspective of the queried side.
    pub value: f32,
    /// Winner of a decided game. `None` for draws, caps and heuristics.
    pub winner: Option<Player>,
}

impl Terminal {
    fn decided(reason: TerminalReason, loser: Player, perspective: Player) -> Self {
        let winner = loser.opponent();
        Self {
            reason,
            value: if winner == perspective { 1.0 } else { -1.0 },
            winner: Some(winner),
        }
    }

    fn draw(reason: TerminalReason, board: &Board, perspective: Player) -> Self {
        Self {
            reason,
            value: board.draw_result(perspective),
            winner: None,
        }
    }
}

impl Board {
    /// Check whether the game is over and score it for `perspective`.
    ///
    /// Priority: insufficient pieces, blocked side, full board, resignation,
    /// timeout, repetition, move limits, then the curriculum early stop.
    pub fn check_terminal(&self, perspective: Player) -> Option<Terminal> {
        let rules = self.rules();
        let opponent = perspective.opponent();

        // Insufficient pieces, opponent first.
        for side in [opponent, perspective] {
            if self.total_pieces(side) < rules.pieces_at_least {
                return Some(Terminal::decided(
                    TerminalReason::FewerThanThree,
                    side,
                    perspective,
                ));
            }
        }

        // A full board is scored by its own rule below.
        if matches!(self.phase(), Phase::Moving | Phase::Flying)
            && self.empty_count() > 0
            && self.legal_moves().is_empty()
        {
            return Some(match rules.stalemate_action {
                StalemateAction::Loss => {
                    Terminal::decided(TerminalReason::NoLegalMoves, self.to_move(), perspective)
                }
                StalemateAction::Draw => {
                    Terminal::draw(TerminalReason::StalemateDraw, self, perspective)
                }
            });
        }

        if self.phase() != Phase::Capturing && self.empty_count() == 0 {
            return Some(match rules.board_full_action {
                BoardFullAction::FirstPlayerLoses => {
                    Terminal::decided(TerminalReason::FullBoardLoss, Player::One, perspective)
                }
                BoardFullAction::Draw => {
                    Terminal::draw(TerminalReason::FullBoardDraw, self, perspective)
                }
            });
        }

        if let Some(forfeit) = self.forfeit() {
            return Some(Terminal::decided(forfeit.reason, forfeit.loser, perspective));
        }

        if self.threefold() {
            return Some(Terminal::draw(
                TerminalReason::ThreefoldRepetition,
                self,
                perspective,
            ));
        }

        if self.rule50() >= rules.n_move_rule {
            return Some(Terminal::draw(TerminalReason::FiftyMove, self, perspective));
        }

        if rules.endgame_rule_active()
            && self.rule50() >= rules.endgame_n_move_rule
            && (self.on_board(Player::One) <= rules.flying_threshold
                || self.on_board(Player::Two) <= rules.flying_threshold)
        {
            return Some(Terminal::draw(
                TerminalReason::EndgameFiftyMove,
                self,
                perspective,
            ));
        }

        if let Curriculum::PlacingOnly { weight } = rules.curriculum {
            if self.placements() >= rules.total_placements() && self.phase() != Phase::Capturing {
                return Some(Terminal {
                    reason: TerminalReason::Heuristic,
                    value: self.heuristic_score(perspective, weight),
                    winner: None,
                });
            }
        }

        None
    }

    /// Material score used by the placing-only curriculum stage.
    ///
    /// `tanh` of the weighted on-board difference plus a small first-player
    /// bias, kept within +-0.5 so it never looks like a decided game.
    pub fn heuristic_score(&self, perspective: Player, weight: f32) -> f32 {
        let diff = self.on_board(perspective) as f32 - self.on_board(perspective.opponent()) as f32;
        let side_bias = perspective.sign() as f32 * 0.1 * weight;
        ((weight * diff).tanh() + side_bias).clamp(-0.5, 0.5)
    }

    /// True when any terminal condition holds.
    pub fn is_over(&self) -> bool {
        self.check_terminal(self.to_move()).is_some()
    }
}
