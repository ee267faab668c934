//! Rule variants and draw bookkeeping parameters.

/// What happens when every point is occupied outside a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardFullAction {
    /// The first player loses.
    FirstPlayerLoses,
    /// The game is drawn.
    Draw,
}

/// What happens when the side to move is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalemateAction {
    /// The blocked side loses.
    Loss,
    /// The game is drawn.
    Draw,
}

/// Training curriculum stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curriculum {
    /// Complete rules.
    FullRules,
    /// Stop after the placement phase and score the position by material.
    /// The score is a heuristic, never a verified result.
    PlacingOnly { weight: f32 },
    /// Complete rules with flying disabled.
    NoFlying,
}

/// Rule set shared by every board of one game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rules {
    /// Pieces each side places during the opening.
    pub pieces_per_side: u8,
    /// A side with fewer pieces (on board plus in hand) loses.
    pub pieces_at_least: u8,
    /// A side with this many pieces or fewer, and none in hand, may fly.
    pub flying_threshold: u8,
    pub flying_enabled: bool,
    /// Consecutive relocations without placement or removal that draw the game.
    pub n_move_rule: u32,
    /// Shorter limit applied once either side is down to the flying threshold.
    /// Only active when lower than `n_move_rule`.
    pub endgame_n_move_rule: u32,
    pub threefold_repetition: bool,
    /// Base value reported for a draw.
    pub draw_value: f32,
    /// Per-piece material adjustment added to the draw value.
    pub draw_material_bias: f32,
    pub board_full_action: BoardFullAction,
    pub stalemate_action: StalemateAction,
    pub curriculum: Curriculum,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            pieces_per_side: 9,
            pieces_at_least: 3,
            flying_threshold: 3,
            flying_enabled: true,
            n_move_rule: 100,
            endgame_n_move_rule: 100,
            threefold_repetition: true,
            draw_value: 1e-4,
            draw_material_bias: 0.03,
            board_full_action: BoardFullAction::Draw,
            stalemate_action: StalemateAction::Loss,
            curriculum: Curriculum::FullRules,
        }
    }
}

impl Rules {
    /// Total placements before the opening ends.
    #[inline]
    pub fn total_placements(&self) -> u8 {
        self.pieces_per_side * 2
    }

    /// Flying allowed by both the rule set and the curriculum stage.
    #[inline]
    pub fn flying_allowed(&self) -> bool {
        self.flying_enabled && self.curriculum != Curriculum::NoFlying
    }

    /// True when the endgame move limit is stricter than the standard one.
    #[inline]
    pub fn endgame_rule_active(&self) -> bool {
        self.endgame_n_move_rule < self.n_move_rule
    }

    /// Draw scalar given the material on board for the queried side and its
    /// opponent.
    pub fn draw_result(&self, own_on_board: u8, opp_on_board: u8) -> f32 {
        let diff = own_on_board as f32 - opp_on_board as f32;
        (self.draw_value + self.draw_material_bias * diff).clamp(-1.0, 1.0)
    }

    /// Builder: set the curriculum stage.
    pub fn with_curriculum(mut self, curriculum: Curriculum) -> Self {
        self.curriculum = curriculum;
        self
    }

    /// Builder: set the standard move limit.
    pub fn with_n_move_rule(mut self, n: u32) -> Self {
        self.n_move_rule = n;
        self
    }

    /// Builder: set the endgame move limit.
    pub fn with_endgame_n_move_rule(mut self, n: u32) -> Self {
        self.endgame_n_move_rule = n;
        self
    }

    /// Builder: enable or disable flying.
    pub fn with_flying(mut self, enabled: bool) -> Self {
        self.flying_enabled = enabled;
        self
    }

    /// Builder: set the blocked-side outcome.
    pub fn with_stalemate_action(mut self, action: StalemateAction) -> Self {
        self.stalemate_action = action;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = Rules::default();
        assert_eq!(rules.pieces_per_side, 9);
        assert_eq!(rules.total_placements(), 18);
        assert!(rules.flying_allowed());
        assert!(!rules.endgame_rule_active());
    }

    #[test]
    fn test_draw_result_material_bias() {
        let rules = Rules::default();
        assert!((rules.draw_result(5, 5) - 1e-4).abs() < 1e-6);
        assert!((rules.draw_result(6, 4) - (1e-4 + 0.06)).abs() < 1e-6);
        assert!((rules.draw_result(3, 6) - (1e-4 - 0.09)).abs() < 1e-6);
    }

    #[test]
    fn test_draw_result_clamped() {
        let rules = Rules {
            draw_material_bias: 1.0,
            ..Rules::default()
        };
        assert_eq!(rules.draw_result(9, 0), 1.0);
        assert_eq!(rules.draw_result(0, 9), -1.0);
    }

    #[test]
    fn test_no_flying_curriculum_disables_flying() {
        let rules = Rules::default().with_curriculum(Curriculum::NoFlying);
        assert!(rules.flying_enabled);
        assert!(!rules.flying_allowed());
    }

    #[test]
    fn test_endgame_rule_active_only_when_shorter() {
        let rules = Rules::default().with_endgame_n_move_rule(50);
        assert!(rules.endgame_rule_active());
    }
}
