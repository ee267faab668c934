//! Board state and phase state machine.

use crate::geometry::{are_adjacent, point_name, ADJACENT, MILLS, POINTS, POINT_COUNT, POINT_MILLS};
use crate::rules::Rules;
use crate::terminal::TerminalReason;
use engine_core::Player;
use std::fmt;

/// Game phase. The phase is global; whether the side to move may actually
/// fly is decided per side by [`Board::can_fly`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Placing,
    Moving,
    Flying,
    /// A mill was just closed; the same side removes an opposing piece.
    Capturing,
}

impl Phase {
    pub fn index(self) -> usize {
        match self {
            Phase::Placing => 0,
            Phase::Moving => 1,
            Phase::Flying => 2,
            Phase::Capturing => 3,
        }
    }
}

/// A single move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Place(u8),
    Move { from: u8, to: u8 },
    Remove(u8),
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Move::Place(p) => write!(f, "{}", point_name(p as usize)),
            Move::Move { from, to } => {
                write!(f, "{}-{}", point_name(from as usize), point_name(to as usize))
            }
            Move::Remove(p) => write!(f, "x{}", point_name(p as usize)),
        }
    }
}

/// Errors raised by the rule engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoardError {
    #[error("Illegal move {mv} in {phase:?} phase")]
    IllegalMove { mv: Move, phase: Phase },
    #[error("Invalid position: {0}")]
    InvalidPosition(String),
}

/// A game lost off the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forfeit {
    pub loser: Player,
    pub reason: TerminalReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    Place,
    Relocate,
    Remove,
}

/// Full game position with rule bookkeeping.
///
/// Cells hold `+1` for the first player, `-1` for the second and `0` for
/// empty points.
#[derive(Debug, Clone, PartialEq)]
pub struct Board {
    cells: [i8; POINT_COUNT],
    phase: Phase,
    to_move: Player,
    placements: u8,
    in_hand: [u8; 2],
    rule50: u32,
    /// Position keys reached by relocations since the last placement or removal.
    history: Vec<u64>,
    threefold: bool,
    forfeit: Option<Forfeit>,
    plies: u32,
    rules: Rules,
}

impl Board {
    /// Empty board with both sides holding all their pieces.
    pub fn new(rules: Rules) -> Self {
        Self {
            cells: [0; POINT_COUNT],
            phase: Phase::Placing,
            to_move: Player::One,
            placements: 0,
            in_hand: [rules.pieces_per_side; 2],
            rule50: 0,
            history: Vec::new(),
            threefold: false,
            forfeit: None,
            plies: 0,
            rules,
        }
    }

    /// Build an arbitrary position, for analysis and tests.
    ///
    /// `cells` uses the absolute encoding (`+1` first player). Placements
    /// are derived from the pieces still in hand.
    pub fn from_position(
        rules: Rules,
        cells: [i8; POINT_COUNT],
        to_move: Player,
        phase: Phase,
        in_hand: [u8; 2],
    ) -> Result<Self, BoardError> {
        if cells.iter().any(|&c| !(-1..=1).contains(&c)) {
            return Err(BoardError::InvalidPosition("cell values must be -1, 0 or 1".into()));
        }
        let mut board = Self {
            cells,
            phase,
            to_move,
            placements: 0,
            in_hand,
            rule50: 0,
            history: Vec::new(),
            threefold: false,
            forfeit: None,
            plies: 0,
            rules,
        };
        for side in [Player::One, Player::Two] {
            if board.on_board(side) + board.in_hand(side) > rules.pieces_per_side {
                return Err(BoardError::InvalidPosition(format!(
                    "{side:?} has more than {} pieces",
                    rules.pieces_per_side
                )));
            }
        }
        let remaining = in_hand[0] as i32 + in_hand[1] as i32;
        board.placements = (rules.total_placements() as i32 - remaining).max(0) as u8;
        match phase {
            Phase::Placing if board.in_hand(to_move) == 0 => {
                return Err(BoardError::InvalidPosition(
                    "placing phase with no pieces in hand".into(),
                ));
            }
            Phase::Moving | Phase::Flying if board.placements < rules.total_placements() => {
                return Err(BoardError::InvalidPosition(
                    "movement phase before all pieces are placed".into(),
                ));
            }
            Phase::Capturing if board.on_board(to_move.opponent()) == 0 => {
                return Err(BoardError::InvalidPosition(
                    "capturing phase with nothing to capture".into(),
                ));
            }
            _ => {}
        }
        Ok(board)
    }

    #[inline]
    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn to_move(&self) -> Player {
        self.to_move
    }

    /// Total placements made by both sides.
    #[inline]
    pub fn placements(&self) -> u8 {
        self.placements
    }

    #[inline]
    pub fn in_hand(&self, player: Player) -> u8 {
        self.in_hand[player.index()]
    }

    /// Relocations since the last placement or removal.
    #[inline]
    pub fn rule50(&self) -> u32 {
        self.rule50
    }

    #[inline]
    pub fn threefold(&self) -> bool {
        self.threefold
    }

    #[inline]
    pub fn forfeit(&self) -> Option<Forfeit> {
        self.forfeit
    }

    /// Moves applied since the start, captures included.
    #[inline]
    pub fn plies(&self) -> u32 {
        self.plies
    }

    /// Absolute cell contents.
    #[inline]
    pub fn cells(&self) -> &[i8; POINT_COUNT] {
        &self.cells
    }

    /// Owner of a point.
    pub fn cell(&self, point: usize) -> Option<Player> {
        match self.cells.get(point) {
            Some(1) => Some(Player::One),
            Some(-1) => Some(Player::Two),
            _ => None,
        }
    }

    pub fn on_board(&self, player: Player) -> u8 {
        let sign = player.sign();
        self.cells.iter().filter(|&&c| c == sign).count() as u8
    }

    pub fn total_pieces(&self, player: Player) -> u8 {
        self.on_board(player) + self.in_hand(player)
    }

    pub fn empty_count(&self) -> usize {
        self.cells.iter().filter(|&&c| c == 0).count()
    }

    /// On-board difference from `player`'s side.
    pub fn material_diff(&self, player: Player) -> i32 {
        self.on_board(player) as i32 - self.on_board(player.opponent()) as i32
    }

    /// Draw scalar for `player`, including the material bias.
    pub fn draw_result(&self, player: Player) -> f32 {
        self.rules
            .draw_result(self.on_board(player), self.on_board(player.opponent()))
    }

    /// Whether `player` moves by flying rather than along lines.
    pub fn can_fly(&self, player: Player) -> bool {
        self.rules.flying_allowed()
            && self.in_hand(player) == 0
            && self.on_board(player) <= self.rules.flying_threshold
    }

    /// Training phase label. `4` marks the flying phase when the side to
    /// move is not itself allowed to fly.
    pub fn phase_label(&self) -> u8 {
        if self.phase == Phase::Flying && !self.can_fly(self.to_move) {
            4
        } else {
            self.phase.index() as u8
        }
    }

    /// True if the piece on `point` is part of a closed mill.
    pub fn in_mill(&self, point: usize) -> bool {
        let owner = self.cells[point];
        owner != 0
            && POINT_MILLS[point]
                .iter()
                .any(|&m| MILLS[m].iter().all(|&q| self.cells[q] == owner))
    }

    fn all_in_mills(&self, player: Player) -> bool {
        let sign = player.sign();
        (0..POINT_COUNT)
            .filter(|&p| self.cells[p] == sign)
            .all(|p| self.in_mill(p))
    }

    fn points_of(&self, value: i8) -> impl Iterator<Item = usize> + '_ {
        (0..POINT_COUNT).filter(move |&p| self.cells[p] == value)
    }

    /// Legal moves for the side to move.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.legal_moves_for(self.to_move)
    }

    /// Legal moves for `player` under the current phase, in ascending
    /// action order.
    pub fn legal_moves_for(&self, player: Player) -> Vec<Move> {
        let own = player.sign();
        match self.phase {
            Phase::Placing => {
                if self.in_hand(player) == 0 {
                    return Vec::new();
                }
                self.points_of(0).map(|p| Move::Place(p as u8)).collect()
            }
            Phase::Capturing => {
                let opp = player.opponent();
                let unrestricted = self.all_in_mills(opp);
                self.points_of(-own)
                    .filter(|&p| unrestricted || !self.in_mill(p))
                    .map(|p| Move::Remove(p as u8))
                    .collect()
            }
            Phase::Moving | Phase::Flying => {
                let flying = self.can_fly(player);
                let mut moves = Vec::new();
                for from in self.points_of(own) {
                    if flying {
                        moves.extend(self.points_of(0).map(|to| Move::Move {
                            from: from as u8,
                            to: to as u8,
                        }));
                    } else {
                        moves.extend(ADJACENT[from].iter().filter(|&&to| self.cells[to] == 0).map(
                            |&to| Move::Move {
                                from: from as u8,
                                to: to as u8,
                            },
                        ));
                    }
                }
                moves
            }
        }
    }

    /// Check a single move for the side to move without enumerating.
    pub fn is_legal(&self, mv: Move) -> bool {
        let me = self.to_move;
        let own = me.sign();
        match (self.phase, mv) {
            (Phase::Placing, Move::Place(p)) => {
                let p = p as usize;
                p < POINT_COUNT && self.cells[p] == 0 && self.in_hand(me) > 0
            }
            (Phase::Capturing, Move::Remove(p)) => {
                let p = p as usize;
                p < POINT_COUNT
                    && self.cells[p] == -own
                    && (!self.in_mill(p) || self.all_in_mills(me.opponent()))
            }
            (Phase::Moving | Phase::Flying, Move::Move { from, to }) => {
                let (from, to) = (from as usize, to as usize);
                from < POINT_COUNT
                    && to < POINT_COUNT
                    && self.cells[from] == own
                    && self.cells[to] == 0
                    && (self.can_fly(me) || are_adjacent(from, to))
            }
            _ => false,
        }
    }

    /// Apply a move for the side to move.
    ///
    /// Illegal moves are rejected without touching the board.
    pub fn apply_move(&mut self, mv: Move) -> Result<(), BoardError> {
        if !self.is_legal(mv) {
            return Err(BoardError::IllegalMove {
                mv,
                phase: self.phase,
            });
        }
        let me = self.to_move;
        let own = me.sign();

        let (kind, formed_mill) = match mv {
            Move::Place(p) => {
                self.cells[p as usize] = own;
                self.in_hand[me.index()] -= 1;
                self.placements += 1;
                (MoveKind::Place, self.in_mill(p as usize))
            }
            Move::Move { from, to } => {
                self.cells[from as usize] = 0;
                self.cells[to as usize] = own;
                (MoveKind::Relocate, self.in_mill(to as usize))
            }
            Move::Remove(p) => {
                self.cells[p as usize] = 0;
                (MoveKind::Remove, false)
            }
        };
        self.plies += 1;

        if formed_mill && self.on_board(me.opponent()) > 0 {
            self.phase = Phase::Capturing;
        } else {
            self.phase = self.settled_phase();
            self.to_move = me.opponent();
        }

        self.update_draw_counters(kind);
        Ok(())
    }

    /// Phase implied by the placement count and material.
    fn settled_phase(&self) -> Phase {
        if self.placements < self.rules.total_placements() {
            Phase::Placing
        } else if self.rules.flying_allowed()
            && (self.on_board(Player::One) <= self.rules.flying_threshold
                || self.on_board(Player::Two) <= self.rules.flying_threshold)
        {
            Phase::Flying
        } else {
            Phase::Moving
        }
    }

    fn update_draw_counters(&mut self, kind: MoveKind) {
        if kind != MoveKind::Relocate {
            self.rule50 = 0;
            self.history.clear();
            return;
        }
        self.rule50 += 1;
        let key = self.position_key();
        self.history.push(key);
        if self.rules.threefold_repetition {
            let seen = self.history.iter().filter(|&&k| k == key).count();
            if seen >= 3 {
                self.threefold = true;
            }
        }
    }

    /// Record a resignation by `player`.
    pub fn resign(&mut self, player: Player) {
        self.forfeit.get_or_insert(Forfeit {
            loser: player,
            reason: TerminalReason::Resigned,
        });
    }

    /// Record that `player` ran out of time.
    pub fn flag_timeout(&mut self, player: Player) {
        self.forfeit.get_or_insert(Forfeit {
            loser: player,
            reason: TerminalReason::TimedOut,
        });
    }

    /// Absolute position key over layout, phase and side to move. Used for
    /// repetition detection.
    pub fn position_key(&self) -> u64 {
        let mut key = 0u64;
        for &c in &self.cells {
            key = (key << 2) | cell_code(c);
        }
        key = (key << 2) | self.phase.index() as u64;
        (key << 1) | self.to_move.index() as u64
    }

    /// Cells from the perspective of the side to move: own `+1`, opponent `-1`.
    pub fn canonical_cells(&self) -> [i8; POINT_COUNT] {
        let sign = self.to_move.sign();
        let mut out = self.cells;
        for c in out.iter_mut() {
            *c *= sign;
        }
        out
    }

    /// Canonical search key. Mover-relative, and sensitive to phase, pieces
    /// in hand and draw bookkeeping so positions that only differ in those
    /// never share a node.
    pub fn canonical_key(&self) -> u64 {
        let mut packed = 0u64;
        for &c in &self.canonical_cells() {
            packed = (packed << 2) | cell_code(c);
        }
        packed = (packed << 2) | self.phase.index() as u64;
        // Full-width counters: hands are only bounded by `pieces_per_side`.
        let counters = ((self.rule50 as u64) << 17)
            | ((self.in_hand(self.to_move) as u64) << 9)
            | ((self.in_hand(self.to_move.opponent()) as u64) << 1)
            | self.threefold as u64;
        mix64(packed ^ mix64(counters.wrapping_add(0x9E37_79B9_7F4A_7C15)))
    }

    /// Evaluator input relative to the side to move.
    ///
    /// Layout: 24 own-piece flags, 24 opponent flags, 4 phase one-hot, own
    /// and opponent pieces in hand, own and opponent pieces on board (all
    /// divided by pieces per side), and the move-rule counter progress.
    pub fn observation(&self) -> Vec<f32> {
        let me = self.to_move;
        let opp = me.opponent();
        let per_side = self.rules.pieces_per_side.max(1) as f32;
        let canonical = self.canonical_cells();

        let mut obs = Vec::with_capacity(OBS_SIZE);
        obs.extend(canonical.iter().map(|&c| (c == 1) as u8 as f32));
        obs.extend(canonical.iter().map(|&c| (c == -1) as u8 as f32));
        let mut phase = [0.0f32; 4];
        phase[self.phase.index()] = 1.0;
        obs.extend_from_slice(&phase);
        obs.push(self.in_hand(me) as f32 / per_side);
        obs.push(self.in_hand(opp) as f32 / per_side);
        obs.push(self.on_board(me) as f32 / per_side);
        obs.push(self.on_board(opp) as f32 / per_side);
        obs.push((self.rule50 as f32 / self.rules.n_move_rule.max(1) as f32).min(1.0));
        obs
    }
}

/// Length of [`Board::observation`].
pub const OBS_SIZE: usize = POINT_COUNT * 2 + 4 + 5;

#[inline]
fn cell_code(c: i8) -> u64 {
    match c {
        1 => 1,
        -1 => 2,
        _ => 0,
    }
}

/// splitmix64 finaliser.
#[inline]
fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const W: usize = 13;
        let mut grid = [[b' '; W]; 7];
        for (a, neighbours) in ADJACENT.iter().enumerate() {
            let (ax, ay) = POINTS[a];
            for &b in neighbours.iter().filter(|&&b| b > a) {
                let (bx, by) = POINTS[b];
                if ay == by {
                    for col in (ax as usize * 2 + 1)..(bx as usize * 2) {
                        grid[ay as usize][col] = b'-';
                    }
                } else {
                    for row in (ay as usize + 1)..(by as usize) {
                        grid[row][ax as usize * 2] = b'|';
                    }
                }
            }
        }
        for (p, &(x, y)) in POINTS.iter().enumerate() {
            grid[y as usize][x as usize * 2] = match self.cells[p] {
                1 => b'W',
                -1 => b'B',
                _ => b'.',
            };
        }
        for (y, row) in grid.iter().enumerate() {
            writeln!(f, "{} {}", 7 - y, String::from_utf8_lossy(row).trim_end())?;
        }
        writeln!(f, "  a b c d e f g")?;
        write!(
            f,
            "{:?} to move, phase {:?}, in hand {}/{}",
            self.to_move, self.phase, self.in_hand[0], self.in_hand[1]
        )
    }
}
