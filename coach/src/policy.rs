//! Players that can take part in an arena game or a self-play episode.

use crate::oracle::Oracle;
use anyhow::{anyhow, Context, Result};
use engine_core::Game;
use games_mill::{move_to_action, parse_move, Board, MillGame, Phase};
use mcts::{Evaluator, MctsConfig, MctsSearch};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::debug;

/// What a policy wants to do on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Play(usize),
    Resign,
}

/// A player, dispatched by variant.
pub enum Policy {
    /// MCTS guided by an evaluator. The search graph is carried from move to
    /// move and re-rooted on every observed action.
    SearchBacked {
        search: MctsSearch<MillGame>,
        evaluator: Arc<dyn Evaluator>,
        rng: ChaCha20Rng,
    },
    /// One-ply greedy on material, preferring immediate wins.
    HeuristicScored,
    /// First optimal move of an oracle, random legal move when the oracle
    /// has nothing to say.
    ExternalEngine {
        oracle: Arc<dyn Oracle>,
        rng: ChaCha20Rng,
    },
    /// Moves typed in notation; `resign` gives up.
    Human {
        input: Box<dyn BufRead + Send>,
        output: Box<dyn Write + Send>,
    },
    Random {
        rng: ChaCha20Rng,
    },
}

impl std::fmt::Debug for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Policy").field("kind", &self.name()).finish()
    }
}

impl Policy {
    pub fn search_backed(evaluator: Arc<dyn Evaluator>, config: MctsConfig, seed: u64) -> Self {
        Policy::SearchBacked {
            search: MctsSearch::new(config),
            evaluator,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn heuristic() -> Self {
        Policy::HeuristicScored
    }

    pub fn external(oracle: Arc<dyn Oracle>, seed: u64) -> Self {
        Policy::ExternalEngine {
            oracle,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn human(input: Box<dyn BufRead + Send>, output: Box<dyn Write + Send>) -> Self {
        Policy::Human { input, output }
    }

    /// Human player on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::human(
            Box::new(std::io::BufReader::new(std::io::stdin())),
            Box::new(std::io::stdout()),
        )
    }

    pub fn random(seed: u64) -> Self {
        Policy::Random {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Policy::SearchBacked { .. } => "mcts",
            Policy::HeuristicScored => "greedy",
            Policy::ExternalEngine { .. } => "oracle",
            Policy::Human { .. } => "human",
            Policy::Random { .. } => "random",
        }
    }

    /// Whether the policy must run on the calling thread alone.
    pub fn device_bound(&self) -> bool {
        match self {
            Policy::SearchBacked { evaluator, .. } => evaluator.device_bound(),
            Policy::Human { .. } => true,
            _ => false,
        }
    }

    /// Choose a move for the side to move on `board`.
    pub fn decide(&mut self, game: &MillGame, board: &Board) -> Result<Decision> {
        match self {
            Policy::SearchBacked {
                search,
                evaluator,
                rng,
            } => {
                let result = search
                    .run(game, &**evaluator, board, rng)
                    .context("search failed")?;
                Ok(Decision::Play(result.action))
            }
            Policy::HeuristicScored => greedy_action(game, board).map(Decision::Play),
            Policy::ExternalEngine { oracle, rng } => {
                match oracle.best_moves(board, board.to_move()) {
                    Ok(moves) => {
                        if let Some(mv) = moves.into_iter().find(|&mv| board.is_legal(mv)) {
                            return Ok(Decision::Play(move_to_action(mv)));
                        }
                        debug!("Oracle offered no legal move, playing randomly");
                    }
                    Err(e) => debug!(error = %e, "Oracle failed, playing randomly"),
                }
                random_action(game, board, rng).map(Decision::Play)
            }
            Policy::Human { input, output } => {
                ask_human(game, board, input.as_mut(), output.as_mut())
            }
            Policy::Random { rng } => random_action(game, board, rng).map(Decision::Play),
        }
    }

    /// Tell the policy that `action` was played, by either side.
    pub fn observe(&mut self, action: usize) {
        if let Policy::SearchBacked { search, .. } = self {
            search.advance(action);
        }
    }

    /// Forget per-game state before a new game.
    pub fn reset(&mut self) {
        if let Policy::SearchBacked { search, .. } = self {
            search.reset();
        }
    }
}

fn random_action(game: &MillGame, board: &Board, rng: &mut ChaCha20Rng) -> Result<usize> {
    let legal: Vec<usize> = game.legal_mask(board).iter_ones().collect();
    legal
        .choose(rng)
        .copied()
        .ok_or_else(|| anyhow!("no legal moves in {:?} phase", board.phase()))
}

/// Score of the position after a move, for the side that made it.
fn score_after(next: &Board, mover: engine_core::Player) -> f32 {
    if let Some(terminal) = next.check_terminal(mover) {
        return terminal.value * 100.0;
    }
    let mut score = next.material_diff(mover) as f32;
    if next.phase() == Phase::Capturing && next.to_move() == mover {
        score += 0.5;
    }
    score
}

/// Highest-scoring legal move; the lowest action wins ties.
fn greedy_action(game: &MillGame, board: &Board) -> Result<usize> {
    let mover = board.to_move();
    let mut best: Option<(usize, f32)> = None;
    for action in game.legal_mask(board).iter_ones() {
        let next = game.apply(board, action)?;
        let score = score_after(&next, mover);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((action, score));
        }
    }
    best.map(|(action, _)| action)
        .ok_or_else(|| anyhow!("no legal moves in {:?} phase", board.phase()))
}

fn ask_human(
    game: &MillGame,
    board: &Board,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<Decision> {
    let legal = game.legal_mask(board);
    let tokens: Vec<String> = board.legal_moves().iter().map(|mv| mv.to_string()).collect();

    writeln!(output, "{board}")?;
    writeln!(output, "Legal moves: {}", tokens.join(" "))?;

    loop {
        write!(output, "{:?} to move> ", board.to_move())?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output, "Input closed, resigning")?;
            return Ok(Decision::Resign);
        }
        let token = line.trim();
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case("resign") {
            return Ok(Decision::Resign);
        }

        match parse_move(board.phase(), token) {
            Ok(mv) => {
                let action = move_to_action(mv);
                if legal.contains(action) {
                    return Ok(Decision::Play(action));
                }
                writeln!(output, "{mv} is not legal here")?;
            }
            Err(e) => writeln!(output, "{e}")?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::testing::{FirstMoveOracle, OfflineOracle};
    use crate::oracle::Wdl;
    use engine_core::Player;
    use games_mill::{Rules, POINT_COUNT};
    use mcts::UniformEvaluator;
    use std::io::Cursor;

    fn position(white: &[usize], black: &[usize], phase: Phase) -> Board {
        let mut cells = [0i8; POINT_COUNT];
        for &p in white {
            cells[p] = 1;
        }
        for &p in black {
            cells[p] = -1;
        }
        Board::from_position(Rules::default(), cells, Player::One, phase, [0, 0]).unwrap()
    }

    fn human(script: &str) -> Policy {
        Policy::human(
            Box::new(Cursor::new(script.as_bytes().to_vec())),
            Box::new(std::io::sink()),
        )
    }

    fn play(policy: &mut Policy, game: &MillGame, board: &Board) -> usize {
        match policy.decide(game, board).unwrap() {
            Decision::Play(action) => action,
            Decision::Resign => panic!("unexpected resignation"),
        }
    }

    #[test]
    fn test_random_plays_legal_moves() {
        let game = MillGame::default();
        let mut board = game.initial_state();
        let mut policy = Policy::random(3);
        for _ in 0..30 {
            if board.is_over() {
                break;
            }
            let action = play(&mut policy, &game, &board);
            assert!(game.legal_mask(&board).contains(action));
            board = game.apply(&board, action).unwrap();
        }
    }

    #[test]
    fn test_greedy_closes_mill() {
        let game = MillGame::default();
        let board = position(&[0, 9, 22, 6], &[1, 10, 19], Phase::Flying);
        let action = play(&mut Policy::heuristic(), &game, &board);
        let next = game.apply(&board, action).unwrap();
        assert_eq!(next.phase(), Phase::Capturing);
        assert_eq!(next.to_move(), Player::One);
    }

    #[test]
    fn test_greedy_takes_winning_capture() {
        let game = MillGame::default();
        let board = position(&[0, 9, 21, 6], &[1, 10, 19], Phase::Capturing);
        let action = play(&mut Policy::heuristic(), &game, &board);
        let next = game.apply(&board, action).unwrap();
        let terminal = next.check_terminal(Player::One).unwrap();
        assert_eq!(terminal.winner, Some(Player::One));
    }

    #[test]
    fn test_greedy_is_deterministic() {
        let game = MillGame::default();
        let board = game.initial_state();
        let a = play(&mut Policy::heuristic(), &game, &board);
        let b = play(&mut Policy::heuristic(), &game, &board);
        assert_eq!(a, b);
    }

    #[test]
    fn test_search_backed_reuses_tree() {
        let game = MillGame::default();
        let board = game.initial_state();
        let mut policy = Policy::search_backed(
            Arc::new(UniformEvaluator::new()),
            MctsConfig::for_testing().with_simulations(60),
            11,
        );

        let action = play(&mut policy, &game, &board);
        assert!(game.legal_mask(&board).contains(action));
        policy.observe(action);

        if let Policy::SearchBacked { search, .. } = &policy {
            let tree = search.tree().expect("tree kept after advance");
            assert!(tree.get(tree.root()).visit_count > 0);
        }

        policy.reset();
        if let Policy::SearchBacked { search, .. } = &policy {
            assert!(search.tree().is_none());
        }
    }

    #[test]
    fn test_human_retries_until_legal() {
        let game = MillGame::default();
        let board = game.initial_state();
        let mut policy = human("zz\na1-a4\nd6\n");
        let action = play(&mut policy, &game, &board);
        let expected = move_to_action(parse_move(Phase::Placing, "d6").unwrap());
        assert_eq!(action, expected);
    }

    #[test]
    fn test_human_resigns() {
        let game = MillGame::default();
        let board = game.initial_state();
        assert_eq!(
            human("\nresign\n").decide(&game, &board).unwrap(),
            Decision::Resign
        );
        assert_eq!(human("").decide(&game, &board).unwrap(), Decision::Resign);
    }

    #[test]
    fn test_external_engine_follows_oracle() {
        let game = MillGame::default();
        let board = game.initial_state();
        let mut policy = Policy::external(Arc::new(FirstMoveOracle { wdl: Wdl::Draw }), 1);
        assert_eq!(play(&mut policy, &game, &board), 0);
    }

    #[test]
    fn test_external_engine_falls_back_when_offline() {
        let game = MillGame::default();
        let board = game.initial_state();
        let mut policy = Policy::external(Arc::new(OfflineOracle), 1);
        let action = play(&mut policy, &game, &board);
        assert!(game.legal_mask(&board).contains(action));
    }

    #[test]
    fn test_device_bound() {
        assert!(human("").device_bound());
        assert!(!Policy::random(0).device_bound());
        assert!(!Policy::heuristic().device_bound());
    }
}
