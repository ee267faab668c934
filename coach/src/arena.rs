//! Head-to-head matches between two policies.
//!
//! A match is played in two halves. In the first half competitor one moves
//! first; in the second half competitor two does, which cancels the
//! first-move advantage when the halves are summed. Games are classified by
//! terminal reason rather than by the size of the result, since draws carry
//! a small material bias.

use crate::policy::{Decision, Policy};
use crate::workers::{job_seed, WorkerPool};
use anyhow::{anyhow, Result};
use engine_core::{Game, Player};
use games_mill::{Board, MillGame, TerminalReason};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use mcts::SearchError;
use std::sync::atomic::AtomicBool;
use tracing::{debug, info, warn};

/// The two sides of a match, independent of who moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Competitor {
    One,
    Two,
}

impl Competitor {
    pub fn other(self) -> Self {
        match self {
            Competitor::One => Competitor::Two,
            Competitor::Two => Competitor::One,
        }
    }
}

/// How one game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// Decided by a rule (including resignation and timeout).
    Won(Player),
    /// Rule draw.
    Drawn,
    /// Cut off by the move cap.
    Capped,
    /// Curriculum early stop; the player ahead on the heuristic score, if any.
    Heuristic(Option<Player>),
}

impl GameOutcome {
    /// Classify a terminal result queried for the first player.
    pub fn classify(reason: TerminalReason, value_for_one: f32, winner: Option<Player>) -> Self {
        match reason {
            TerminalReason::MoveCap => GameOutcome::Capped,
            TerminalReason::Heuristic => GameOutcome::Heuristic(if value_for_one > 0.0 {
                Some(Player::One)
            } else if value_for_one < 0.0 {
                Some(Player::Two)
            } else {
                None
            }),
            r if r.is_draw() => GameOutcome::Drawn,
            _ => match winner {
                Some(player) => GameOutcome::Won(player),
                None => GameOutcome::Drawn,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameRecord {
    pub outcome: GameOutcome,
    pub reason: TerminalReason,
    pub plies: u32,
}

/// Heuristic early stops, split by the sign of the score. Never counted as
/// wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeuristicTally {
    pub one_ahead: u32,
    pub two_ahead: u32,
    pub even: u32,
}

impl HeuristicTally {
    pub fn total(&self) -> u32 {
        self.one_ahead + self.two_ahead + self.even
    }

    fn add(&mut self, other: &HeuristicTally) {
        self.one_ahead += other.one_ahead;
        self.two_ahead += other.two_ahead;
        self.even += other.even;
    }
}

/// Results of one half, in competitor terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfReport {
    pub games: u32,
    pub one_won: u32,
    pub two_won: u32,
    pub draws: u32,
    pub capped: u32,
    pub heuristic: HeuristicTally,
}

impl HalfReport {
    fn record(&mut self, outcome: GameOutcome, one_plays_as: Player) {
        let competitor = |player: Player| {
            if player == one_plays_as {
                Competitor::One
            } else {
                Competitor::Two
            }
        };
        self.games += 1;
        match outcome {
            GameOutcome::Won(player) => match competitor(player) {
                Competitor::One => self.one_won += 1,
                Competitor::Two => self.two_won += 1,
            },
            GameOutcome::Drawn => self.draws += 1,
            GameOutcome::Capped => self.capped += 1,
            GameOutcome::Heuristic(leader) => match leader.map(competitor) {
                Some(Competitor::One) => self.heuristic.one_ahead += 1,
                Some(Competitor::Two) => self.heuristic.two_ahead += 1,
                None => self.heuristic.even += 1,
            },
        }
    }
}

/// Aggregate match result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaReport {
    pub one_won: u32,
    pub two_won: u32,
    pub draws: u32,
    pub capped: u32,
    pub heuristic: HeuristicTally,
    /// Competitor one moves first.
    pub first_half: HalfReport,
    /// Competitor two moves first.
    pub second_half: HalfReport,
    /// Games whose results were lost with a crashed worker, or never played
    /// because the run was cancelled.
    pub unplayed: u32,
}

impl ArenaReport {
    fn from_halves(first_half: HalfReport, second_half: HalfReport, unplayed: u32) -> Self {
        let mut heuristic = first_half.heuristic;
        heuristic.add(&second_half.heuristic);
        Self {
            one_won: first_half.one_won + second_half.one_won,
            two_won: first_half.two_won + second_half.two_won,
            draws: first_half.draws + second_half.draws,
            capped: first_half.capped + second_half.capped,
            heuristic,
            first_half,
            second_half,
            unplayed,
        }
    }

    pub fn games(&self) -> u32 {
        self.first_half.games + self.second_half.games
    }

    /// Share of decided games won by competitor two, or `None` when no game
    /// was decided.
    pub fn two_win_rate(&self) -> Option<f64> {
        let decided = self.one_won + self.two_won;
        (decided > 0).then(|| self.two_won as f64 / decided as f64)
    }
}

impl std::fmt::Display for ArenaReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "games {}: one {} / two {} / draws {} / capped {} / heuristic {} (+{} -{} ={})",
            self.games(),
            self.one_won,
            self.two_won,
            self.draws,
            self.capped,
            self.heuristic.total(),
            self.heuristic.one_ahead,
            self.heuristic.two_ahead,
            self.heuristic.even
        )?;
        for (label, half) in [
            ("one first", &self.first_half),
            ("two first", &self.second_half),
        ] {
            writeln!(
                f,
                "  {label}: {} games, one {} / two {} / draws {} / capped {}",
                half.games, half.one_won, half.two_won, half.draws, half.capped
            )?;
        }
        if self.unplayed > 0 {
            writeln!(f, "  unplayed: {}", self.unplayed)?;
        }
        Ok(())
    }
}

/// Play one game to the end or to the move cap.
///
/// Both policies observe every move. An action outside the legality mask is
/// a bug and fails the game.
pub fn play_game(
    game: &MillGame,
    first: &mut Policy,
    second: &mut Policy,
    max_moves: u32,
) -> Result<GameRecord> {
    first.reset();
    second.reset();
    let mut board: Board = game.initial_state();
    let mut plies = 0u32;

    loop {
        if let Some(terminal) = board.check_terminal(Player::One) {
            return Ok(GameRecord {
                outcome: GameOutcome::classify(terminal.reason, terminal.value, terminal.winner),
                reason: terminal.reason,
                plies,
            });
        }
        if plies >= max_moves {
            return Ok(GameRecord {
                outcome: GameOutcome::Capped,
                reason: TerminalReason::MoveCap,
                plies,
            });
        }

        let mover = board.to_move();
        let policy = match mover {
            Player::One => &mut *first,
            Player::Two => &mut *second,
        };
        match policy.decide(game, &board)? {
            Decision::Play(action) => {
                if !game.legal_mask(&board).contains(action) {
                    return Err(anyhow!(
                        "{} policy chose illegal action {} in {:?} phase",
                        policy.name(),
                        action,
                        board.phase()
                    ));
                }
                board = game.apply(&board, action)?;
                first.observe(action);
                second.observe(action);
                plies += 1;
            }
            Decision::Resign => board.resign(mover),
        }
    }
}

/// Evaluator failures spoil one game; every other error is a bug.
fn is_evaluator_failure(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<SearchError>()
        .is_some_and(SearchError::is_evaluator_failure)
}

/// Which half a game index belongs to.
fn half_of(index: u32, first_half_games: u32) -> Competitor {
    if index < first_half_games {
        Competitor::One
    } else {
        Competitor::Two
    }
}

#[derive(Debug, Clone)]
pub struct Arena {
    game: MillGame,
    games: u32,
    workers: usize,
    max_moves: u32,
    seed: u64,
    retries: u32,
}

impl Arena {
    pub fn new(game: MillGame, games: u32, max_moves: u32, seed: u64) -> Self {
        Self {
            game,
            games,
            workers: 1,
            max_moves,
            seed,
            retries: 0,
        }
    }

    /// Replays allowed for a game whose evaluator fails. A game still failing
    /// after that is counted as unplayed.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Games in the half where competitor one moves first. An odd game goes
    /// to this half.
    pub fn first_half_games(&self) -> u32 {
        self.games / 2 + self.games % 2
    }

    /// Play the match.
    ///
    /// `make_policy(competitor, seed)` builds a fresh policy for one game,
    /// so each game is independent of scheduling.
    pub fn run<F>(
        &self,
        make_policy: F,
        cancel: &AtomicBool,
        progress: Option<&ProgressBar>,
    ) -> Result<ArenaReport>
    where
        F: Fn(Competitor, u64) -> Result<Policy> + Sync,
    {
        let first_half_games = self.first_half_games();
        let pool = WorkerPool::new(self.workers);
        info!(
            games = self.games,
            first_half = first_half_games,
            workers = pool.workers(),
            "Starting arena"
        );

        let outcome = pool.run(
            self.games as usize,
            cancel,
            |index| {
                let index = index as u32;
                let leader = half_of(index, first_half_games);
                let base = job_seed(self.seed, index as u64);
                for attempt in 0..=self.retries {
                    // Seeds 0 and 1 under `base` belong to the first attempt.
                    let attempt_seed = if attempt == 0 {
                        base
                    } else {
                        job_seed(base, attempt as u64 + 1)
                    };
                    let mut leading = make_policy(leader, job_seed(attempt_seed, 0))?;
                    let mut trailing = make_policy(leader.other(), job_seed(attempt_seed, 1))?;
                    match play_game(&self.game, &mut leading, &mut trailing, self.max_moves) {
                        Ok(record) => {
                            debug!(
                                game = index,
                                attempt,
                                reason = %record.reason,
                                plies = record.plies,
                                "Arena game finished"
                            );
                            return Ok(Some((leader, record)));
                        }
                        Err(e) if is_evaluator_failure(&e) => {
                            warn!(
                                game = index,
                                attempt,
                                retries = self.retries,
                                error = %format!("{e:#}"),
                                "Evaluator failed, replaying arena game"
                            );
                        }
                        Err(e) => return Err(e),
                    }
                }
                warn!(game = index, "Arena game abandoned after repeated evaluator failures");
                Ok(None)
            },
            |_| {
                if let Some(pb) = progress {
                    pb.inc(1);
                }
            },
        )?;

        let mut first_half = HalfReport::default();
        let mut second_half = HalfReport::default();
        let played = outcome.items.iter().filter_map(|(_, item)| item.as_ref());
        for (leader, record) in played {
            // Competitor one plays as the first player when it leads.
            match leader {
                Competitor::One => first_half.record(record.outcome, Player::One),
                Competitor::Two => second_half.record(record.outcome, Player::Two),
            }
        }

        let abandoned = outcome.items.iter().filter(|(_, item)| item.is_none()).count() as u32;
        let unplayed = self.games - outcome.items.len() as u32 + abandoned;
        let report = ArenaReport::from_halves(first_half, second_half, unplayed);
        info!(
            one_won = report.one_won,
            two_won = report.two_won,
            draws = report.draws,
            capped = report.capped,
            heuristic = report.heuristic.total(),
            unplayed,
            abandoned,
            "Arena finished"
        );
        Ok(report)
    }
}
