//! Training examples and the bounded example history.

use engine_core::Player;
use games_mill::{Board, SymmetryTable, POINT_COUNT};
use std::collections::VecDeque;

/// One (position, policy target, value target) sample.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    /// Cells relative to the mover: own `+1`, opponent `-1`, empty `0`.
    pub board: [i8; POINT_COUNT],
    /// Side to move in the recorded position.
    pub mover: Player,
    /// Target distribution over the full action space.
    pub policy: Vec<f32>,
    /// Phase label (Placing 0, Moving 1, Flying 2, Capturing 3, grounded
    /// flyer 4).
    pub phase: u8,
    /// Final outcome from the mover's perspective. Zero until back-filled.
    pub value: f32,
}

/// Record a searched position under every board symmetry.
pub fn augment_position(
    symmetry: &SymmetryTable,
    board: &Board,
    policy: &[f32],
) -> Vec<TrainingExample> {
    let mover = board.to_move();
    let phase = board.phase_label();
    symmetry
        .augment(&board.canonical_cells(), policy, board.phase())
        .into_iter()
        .map(|(cells, policy)| TrainingExample {
            board: cells,
            mover,
            policy,
            phase,
            value: 0.0,
        })
        .collect()
}

/// Fill value targets once the episode is over.
///
/// `result` is the terminal scalar from `queried`'s perspective; examples
/// recorded for the other side get the negated value.
pub fn backfill_values(examples: &mut [TrainingExample], queried: Player, result: f32) {
    for example in examples {
        example.value = if example.mover == queried {
            result
        } else {
            -result
        };
    }
}

/// Keep only the `cap` most recent examples.
pub fn cap_examples(mut examples: Vec<TrainingExample>, cap: usize) -> Vec<TrainingExample> {
    if examples.len() > cap {
        examples.drain(..examples.len() - cap);
    }
    examples
}

/// Examples of the last few iterations, oldest first.
#[derive(Debug, Clone)]
pub struct ExampleHistory {
    window: usize,
    iterations: VecDeque<(u32, Vec<TrainingExample>)>,
}

impl ExampleHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            iterations: VecDeque::new(),
        }
    }

    /// Append one iteration, evicting the oldest once the window is full.
    /// Returns the evicted iteration numbers.
    pub fn push(&mut self, iteration: u32, examples: Vec<TrainingExample>) -> Vec<u32> {
        self.iterations.push_back((iteration, examples));
        let mut evicted = Vec::new();
        while self.iterations.len() > self.window {
            if let Some((old, _)) = self.iterations.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }

    /// Every retained example, oldest iteration first.
    pub fn examples(&self) -> Vec<TrainingExample> {
        self.iterations
            .iter()
            .flat_map(|(_, examples)| examples.iter().cloned())
            .collect()
    }

    pub fn total_examples(&self) -> usize {
        self.iterations.iter().map(|(_, e)| e.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }

    pub fn oldest_iteration(&self) -> Option<u32> {
        self.iterations.front().map(|(i, _)| *i)
    }

    pub fn latest_iteration(&self) -> Option<u32> {
        self.iterations.back().map(|(i, _)| *i)
    }
}
