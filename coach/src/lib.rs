//! Coach - self-play training and evaluation for Nine Men's Morris.
//!
//! The coach drives the search engine from the outside:
//! 1. Plays self-play episodes in parallel with the current evaluator
//!    snapshot and turns them into symmetry-augmented training examples
//! 2. Trains a candidate snapshot over a sliding window of iterations
//! 3. Gates the candidate in an arena against the previous snapshot and
//!    keeps it only when it wins often enough
//!
//! Examples and gating decisions are stored in SQLite (`replay.db`), and a
//! JSON stats snapshot is written after every iteration.

pub mod arena;
pub mod commands;
pub mod config;
pub mod coordinator;
pub mod model;
pub mod oracle;
pub mod policy;
pub mod samples;
pub mod selfplay;
pub mod stats;
pub mod storage;
pub mod workers;

pub use arena::{Arena, ArenaReport, Competitor, GameOutcome};
pub use coordinator::{CoordinatorSettings, CoordinatorSummary, SelfPlayCoordinator};
pub use model::{FrequencyModel, FrequencyTrainer, Trainer};
pub use oracle::{Oracle, OracleError, OracleVerdict, Wdl};
pub use policy::{Decision, Policy};
pub use samples::TrainingExample;
