//! Trainer contract and the built-in frequency model.
//!
//! The coordinator only needs something that turns examples into a new
//! evaluator snapshot. `FrequencyTrainer` is a tabular stand-in for a
//! network: per phase label it keeps the mean policy target and the mean
//! value target, blended with the previous snapshot.

use crate::samples::TrainingExample;
use anyhow::{anyhow, Context, Result};
use engine_core::ActionMask;
use games_mill::{Rules, NUM_ACTIONS, OBS_SIZE, POINT_COUNT};
use mcts::{EvalResult, Evaluator, EvaluatorError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Distinct phase labels carried by training examples.
pub const PHASE_LABELS: usize = 5;

/// Produces a new evaluator snapshot from the current one and a batch of
/// training examples.
pub trait Trainer: Send {
    type Model: Evaluator + Clone + Serialize + DeserializeOwned + 'static;

    /// Snapshot used before any training has happened.
    fn initial(&self) -> Self::Model;

    fn train(&mut self, current: &Self::Model, examples: &[TrainingExample])
        -> Result<Self::Model>;
}

/// Tabular evaluator keyed by phase label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyModel {
    /// Number of training rounds that produced this snapshot.
    pub generation: u32,
    /// Mean policy target per phase label.
    pub policies: Vec<Vec<f32>>,
    /// Mean value target per phase label.
    pub values: Vec<f32>,
    /// Examples seen per phase label, across generations.
    pub samples: Vec<u64>,
}

impl Default for FrequencyModel {
    fn default() -> Self {
        Self::uniform()
    }
}

impl FrequencyModel {
    /// Untrained model: uniform priors, neutral values.
    pub fn uniform() -> Self {
        Self {
            generation: 0,
            policies: vec![vec![0.0; NUM_ACTIONS]; PHASE_LABELS],
            values: vec![0.0; PHASE_LABELS],
            samples: vec![0; PHASE_LABELS],
        }
    }

    fn check_shape(&self) -> Result<()> {
        if self.policies.len() != PHASE_LABELS
            || self.values.len() != PHASE_LABELS
            || self.samples.len() != PHASE_LABELS
            || self.policies.iter().any(|p| p.len() != NUM_ACTIONS)
        {
            return Err(anyhow!("model tables do not match the mill action space"));
        }
        Ok(())
    }

    /// Write the snapshot as JSON (write-then-rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        save_snapshot(self, path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let model: Self = load_snapshot(path)?;
        model.check_shape()?;
        Ok(model)
    }
}

/// Recover the phase label from an observation vector.
///
/// The observation carries the phase one-hot and the mover's on-board count;
/// a Flying position whose mover still has more pieces than the flying
/// threshold is the grounded-flyer label.
pub fn phase_label_from_observation(obs: &[f32]) -> Option<usize> {
    if obs.len() != OBS_SIZE {
        return None;
    }
    let phase_base = POINT_COUNT * 2;
    let phase = (0..4).find(|&i| obs[phase_base + i] > 0.5)?;
    if phase == 2 {
        let rules = Rules::default();
        let own_on_board = (obs[phase_base + 6] * rules.pieces_per_side as f32).round() as u8;
        if own_on_board > rules.flying_threshold {
            return Some(4);
        }
    }
    Some(phase)
}

impl Evaluator for FrequencyModel {
    fn evaluate(&self, obs: &[f32], legal: &ActionMask) -> Result<EvalResult, EvaluatorError> {
        let label = phase_label_from_observation(obs).ok_or_else(|| {
            EvaluatorError::InvalidOutput(format!(
                "observation of length {} has no phase one-hot",
                obs.len()
            ))
        })?;
        if legal.len() != NUM_ACTIONS {
            return Err(EvaluatorError::InvalidOutput(format!(
                "mask of length {} does not match the model",
                legal.len()
            )));
        }

        // Mass on illegal actions is dropped by the search; an all-zero row
        // falls back to uniform priors there.
        Ok(EvalResult {
            policy: self.policies[label].clone(),
            value: self.values[label].clamp(-1.0, 1.0),
        })
    }
}

/// Trainer for [`FrequencyModel`].
#[derive(Debug, Clone)]
pub struct FrequencyTrainer {
    /// Weight of the previous snapshot, in examples, when blending.
    pub inertia: f32,
}

impl Default for FrequencyTrainer {
    fn default() -> Self {
        Self { inertia: 16.0 }
    }
}

impl Trainer for FrequencyTrainer {
    type Model = FrequencyModel;

    fn initial(&self) -> FrequencyModel {
        FrequencyModel::uniform()
    }

    fn train(
        &mut self,
        current: &FrequencyModel,
        examples: &[TrainingExample],
    ) -> Result<FrequencyModel> {
        if examples.is_empty() {
            return Err(anyhow!("no training examples"));
        }
        current.check_shape()?;

        let mut policy_sums = vec![vec![0.0f64; NUM_ACTIONS]; PHASE_LABELS];
        let mut value_sums = vec![0.0f64; PHASE_LABELS];
        let mut counts = vec![0u64; PHASE_LABELS];

        for example in examples {
            let label = example.phase as usize;
            if label >= PHASE_LABELS || example.policy.len() != NUM_ACTIONS {
                return Err(anyhow!(
                    "malformed example: phase {} with policy of length {}",
                    example.phase,
                    example.policy.len()
                ));
            }
            for (sum, &p) in policy_sums[label].iter_mut().zip(&example.policy) {
                *sum += p as f64;
            }
            value_sums[label] += example.value as f64;
            counts[label] += 1;
        }

        let mut next = current.clone();
        next.generation = current.generation + 1;
        let inertia = self.inertia.max(0.0) as f64;

        for label in 0..PHASE_LABELS {
            let n = counts[label] as f64;
            if n == 0.0 {
                continue;
            }
            let denom = n + inertia;
            for (a, slot) in next.policies[label].iter_mut().enumerate() {
                *slot = ((policy_sums[label][a] + inertia * current.policies[label][a] as f64)
                    / denom) as f32;
            }
            next.values[label] =
                ((value_sums[label] + inertia * current.values[label] as f64) / denom) as f32;
            next.samples[label] += counts[label];
        }

        Ok(next)
    }
}

/// Write any serializable snapshot as pretty JSON via a temp file and
/// rename.
pub fn save_snapshot<M: Serialize>(model: &M, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(model).context("failed to serialize model")?;

    let temp_path = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("failed to create {}", temp_path.display()))?;
        file.write_all(json.as_bytes())?;
    }
    fs::rename(&temp_path, path)
        .with_context(|| format!("failed to move model into {}", path.display()))?;
    Ok(())
}

pub fn load_snapshot<M: DeserializeOwned>(path: &Path) -> Result<M> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read model {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse model {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::{Game, Player};
    use games_mill::{Board, MillGame};
    use tempfile::tempdir;

    fn example(phase: u8, action: usize, value: f32) -> TrainingExample {
        let mut policy = vec![0.0; NUM_ACTIONS];
        policy[action] = 1.0;
        TrainingExample {
            board: [0; POINT_COUNT],
            mover: Player::One,
            policy,
            phase,
            value,
        }
    }

    #[test]
    fn test_phase_label_from_observation() {
        let game = MillGame::default();
        let board = game.initial_state();
        assert_eq!(phase_label_from_observation(&board.observation()), Some(0));
        assert_eq!(phase_label_from_observation(&[0.0; 3]), None);
    }

    #[test]
    fn test_grounded_flyer_label() {
        let rules = Rules::default();
        let mut cells = [0i8; POINT_COUNT];
        for p in [0, 1, 3, 5] {
            cells[p] = 1;
        }
        for p in [20, 21, 23] {
            cells[p] = -1;
        }
        // Black flies; white, with four pieces, is the grounded side.
        let board = Board::from_position(
            rules,
            cells,
            Player::One,
            games_mill::Phase::Flying,
            [0, 0],
        )
        .unwrap();
        assert_eq!(board.phase_label(), 4);
        assert_eq!(phase_label_from_observation(&board.observation()), Some(4));
    }

    #[test]
    fn test_uniform_model_evaluates_neutral() {
        let game = MillGame::default();
        let board = game.initial_state();
        let model = FrequencyModel::uniform();
        let result = model
            .evaluate(&board.observation(), &game.legal_mask(&board))
            .unwrap();
        assert_eq!(result.policy.len(), NUM_ACTIONS);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn test_train_averages_targets_per_phase() {
        let mut trainer = FrequencyTrainer { inertia: 0.0 };
        let current = trainer.initial();
        let examples = vec![example(0, 3, 1.0), example(0, 5, -0.5), example(1, 30, 0.25)];

        let next = trainer.train(&current, &examples).unwrap();
        assert_eq!(next.generation, 1);
        assert!((next.policies[0][3] - 0.5).abs() < 1e-6);
        assert!((next.policies[0][5] - 0.5).abs() < 1e-6);
        assert!((next.values[0] - 0.25).abs() < 1e-6);
        assert!((next.values[1] - 0.25).abs() < 1e-6);
        assert_eq!(next.samples, vec![2, 1, 0, 0, 0]);
        // Untouched labels keep the previous snapshot.
        assert_eq!(next.values[2], 0.0);
    }

    #[test]
    fn test_train_blends_with_previous() {
        let mut trainer = FrequencyTrainer { inertia: 1.0 };
        let mut current = FrequencyModel::uniform();
        current.values[0] = 1.0;

        let next = trainer.train(&current, &[example(0, 3, -1.0)]).unwrap();
        assert!(next.values[0].abs() < 1e-6);
        assert!((next.policies[0][3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_train_rejects_empty_and_malformed() {
        let mut trainer = FrequencyTrainer::default();
        let current = trainer.initial();
        assert!(trainer.train(&current, &[]).is_err());

        let mut bad = example(0, 0, 0.0);
        bad.phase = 9;
        assert!(trainer.train(&current, &[bad]).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("models").join("best.json");

        let mut trainer = FrequencyTrainer::default();
        let initial = trainer.initial();
        let model = trainer.train(&initial, &[example(2, 100, 0.5)]).unwrap();
        model.save(&path).unwrap();

        let loaded = FrequencyModel::load(&path).unwrap();
        assert_eq!(loaded, model);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_rejects_wrong_shape() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let mut model = FrequencyModel::uniform();
        model.values.pop();
        save_snapshot(&model, &path).unwrap();
        assert!(FrequencyModel::load(&path).is_err());
    }
}
