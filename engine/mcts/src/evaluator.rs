//! Evaluator trait for position evaluation.
//!
//! The evaluator provides policy (action probabilities) and value estimates
//! for game states. In training this is a learned model; for testing we
//! provide a uniform evaluator that returns equal priors.

use engine_core::ActionMask;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Clone, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),

    #[error("Non-finite output: {0}")]
    NonFinite(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// Result of evaluating a game state.
#[derive(Debug, Clone)]
pub struct EvalResult {
    /// Policy: probability distribution over actions.
    /// Index i corresponds to action i. Illegal entries are ignored.
    pub policy: Vec<f32>,

    /// Value estimate for the side to move.
    /// Range: -1.0 (certain loss) to +1.0 (certain win).
    pub value: f32,
}

impl EvalResult {
    /// Check shape and finiteness before the result touches the tree.
    pub fn validated(self, num_actions: usize) -> Result<Self, EvaluatorError> {
        if self.policy.len() != num_actions {
            return Err(EvaluatorError::InvalidOutput(format!(
                "policy has {} entries, expected {}",
                self.policy.len(),
                num_actions
            )));
        }
        if !self.value.is_finite() {
            return Err(EvaluatorError::NonFinite(format!("value {}", self.value)));
        }
        if let Some(i) = self.policy.iter().position(|p| !p.is_finite()) {
            return Err(EvaluatorError::NonFinite(format!(
                "policy[{i}] = {}",
                self.policy[i]
            )));
        }
        Ok(self)
    }
}

/// Trait for position evaluators.
///
/// Implementations must be deterministic for identical weights and input.
pub trait Evaluator: Send + Sync {
    /// Evaluate a single observation.
    ///
    /// # Arguments
    /// * `obs` - Observation relative to the side to move
    /// * `legal` - Legal actions in the position; its width is the action space size
    ///
    /// # Returns
    /// Policy distribution and value estimate
    fn evaluate(&self, obs: &[f32], legal: &ActionMask) -> Result<EvalResult, EvaluatorError>;

    /// True when the evaluator holds device-resident state that must not be
    /// fanned out across worker threads.
    fn device_bound(&self) -> bool {
        false
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn evaluate(&self, obs: &[f32], legal: &ActionMask) -> Result<EvalResult, EvaluatorError> {
        (**self).evaluate(obs, legal)
    }

    fn device_bound(&self) -> bool {
        (**self).device_bound()
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&self, obs: &[f32], legal: &ActionMask) -> Result<EvalResult, EvaluatorError> {
        (**self).evaluate(obs, legal)
    }

    fn device_bound(&self) -> bool {
        (**self).device_bound()
    }
}

/// Uniform evaluator that assigns equal probability to all legal moves.
/// Value is always 0.0 (neutral). Useful for testing MCTS without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator;

impl UniformEvaluator {
    pub fn new() -> Self {
        Self
    }
}

/// Uniform distribution over the legal actions of `legal`.
pub fn uniform_policy(legal: &ActionMask) -> Vec<f32> {
    let mut policy = vec![0.0; legal.len()];
    let count = legal.count();
    if count == 0 {
        return policy;
    }
    let prob = 1.0 / count as f32;
    for action in legal.iter_ones() {
        policy[action] = prob;
    }
    policy
}

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, _obs: &[f32], legal: &ActionMask) -> Result<EvalResult, EvaluatorError> {
        Ok(EvalResult {
            policy: uniform_policy(legal),
            value: 0.0,
        })
    }
}
