//! Evaluator trait for position evaluation.
//!
//! The evaluator provides a policy (cell probabilities) and a value
//! estimate for encoded board tensors. In self-play this is a neural
//! network; for testing, [`UniformEvaluator`] returns equal priors and a
//! fixed value.

use thiserror::Error;

/// Errors that can occur during evaluation.
#[derive(Debug, Error)]
pub enum EvaluatorError {
    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model error: {0}")]
    ModelError(String),
}

/// Result of evaluating one encoded position.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalResult {
    /// Probability distribution over every cell (index = action).
    /// Occupied cells may carry mass; the tree restricts priors to legal
    /// actions and renormalizes.
    pub policy: Vec<f32>,

    /// Value estimate for the player to move.
    /// Range: -1.0 (certain loss) to +1.0 (certain win).
    pub value: f32,
}

/// Trait for position evaluators.
///
/// Inputs are flattened `(history_depth + 1) x N x N` tensors produced by
/// [`crate::encoding::encode_node`]. Implementations must return results
/// in input order.
pub trait Evaluator: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "evaluator"
    }

    /// Evaluate a single encoded position.
    fn evaluate(&self, input: &[f32], num_actions: usize) -> Result<EvalResult, EvaluatorError>;

    /// Batch evaluate encoded positions.
    /// Default implementation calls evaluate() in a loop.
    fn evaluate_batch(
        &self,
        inputs: &[&[f32]],
        num_actions: usize,
    ) -> Result<Vec<EvalResult>, EvaluatorError> {
        inputs
            .iter()
            .map(|input| self.evaluate(input, num_actions))
            .collect()
    }
}

/// Evaluator that assigns equal probability to every cell and a constant
/// value to every position. Useful for testing MCTS without a model.
#[derive(Debug, Clone, Default)]
pub struct UniformEvaluator {
    value: f32,
}

impl UniformEvaluator {
    pub fn new() -> Self {
        Self { value: 0.0 }
    }

    /// Uniform policy, but every position is valued `value` for the mover.
    pub fn with_value(value: f32) -> Self {
        Self {
            value: value.clamp(-1.0, 1.0),
        }
    }
}

impl Evaluator for UniformEvaluator {
    fn name(&self) -> &str {
        "uniform"
    }

    fn evaluate(&self, _input: &[f32], num_actions: usize) -> Result<EvalResult, EvaluatorError> {
        if num_actions == 0 {
            return Err(EvaluatorError::InvalidInput(
                "num_actions must be positive".to_string(),
            ));
        }
        let prob = 1.0 / num_actions as f32;
        Ok(EvalResult {
            policy: vec![prob; num_actions],
            value: self.value,
        })
    }
}
