//! MCTS configuration parameters.

use thiserror::Error;

/// Rejected configuration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("history_depth must be even and at least 2, got {0}")]
    HistoryDepth(usize),

    #[error("{name} must be finite and non-negative, got {value}")]
    NegativeBias { name: &'static str, value: f32 },

    #[error("confidence_bound must lie in [0, 1), got {0}")]
    ConfidenceBound(f32),
}

/// Configuration for batched Monte Carlo Tree Search.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Simulation rounds run before every committed move.
    pub num_simulations: u32,

    /// Weight of the UCT term `sqrt(2 ln N_parent / N_child)`.
    pub exploration_bias: f32,

    /// Weight of the evaluator's prior for the child.
    pub policy_bias: f32,

    /// Weight of the child's mean evaluation.
    pub value_bias: f32,

    /// Plies of history fed to the evaluator (channels = depth + 1).
    pub history_depth: usize,

    /// Largest batch handed to one evaluator call. 0 sends each round's
    /// batch in a single call.
    pub max_batch_size: usize,

    /// Worker threads for the environment pool. 0 uses the rayon default.
    pub num_threads: usize,

    /// Minimum visit share for a move to count as confident in reports.
    pub confidence_bound: f32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: 400,
            exploration_bias: 1.42,
            policy_bias: 1.0,
            value_bias: 1.0,
            history_depth: 8,
            max_batch_size: 0,
            num_threads: 0,
            confidence_bound: 0.5,
        }
    }
}

impl MctsConfig {
    /// Config for self-play data generation.
    pub fn for_training() -> Self {
        Self::default()
    }

    /// Config for dueling two evaluators: fewer simulations per move.
    pub fn for_evaluation() -> Self {
        Self {
            num_simulations: 200,
            ..Self::default()
        }
    }

    /// Small, single-threaded config for tests.
    pub fn for_testing() -> Self {
        Self {
            num_simulations: 16,
            history_depth: 4,
            num_threads: 1,
            ..Self::default()
        }
    }

    pub fn with_simulations(mut self, n: u32) -> Self {
        self.num_simulations = n;
        self
    }

    pub fn with_exploration_bias(mut self, bias: f32) -> Self {
        self.exploration_bias = bias;
        self
    }

    pub fn with_policy_bias(mut self, bias: f32) -> Self {
        self.policy_bias = bias;
        self
    }

    pub fn with_value_bias(mut self, bias: f32) -> Self {
        self.value_bias = bias;
        self
    }

    pub fn with_history_depth(mut self, depth: usize) -> Self {
        self.history_depth = depth;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Number of evaluator input channels.
    #[inline]
    pub fn channels(&self) -> usize {
        self.history_depth + 1
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_depth < 2 || self.history_depth % 2 != 0 {
            return Err(ConfigError::HistoryDepth(self.history_depth));
        }
        for (name, value) in [
            ("exploration_bias", self.exploration_bias),
            ("policy_bias", self.policy_bias),
            ("value_bias", self.value_bias),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeBias { name, value });
            }
        }
        if !(0.0..1.0).contains(&self.confidence_bound) {
            return Err(ConfigError::ConfidenceBound(self.confidence_bound));
        }
        Ok(())
    }
}
