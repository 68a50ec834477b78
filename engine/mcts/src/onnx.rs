//! ONNX Runtime evaluator for neural network inference.
//!
//! # Model Format
//!
//! The ONNX model is expected to have:
//! - Input: "board" - shape (batch_size, history_depth + 1, N, N) float32
//! - Output: "policy_logits" - shape (batch_size, N * N) float32
//! - Output: "value" - shape (batch_size, 1) float32, mover's perspective
//!
//! Logits are turned into probabilities with a plain softmax over every
//! cell; the tree restricts them to legal moves.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use ndarray::Array4;
use ort::{session::Session, value::Value};
use tracing::debug;

use crate::evaluator::{EvalResult, Evaluator, EvaluatorError};

/// Inference counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct OnnxStats {
    pub positions: u64,
    pub calls: u64,
    pub total_time_us: u64,
}

impl OnnxStats {
    /// Mean wall time per position in milliseconds.
    pub fn avg_ms_per_position(&self) -> f64 {
        if self.positions == 0 {
            0.0
        } else {
            self.total_time_us as f64 / self.positions as f64 / 1000.0
        }
    }
}

/// ONNX Runtime evaluator that loads and runs neural network models.
///
/// Uses a Mutex internally because `Session::run` requires `&mut self`,
/// but the `Evaluator` trait uses `&self` for thread-safe sharing.
pub struct OnnxEvaluator {
    session: Mutex<Session>,
    name: String,
    board_size: usize,
    channels: usize,
    position_count: AtomicU64,
    call_count: AtomicU64,
    total_inference_time_us: AtomicU64,
}

impl std::fmt::Debug for OnnxEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEvaluator")
            .field("name", &self.name)
            .field("board_size", &self.board_size)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

impl OnnxEvaluator {
    /// Load an ONNX model from the given path.
    ///
    /// # Arguments
    /// * `model_path` - Path to the .onnx model file
    /// * `board_size` - Board edge length N
    /// * `channels` - Input planes, `history_depth + 1`
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        board_size: usize,
        channels: usize,
    ) -> Result<Self, EvaluatorError> {
        let path = model_path.as_ref();
        let session = Session::builder()
            .map_err(|e| {
                EvaluatorError::ModelError(format!("Failed to create session builder: {}", e))
            })?
            .with_intra_threads(4)
            .map_err(|e| EvaluatorError::ModelError(format!("Failed to set intra threads: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| {
                EvaluatorError::ModelError(format!("Failed to load {}: {}", path.display(), e))
            })?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        Ok(Self {
            session: Mutex::new(session),
            name,
            board_size,
            channels,
            position_count: AtomicU64::new(0),
            call_count: AtomicU64::new(0),
            total_inference_time_us: AtomicU64::new(0),
        })
    }

    /// Snapshot of the inference counters.
    pub fn stats(&self) -> OnnxStats {
        OnnxStats {
            positions: self.position_count.load(Ordering::Relaxed),
            calls: self.call_count.load(Ordering::Relaxed),
            total_time_us: self.total_inference_time_us.load(Ordering::Relaxed),
        }
    }

    fn input_len(&self) -> usize {
        self.channels * self.board_size * self.board_size
    }

    /// Numerically stable softmax over all logits.
    fn softmax(logits: &[f32]) -> Vec<f32> {
        let max_logit = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if !max_logit.is_finite() {
            return vec![0.0; logits.len()];
        }

        let mut exp_values: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
        let exp_sum: f32 = exp_values.iter().sum();
        if exp_sum > 0.0 {
            for v in &mut exp_values {
                *v /= exp_sum;
            }
        }
        exp_values
    }

    fn record(&self, positions: u64, elapsed_us: u64) {
        self.total_inference_time_us
            .fetch_add(elapsed_us, Ordering::Relaxed);
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let before = self.position_count.fetch_add(positions, Ordering::Relaxed);
        let after = before + positions;

        // Log stats roughly every 10,000 positions
        if before / 10_000 != after / 10_000 {
            let stats = self.stats();
            debug!(
                model = %self.name,
                positions = stats.positions,
                calls = stats.calls,
                avg_ms = stats.avg_ms_per_position(),
                "ONNX inference stats"
            );
        }
    }
}

impl Evaluator for OnnxEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, input: &[f32], num_actions: usize) -> Result<EvalResult, EvaluatorError> {
        let mut results = self.evaluate_batch(&[input], num_actions)?;
        results
            .pop()
            .ok_or_else(|| EvaluatorError::EvaluationFailed("Empty model output".to_string()))
    }

    fn evaluate_batch(
        &self,
        inputs: &[&[f32]],
        num_actions: usize,
    ) -> Result<Vec<EvalResult>, EvaluatorError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        if num_actions != self.board_size * self.board_size {
            return Err(EvaluatorError::InvalidInput(format!(
                "Model expects {} actions, got {}",
                self.board_size * self.board_size,
                num_actions
            )));
        }

        let batch_size = inputs.len();
        let input_len = self.input_len();
        let mut flat = Vec::with_capacity(batch_size * input_len);
        for input in inputs {
            if input.len() != input_len {
                return Err(EvaluatorError::InvalidInput(format!(
                    "Expected {} floats per position, got {}",
                    input_len,
                    input.len()
                )));
            }
            flat.extend_from_slice(input);
        }

        let input_array = Array4::from_shape_vec(
            (batch_size, self.channels, self.board_size, self.board_size),
            flat,
        )
        .map_err(|e| EvaluatorError::InvalidInput(format!("Failed to shape input: {}", e)))?;

        let input_value = Value::from_array(input_array).map_err(|e| {
            EvaluatorError::ModelError(format!("Failed to create input tensor: {}", e))
        })?;

        // Run inference - extract all data inside the lock scope
        let inference_start = Instant::now();
        let (policy_flat, values) = {
            let mut session = self.session.lock().map_err(|e| {
                EvaluatorError::EvaluationFailed(format!("Failed to acquire session lock: {}", e))
            })?;
            let outputs = session
                .run(ort::inputs!["board" => input_value])
                .map_err(|e| {
                    EvaluatorError::EvaluationFailed(format!("Batch inference failed: {}", e))
                })?;

            let policy_output = outputs.get("policy_logits").ok_or_else(|| {
                EvaluatorError::ModelError("Missing policy_logits output".to_string())
            })?;
            let (_shape, policy_data) = policy_output.try_extract_tensor::<f32>().map_err(|e| {
                EvaluatorError::ModelError(format!("Failed to extract policy tensor: {}", e))
            })?;

            let value_output = outputs
                .get("value")
                .ok_or_else(|| EvaluatorError::ModelError("Missing value output".to_string()))?;
            let (_shape, value_data) = value_output.try_extract_tensor::<f32>().map_err(|e| {
                EvaluatorError::ModelError(format!("Failed to extract value tensor: {}", e))
            })?;

            (policy_data.to_vec(), value_data.to_vec())
        };
        self.record(
            batch_size as u64,
            inference_start.elapsed().as_micros() as u64,
        );

        if policy_flat.len() != batch_size * num_actions || values.len() < batch_size {
            return Err(EvaluatorError::ModelError(format!(
                "Unexpected output sizes: policy {}, value {} for batch {}",
                policy_flat.len(),
                values.len(),
                batch_size
            )));
        }

        Ok(policy_flat
            .chunks_exact(num_actions)
            .zip(values)
            .map(|(logits, value)| EvalResult {
                policy: Self::softmax(logits),
                value: value.clamp(-1.0, 1.0),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let policy = OnnxEvaluator::softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = policy.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(policy[2] > policy[1]);
        assert!(policy[1] > policy[0]);
    }

    #[test]
    fn test_softmax_large_logits() {
        let policy = OnnxEvaluator::softmax(&[1000.0, 1000.0]);
        assert!((policy[0] - 0.5).abs() < 1e-6);
        assert!((policy[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_degenerate() {
        let policy = OnnxEvaluator::softmax(&[f32::NEG_INFINITY, f32::NEG_INFINITY]);
        assert!(policy.iter().all(|p| *p == 0.0));
    }

    #[test]
    fn test_stats_average() {
        let stats = OnnxStats {
            positions: 4,
            calls: 1,
            total_time_us: 8_000,
        };
        assert!((stats.avg_ms_per_position() - 2.0).abs() < 1e-9);
        assert_eq!(OnnxStats::default().avg_ms_per_position(), 0.0);
    }
}
