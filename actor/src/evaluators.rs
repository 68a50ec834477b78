//! Resolve model ids from the command line into evaluators.
//!
//! An id is either `uniform` (equal priors, value 0) or a path to an ONNX
//! model. ONNX support needs the `onnx` feature.

use anyhow::Result;
use mcts::{Evaluator, UniformEvaluator};
use std::sync::Arc;
use tracing::info;

/// Id of the built-in model-free evaluator.
pub const UNIFORM: &str = "uniform";

/// Build the evaluator named by `id` for a `board_size` board with
/// `channels` input planes.
pub fn resolve(id: &str, board_size: usize, channels: usize) -> Result<Arc<dyn Evaluator>> {
    if id == UNIFORM {
        info!(model = id, "using uniform evaluator");
        return Ok(Arc::new(UniformEvaluator::new()));
    }
    load_onnx(id, board_size, channels)
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &str, board_size: usize, channels: usize) -> Result<Arc<dyn Evaluator>> {
    use anyhow::Context;
    use mcts::OnnxEvaluator;

    if !std::path::Path::new(path).exists() {
        anyhow::bail!("model file {path} does not exist");
    }
    let evaluator = OnnxEvaluator::load(path, board_size, channels)
        .with_context(|| format!("failed to load model {path}"))?;
    info!(model = path, board_size, channels, "loaded ONNX model");
    Ok(Arc::new(evaluator))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &str, _board_size: usize, _channels: usize) -> Result<Arc<dyn Evaluator>> {
    anyhow::bail!("cannot load model {path}: actor was built without the `onnx` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_uniform() {
        let evaluator = resolve("uniform", 9, 5).unwrap();
        assert_eq!(evaluator.name(), "uniform");

        let result = evaluator.evaluate(&[0.0; 5 * 81], 81).unwrap();
        assert_eq!(result.policy.len(), 81);
        assert_eq!(result.value, 0.0);
    }

    #[test]
    fn missing_model_is_an_error() {
        let err = resolve("does/not/exist.onnx", 9, 5).err().unwrap();
        assert!(err.to_string().contains("does/not/exist.onnx"));
    }
}
