//! Batched, neural-guided Monte Carlo Tree Search for gomoku self-play.
//!
//! # Overview
//!
//! Many games are searched at once. Every simulation round runs one
//! selection step per game, gathers the newly expanded nodes of all games
//! into one batch per evaluator, evaluates them, and backpropagates the
//! results:
//!
//! 1. **Selection**: descend from the committed position using
//!    `value_bias * Q + exploration_bias * sqrt(2 ln N / n) + policy_bias * P`
//! 2. **Expansion**: pop the highest-prior untried move of the first node
//!    that still has one
//! 3. **Evaluation**: batch the encoded node with every other game's
//! 4. **Backpropagation**: add the Black-positive value up to the
//!    committed position
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mcts::{Batcher, Evaluator, MctsConfig, UniformEvaluator};
//!
//! let evaluator: Arc<dyn Evaluator> = Arc::new(UniformEvaluator::new());
//! let mut batcher = Batcher::new(MctsConfig::for_testing(), 9, vec![evaluator], 8)?
//!     .with_seed(42);
//!
//! let average = batcher.selfplay(2)?;
//! let datapoints = batcher.export_training_data();
//! println!("{} datapoints, average winner {average}", datapoints.len());
//! ```
//!
//! # Architecture
//!
//! ```text
//! Batcher ── rayon pool ──> GameEnvironment (x N)
//!    │                        └─ SearchTree (1 or 2, arena of SearchNode)
//!    └── Evaluator (1 or 2) <── encoded pending nodes
//! ```

pub mod batcher;
pub mod config;
pub mod datapoint;
pub mod encoding;
pub mod environment;
pub mod evaluator;
pub mod log_table;
pub mod node;
pub mod tree;

#[cfg(feature = "onnx")]
pub mod onnx;

// Re-export main types
pub use batcher::{BatchError, Batcher};
pub use config::{ConfigError, MctsConfig};
pub use datapoint::{Datapoint, DatapointParseError};
pub use encoding::{encode_node, encoded_len};
pub use environment::{EvalReply, EvalRequest, GameEnvironment};
pub use evaluator::{EvalResult, Evaluator, EvaluatorError, UniformEvaluator};
pub use log_table::LogTable;
pub use node::{NodeId, NodeStatus, SearchNode};
pub use tree::{PolicyStep, SearchTree, TreeError, TreeStats};

#[cfg(feature = "onnx")]
pub use onnx::{OnnxEvaluator, OnnxStats};
