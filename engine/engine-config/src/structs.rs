//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use serde::Deserialize;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// These call the accessor functions from defaults module
// ============================================================================

fn d_data_dir() -> String {
    defaults::data_dir().into()
}
fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_board_size() -> usize {
    defaults::board_size()
}
fn d_num_sims() -> u32 {
    defaults::num_simulations()
}
fn d_exploration_bias() -> f64 {
    defaults::exploration_bias()
}
fn d_policy_bias() -> f64 {
    defaults::policy_bias()
}
fn d_value_bias() -> f64 {
    defaults::value_bias()
}
fn d_history_depth() -> usize {
    defaults::history_depth()
}
fn d_max_batch_size() -> usize {
    defaults::max_batch_size()
}
fn d_num_threads() -> usize {
    defaults::num_threads()
}
fn d_confidence_bound() -> f64 {
    defaults::confidence_bound()
}
fn d_selfplay_envs() -> usize {
    defaults::selfplay_environments()
}
fn d_selfplay_random_moves() -> usize {
    defaults::selfplay_random_moves()
}
fn d_iterations() -> u32 {
    defaults::iterations()
}
fn d_dataset_file() -> String {
    defaults::dataset_file().into()
}
fn d_max_datapoints() -> usize {
    defaults::max_datapoints()
}
fn d_seed() -> u64 {
    defaults::seed()
}
fn d_duel_envs() -> usize {
    defaults::duel_environments()
}
fn d_duel_random_moves() -> usize {
    defaults::duel_random_moves()
}
fn d_duel_sims() -> u32 {
    defaults::duel_simulations()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub board: BoardConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub selfplay: SelfplayConfig,
    #[serde(default)]
    pub duel: DuelConfig,
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_data_dir")]
    pub data_dir: String,
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::data_dir().into(),
            log_level: defaults::log_level().into(),
        }
    }
}

/// Board geometry
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BoardConfig {
    /// Edge length N of the N x N board
    #[serde(default = "d_board_size")]
    pub size: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            size: defaults::board_size(),
        }
    }
}

/// MCTS (Monte Carlo Tree Search) configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MctsConfig {
    #[serde(default = "d_num_sims")]
    pub num_simulations: u32,
    #[serde(default = "d_exploration_bias")]
    pub exploration_bias: f64,
    #[serde(default = "d_policy_bias")]
    pub policy_bias: f64,
    #[serde(default = "d_value_bias")]
    pub value_bias: f64,
    #[serde(default = "d_history_depth")]
    pub history_depth: usize,
    /// Largest evaluator call; 0 = whole round in one call
    #[serde(default = "d_max_batch_size")]
    pub max_batch_size: usize,
    /// Worker threads; 0 = one per core
    #[serde(default = "d_num_threads")]
    pub num_threads: usize,
    #[serde(default = "d_confidence_bound")]
    pub confidence_bound: f64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            num_simulations: defaults::num_simulations(),
            exploration_bias: defaults::exploration_bias(),
            policy_bias: defaults::policy_bias(),
            value_bias: defaults::value_bias(),
            history_depth: defaults::history_depth(),
            max_batch_size: defaults::max_batch_size(),
            num_threads: defaults::num_threads(),
            confidence_bound: defaults::confidence_bound(),
        }
    }
}

/// Self-play data generation
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SelfplayConfig {
    #[serde(default = "d_selfplay_envs")]
    pub num_environments: usize,
    #[serde(default = "d_selfplay_random_moves")]
    pub random_moves: usize,
    #[serde(default = "d_iterations")]
    pub iterations: u32,
    /// Dataset file name, relative to `common.data_dir`
    #[serde(default = "d_dataset_file")]
    pub dataset_file: String,
    #[serde(default = "d_max_datapoints")]
    pub max_datapoints: usize,
    #[serde(default = "d_seed")]
    pub seed: u64,
}

impl Default for SelfplayConfig {
    fn default() -> Self {
        Self {
            num_environments: defaults::selfplay_environments(),
            random_moves: defaults::selfplay_random_moves(),
            iterations: defaults::iterations(),
            dataset_file: defaults::dataset_file().into(),
            max_datapoints: defaults::max_datapoints(),
            seed: defaults::seed(),
        }
    }
}

/// Head-to-head evaluation of two models
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DuelConfig {
    #[serde(default = "d_duel_envs")]
    pub num_environments: usize,
    #[serde(default = "d_duel_random_moves")]
    pub random_moves: usize,
    #[serde(default = "d_duel_sims")]
    pub num_simulations: u32,
}

impl Default for DuelConfig {
    fn default() -> Self {
        Self {
            num_environments: defaults::duel_environments(),
            random_moves: defaults::duel_random_moves(),
            num_simulations: defaults::duel_simulations(),
        }
    }
}
