//! Default configuration values loaded from config.defaults.toml.
//!
//! This module loads defaults from the shared TOML file at compile time,
//! so the binary and the file shipped next to it can never disagree.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    board: BoardDefaults,
    mcts: MctsDefaults,
    selfplay: SelfplayDefaults,
    duel: DuelDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    data_dir: String,
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct BoardDefaults {
    size: usize,
}

#[derive(Debug, Deserialize)]
struct MctsDefaults {
    num_simulations: u32,
    exploration_bias: f64,
    policy_bias: f64,
    value_bias: f64,
    history_depth: usize,
    max_batch_size: usize,
    num_threads: usize,
    confidence_bound: f64,
}

#[derive(Debug, Deserialize)]
struct SelfplayDefaults {
    num_environments: usize,
    random_moves: usize,
    iterations: u32,
    dataset_file: String,
    max_datapoints: usize,
    seed: u64,
}

#[derive(Debug, Deserialize)]
struct DuelDefaults {
    num_environments: usize,
    random_moves: usize,
    num_simulations: u32,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn data_dir() -> &'static str {
    &DEFAULTS.common.data_dir
}
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Board
pub fn board_size() -> usize {
    DEFAULTS.board.size
}

// MCTS
pub fn num_simulations() -> u32 {
    DEFAULTS.mcts.num_simulations
}
pub fn exploration_bias() -> f64 {
    DEFAULTS.mcts.exploration_bias
}
pub fn policy_bias() -> f64 {
    DEFAULTS.mcts.policy_bias
}
pub fn value_bias() -> f64 {
    DEFAULTS.mcts.value_bias
}
pub fn history_depth() -> usize {
    DEFAULTS.mcts.history_depth
}
pub fn max_batch_size() -> usize {
    DEFAULTS.mcts.max_batch_size
}
pub fn num_threads() -> usize {
    DEFAULTS.mcts.num_threads
}
pub fn confidence_bound() -> f64 {
    DEFAULTS.mcts.confidence_bound
}

// Selfplay
pub fn selfplay_environments() -> usize {
    DEFAULTS.selfplay.num_environments
}
pub fn selfplay_random_moves() -> usize {
    DEFAULTS.selfplay.random_moves
}
pub fn iterations() -> u32 {
    DEFAULTS.selfplay.iterations
}
pub fn dataset_file() -> &'static str {
    &DEFAULTS.selfplay.dataset_file
}
pub fn max_datapoints() -> usize {
    DEFAULTS.selfplay.max_datapoints
}
pub fn seed() -> u64 {
    DEFAULTS.selfplay.seed
}

// Duel
pub fn duel_environments() -> usize {
    DEFAULTS.duel.num_environments
}
pub fn duel_random_moves() -> usize {
    DEFAULTS.duel.random_moves
}
pub fn duel_simulations() -> u32 {
    DEFAULTS.duel.num_simulations
}
