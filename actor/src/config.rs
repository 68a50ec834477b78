//! Configuration for the actor binary
//!
//! Configuration is loaded from config.toml with environment variable overrides.
//! CLI arguments take highest priority, followed by env vars, then config.toml.

use anyhow::{anyhow, Result};
use clap::{Parser, ValueEnum};
use engine_config::{load_config, CentralConfig};
use mcts::MctsConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

// Load central config once at startup
static CENTRAL_CONFIG: Lazy<CentralConfig> = Lazy::new(load_config);

fn default_data_dir() -> String {
    CENTRAL_CONFIG.common.data_dir.clone()
}

fn default_log_level() -> String {
    CENTRAL_CONFIG.common.log_level.clone()
}

fn default_board_size() -> usize {
    CENTRAL_CONFIG.board.size
}

fn default_exploration_bias() -> f32 {
    CENTRAL_CONFIG.mcts.exploration_bias as f32
}

fn default_policy_bias() -> f32 {
    CENTRAL_CONFIG.mcts.policy_bias as f32
}

fn default_value_bias() -> f32 {
    CENTRAL_CONFIG.mcts.value_bias as f32
}

fn default_history_depth() -> usize {
    CENTRAL_CONFIG.mcts.history_depth
}

fn default_max_batch_size() -> usize {
    CENTRAL_CONFIG.mcts.max_batch_size
}

fn default_num_threads() -> usize {
    CENTRAL_CONFIG.mcts.num_threads
}

fn default_confidence_bound() -> f32 {
    CENTRAL_CONFIG.mcts.confidence_bound as f32
}

fn default_iterations() -> u32 {
    CENTRAL_CONFIG.selfplay.iterations
}

fn default_dataset_file() -> String {
    CENTRAL_CONFIG.selfplay.dataset_file.clone()
}

fn default_max_datapoints() -> usize {
    CENTRAL_CONFIG.selfplay.max_datapoints
}

fn default_seed() -> u64 {
    CENTRAL_CONFIG.selfplay.seed
}

/// What the actor does once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Generate training data by playing the model against itself
    Selfplay,
    /// Pit the model against an opponent and report the win-rate delta
    Duel,
}

#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "actor")]
#[command(about = "Gomoku self-play and duel runner")]
#[command(
    long_about = "Runs batches of gomoku games with neural-guided MCTS.

selfplay appends training datapoints to the dataset file; duel plays the
model against an opponent and prints the win-rate delta.

Configuration is loaded from config.toml with environment variable overrides.
CLI arguments take highest priority."
)]
pub struct Config {
    /// Run mode
    #[arg(long, value_enum, default_value_t = Mode::Selfplay)]
    pub mode: Mode,

    /// Model to play with: "uniform" or a path to an ONNX file
    #[arg(long, default_value = "uniform")]
    pub model: String,

    /// Duel opponent: "uniform" or a path to an ONNX file
    #[arg(long, default_value = "uniform")]
    pub opponent: String,

    /// MCTS simulations per move [default: mcts or duel section of config]
    #[arg(long)]
    pub num_simulations: Option<u32>,

    /// Duel opponent's simulations per move [default: same as --num-simulations]
    #[arg(long)]
    pub opponent_simulations: Option<u32>,

    /// Games played in parallel [default: selfplay or duel section of config]
    #[arg(long)]
    pub num_environments: Option<usize>,

    /// Random opening moves per game [default: selfplay or duel section of config]
    #[arg(long)]
    pub random_moves: Option<usize>,

    /// Self-play iterations, each a full batch of games
    #[arg(long, default_value_t = default_iterations())]
    pub iterations: u32,

    /// Board edge length
    #[arg(long, default_value_t = default_board_size())]
    pub board_size: usize,

    /// Data directory for the dataset and run statistics
    #[arg(long, default_value_t = default_data_dir())]
    pub data_dir: String,

    /// Dataset file name, relative to the data directory
    #[arg(long, default_value_t = default_dataset_file())]
    pub dataset_file: String,

    /// Keep at most this many datapoints, dropping the oldest
    #[arg(long, default_value_t = default_max_datapoints())]
    pub max_datapoints: usize,

    /// Worker threads for the game pool (0 = one per core)
    #[arg(long, default_value_t = default_num_threads())]
    pub num_threads: usize,

    /// Seed for random openings
    #[arg(long, default_value_t = default_seed())]
    pub seed: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value_t = default_log_level())]
    pub log_level: String,

    #[arg(long, default_value_t = default_exploration_bias())]
    pub exploration_bias: f32,

    #[arg(long, default_value_t = default_policy_bias())]
    pub policy_bias: f32,

    #[arg(long, default_value_t = default_value_bias())]
    pub value_bias: f32,

    /// Plies of history fed to the model (must be even)
    #[arg(long, default_value_t = default_history_depth())]
    pub history_depth: usize,

    /// Largest evaluator call (0 = whole round at once)
    #[arg(long, default_value_t = default_max_batch_size())]
    pub max_batch_size: usize,

    /// Visit share a move needs to be reported as confident
    #[arg(long, default_value_t = default_confidence_bound())]
    pub confidence_bound: f32,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.model.is_empty() {
            return Err(anyhow!("model cannot be empty"));
        }

        if self.mode == Mode::Duel && self.opponent.is_empty() {
            return Err(anyhow!("opponent cannot be empty in duel mode"));
        }

        if self.board_size < 5 {
            return Err(anyhow!(
                "board_size must be at least 5, got {}",
                self.board_size
            ));
        }

        if self.environments() == 0 {
            return Err(anyhow!("num_environments must be greater than 0"));
        }

        if self.mode == Mode::Duel && self.environments() % 2 != 0 {
            return Err(anyhow!(
                "num_environments must be even in duel mode, got {}",
                self.environments()
            ));
        }

        if self.simulations() == 0 {
            return Err(anyhow!("num_simulations must be greater than 0"));
        }

        if self.mode == Mode::Duel && self.opponent_budget() == 0 {
            return Err(anyhow!("opponent_simulations must be greater than 0"));
        }

        if self.dataset_file.is_empty() {
            return Err(anyhow!("dataset_file cannot be empty"));
        }

        if self.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.log_level
            ));
        }

        self.to_mcts_config().validate()?;

        Ok(())
    }

    /// Simulations per move for the selected mode.
    pub fn simulations(&self) -> u32 {
        self.num_simulations.unwrap_or(match self.mode {
            Mode::Selfplay => CENTRAL_CONFIG.mcts.num_simulations,
            Mode::Duel => CENTRAL_CONFIG.duel.num_simulations,
        })
    }

    /// Duel opponent's simulations per move.
    pub fn opponent_budget(&self) -> u32 {
        self.opponent_simulations.unwrap_or_else(|| self.simulations())
    }

    /// Parallel games for the selected mode.
    pub fn environments(&self) -> usize {
        self.num_environments.unwrap_or(match self.mode {
            Mode::Selfplay => CENTRAL_CONFIG.selfplay.num_environments,
            Mode::Duel => CENTRAL_CONFIG.duel.num_environments,
        })
    }

    /// Random opening moves for the selected mode.
    pub fn opening_moves(&self) -> usize {
        self.random_moves.unwrap_or(match self.mode {
            Mode::Selfplay => CENTRAL_CONFIG.selfplay.random_moves,
            Mode::Duel => CENTRAL_CONFIG.duel.random_moves,
        })
    }

    pub fn to_mcts_config(&self) -> MctsConfig {
        MctsConfig {
            num_simulations: self.simulations(),
            exploration_bias: self.exploration_bias,
            policy_bias: self.policy_bias,
            value_bias: self.value_bias,
            history_depth: self.history_depth,
            max_batch_size: self.max_batch_size,
            num_threads: self.num_threads,
            confidence_bound: self.confidence_bound,
        }
    }

    /// Path to the dataset file
    pub fn dataset_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.dataset_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            mode: Mode::Selfplay,
            model: "uniform".into(),
            opponent: "uniform".into(),
            num_simulations: Some(50),
            opponent_simulations: None,
            num_environments: Some(4),
            random_moves: Some(2),
            iterations: 1,
            board_size: 9,
            data_dir: "../data".into(),
            dataset_file: "dataset.txt".into(),
            max_datapoints: 1000,
            num_threads: 1,
            seed: 42,
            log_level: "info".into(),
            exploration_bias: 1.42,
            policy_bias: 1.0,
            value_bias: 1.0,
            history_depth: 4,
            max_batch_size: 0,
            confidence_bound: 0.5,
        }
    }

    #[test]
    fn validate_accepts_valid_configuration() {
        let cfg = base_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_model() {
        let mut cfg = base_config();
        cfg.model.clear();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("model"));
    }

    #[test]
    fn validate_rejects_empty_opponent_only_in_duel() {
        let mut cfg = base_config();
        cfg.opponent.clear();
        assert!(cfg.validate().is_ok());

        cfg.mode = Mode::Duel;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("opponent"));
    }

    #[test]
    fn validate_rejects_small_board() {
        let mut cfg = base_config();
        cfg.board_size = 4;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("board_size"));
    }

    #[test]
    fn validate_rejects_odd_duel_environments() {
        let mut cfg = base_config();
        cfg.mode = Mode::Duel;
        cfg.num_environments = Some(3);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("even"));

        cfg.num_environments = Some(3);
        cfg.mode = Mode::Selfplay;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_simulations() {
        let mut cfg = base_config();
        cfg.num_simulations = Some(0);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("num_simulations"));
    }

    #[test]
    fn opponent_budget_defaults_to_model_budget() {
        let mut cfg = base_config();
        cfg.mode = Mode::Duel;
        assert_eq!(cfg.opponent_budget(), 50);

        cfg.opponent_simulations = Some(800);
        assert_eq!(cfg.opponent_budget(), 800);
        assert_eq!(cfg.simulations(), 50);

        cfg.opponent_simulations = Some(0);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("opponent_simulations"));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut cfg = base_config();
        cfg.log_level = "nope".into();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("invalid log level"));
    }

    #[test]
    fn validate_rejects_odd_history_depth() {
        let mut cfg = base_config();
        cfg.history_depth = 3;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("history_depth"));
    }

    #[test]
    fn mode_defaults_come_from_matching_section() {
        let mut cfg = base_config();
        cfg.num_simulations = None;
        cfg.num_environments = None;
        cfg.random_moves = None;
        assert_eq!(cfg.simulations(), CENTRAL_CONFIG.mcts.num_simulations);
        assert_eq!(cfg.environments(), CENTRAL_CONFIG.selfplay.num_environments);
        assert_eq!(cfg.opening_moves(), CENTRAL_CONFIG.selfplay.random_moves);

        cfg.mode = Mode::Duel;
        assert_eq!(cfg.simulations(), CENTRAL_CONFIG.duel.num_simulations);
        assert_eq!(cfg.environments(), CENTRAL_CONFIG.duel.num_environments);
        assert_eq!(cfg.opening_moves(), CENTRAL_CONFIG.duel.random_moves);
    }

    #[test]
    fn to_mcts_config_carries_search_settings() {
        let mut cfg = base_config();
        cfg.policy_bias = 0.25;
        cfg.max_batch_size = 32;
        let mcts = cfg.to_mcts_config();
        assert_eq!(mcts.num_simulations, 50);
        assert!((mcts.policy_bias - 0.25).abs() < 1e-6);
        assert_eq!(mcts.history_depth, 4);
        assert_eq!(mcts.max_batch_size, 32);
        assert_eq!(mcts.num_threads, 1);
    }

    #[test]
    fn dataset_path_joins_data_dir() {
        let cfg = base_config();
        assert_eq!(cfg.dataset_path(), PathBuf::from("../data/dataset.txt"));
    }

    #[test]
    fn parses_cli_arguments() {
        let cfg = Config::parse_from([
            "actor",
            "--mode",
            "duel",
            "--opponent",
            "models/old.onnx",
            "--num-simulations",
            "25",
            "--opponent-simulations",
            "100",
            "--board-size",
            "11",
        ]);
        assert_eq!(cfg.mode, Mode::Duel);
        assert_eq!(cfg.model, "uniform");
        assert_eq!(cfg.opponent, "models/old.onnx");
        assert_eq!(cfg.simulations(), 25);
        assert_eq!(cfg.opponent_budget(), 100);
        assert_eq!(cfg.board_size, 11);
    }
}
