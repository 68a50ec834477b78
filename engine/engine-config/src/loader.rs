//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::Path;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "GOMOKU_CONFIG";

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from subdirectory)
];

/// Load the central configuration from config.toml.
///
/// Searches for config.toml in the following order:
/// 1. Path specified by GOMOKU_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    // Check for explicit config path
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from {}: {}", CONFIG_PATH_ENV, path.display());
            return load_from_path(&path);
        }
        warn!(
            "{}={} not found, searching defaults",
            CONFIG_PATH_ENV,
            path.display()
        );
    }

    // Search default locations
    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    // Fall back to defaults
    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u32, usize, f64, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: GOMOKU_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.data_dir, "GOMOKU_COMMON_DATA_DIR");
    env_override!(config, common.log_level, "GOMOKU_COMMON_LOG_LEVEL");

    // Board
    env_override!(config, board.size, "GOMOKU_BOARD_SIZE", parse);

    // MCTS
    env_override!(
        config,
        mcts.num_simulations,
        "GOMOKU_MCTS_NUM_SIMULATIONS",
        parse
    );
    env_override!(
        config,
        mcts.exploration_bias,
        "GOMOKU_MCTS_EXPLORATION_BIAS",
        parse
    );
    env_override!(config, mcts.policy_bias, "GOMOKU_MCTS_POLICY_BIAS", parse);
    env_override!(config, mcts.value_bias, "GOMOKU_MCTS_VALUE_BIAS", parse);
    env_override!(
        config,
        mcts.history_depth,
        "GOMOKU_MCTS_HISTORY_DEPTH",
        parse
    );
    env_override!(
        config,
        mcts.max_batch_size,
        "GOMOKU_MCTS_MAX_BATCH_SIZE",
        parse
    );
    env_override!(config, mcts.num_threads, "GOMOKU_MCTS_NUM_THREADS", parse);
    env_override!(
        config,
        mcts.confidence_bound,
        "GOMOKU_MCTS_CONFIDENCE_BOUND",
        parse
    );

    // Selfplay
    env_override!(
        config,
        selfplay.num_environments,
        "GOMOKU_SELFPLAY_NUM_ENVIRONMENTS",
        parse
    );
    env_override!(
        config,
        selfplay.random_moves,
        "GOMOKU_SELFPLAY_RANDOM_MOVES",
        parse
    );
    env_override!(
        config,
        selfplay.iterations,
        "GOMOKU_SELFPLAY_ITERATIONS",
        parse
    );
    env_override!(
        config,
        selfplay.dataset_file,
        "GOMOKU_SELFPLAY_DATASET_FILE"
    );
    env_override!(
        config,
        selfplay.max_datapoints,
        "GOMOKU_SELFPLAY_MAX_DATAPOINTS",
        parse
    );
    env_override!(config, selfplay.seed, "GOMOKU_SELFPLAY_SEED", parse);

    // Duel
    env_override!(
        config,
        duel.num_environments,
        "GOMOKU_DUEL_NUM_ENVIRONMENTS",
        parse
    );
    env_override!(
        config,
        duel.random_moves,
        "GOMOKU_DUEL_RANDOM_MOVES",
        parse
    );
    env_override!(
        config,
        duel.num_simulations,
        "GOMOKU_DUEL_NUM_SIMULATIONS",
        parse
    );

    config
}
