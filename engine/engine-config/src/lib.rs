//! Centralized configuration loading from config.toml.
//!
//! This crate provides the configuration structs and loading logic used by
//! the self-play actor.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`GOMOKU_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (config.defaults.toml, embedded at compile time)
//!
//! Command-line flags of the actor sit above all three.
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! GOMOKU_<SECTION>_<KEY>=value
//!
//! Examples:
//!     GOMOKU_COMMON_DATA_DIR=/data
//!     GOMOKU_BOARD_SIZE=9
//!     GOMOKU_MCTS_NUM_SIMULATIONS=800
//!     GOMOKU_SELFPLAY_NUM_ENVIRONMENTS=128
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{
    apply_env_overrides, load_config, load_from_path, CONFIG_PATH_ENV, CONFIG_SEARCH_PATHS,
};
pub use structs::*;
