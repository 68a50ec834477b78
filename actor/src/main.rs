//! Actor - gomoku self-play and duel runner
//!
//! A batch process that:
//! 1. Resolves the model (and duel opponent) into evaluators
//! 2. Plays many games at once with batched MCTS
//! 3. In self-play, appends training datapoints to `<data_dir>/<dataset_file>`
//!    and writes `<data_dir>/run_stats.json`
//! 4. In a duel, prints the opponent's win-rate delta to stdout

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

mod actor;
mod config;
mod evaluators;
mod stats;
mod storage;

use crate::actor::Actor;
use crate::config::Config;

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn main() -> Result<()> {
    let config = Config::parse();
    config.validate()?;

    init_tracing(&config.log_level)?;
    info!(log_level = %config.log_level, "Tracing initialized");

    info!(
        mode = ?config.mode,
        model = %config.model,
        board_size = config.board_size,
        "Starting actor"
    );

    let actor = Actor::new(config)?;

    match actor.run() {
        Ok(()) => {
            info!("Actor completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Actor failed: {:#}", e);
            Err(e)
        }
    }
}
