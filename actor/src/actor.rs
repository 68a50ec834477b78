//! Self-play and duel drivers.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mcts::{Batcher, Evaluator};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{Config, Mode};
use crate::evaluators;
use crate::stats::{RunStats, RunStatsSnapshot};
use crate::storage::{DatasetStore, LineStore};

/// Result of a finished duel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DuelOutcome {
    /// Opponent's win-rate delta
    pub delta: f32,
    /// Moves committed by search
    pub moves: u64,
    /// Of those, moves whose visit share cleared the confidence bound
    pub confident: u64,
}

pub struct Actor {
    config: Config,
    model: Arc<dyn Evaluator>,
    /// Only resolved in duel mode
    opponent: Option<Arc<dyn Evaluator>>,
}

impl Actor {
    /// Resolve the evaluators named in `config`. A model that cannot be
    /// loaded is an error here, before any game starts.
    pub fn new(config: Config) -> Result<Self> {
        let channels = config.history_depth + 1;
        let model = evaluators::resolve(&config.model, config.board_size, channels)
            .context("failed to resolve --model")?;
        let opponent = match config.mode {
            Mode::Selfplay => None,
            Mode::Duel => Some(
                evaluators::resolve(&config.opponent, config.board_size, channels)
                    .context("failed to resolve --opponent")?,
            ),
        };

        Ok(Self {
            config,
            model,
            opponent,
        })
    }

    pub fn run(&self) -> Result<()> {
        match self.config.mode {
            Mode::Selfplay => {
                let snapshot = self.run_selfplay()?;
                info!(
                    games = snapshot.games,
                    datapoints = snapshot.datapoints,
                    "Self-play finished"
                );
            }
            Mode::Duel => {
                let outcome = self.run_duel()?;
                println!("{:.4}", outcome.delta);
            }
        }
        Ok(())
    }

    /// Play `iterations` batches of self-play games, appending their
    /// datapoints to the dataset after each batch.
    pub fn run_selfplay(&self) -> Result<RunStatsSnapshot> {
        let config = &self.config;
        let stats = RunStats::new(&config.data_dir);
        let mut store = LineStore::open(config.dataset_path())?;

        info!(
            model = self.model.name(),
            board_size = config.board_size,
            environments = config.environments(),
            simulations = config.simulations(),
            iterations = config.iterations,
            dataset = %store.path().display(),
            existing = store.count(),
            "Starting self-play"
        );

        // Progress bar only when stderr is a TTY
        let progress = if config.iterations > 1
            && std::io::IsTerminal::is_terminal(&std::io::stderr())
        {
            let pb = ProgressBar::new(u64::from(config.iterations));
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} iterations ({eta})",
                    )?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        for iteration in 0..config.iterations {
            let started = Instant::now();
            let mut batcher = Batcher::new(
                config.to_mcts_config(),
                config.board_size,
                vec![Arc::clone(&self.model)],
                config.environments(),
            )?
            .with_seed(config.seed.wrapping_add(u64::from(iteration)));

            let average_winner = batcher
                .selfplay(config.opening_moves())
                .with_context(|| format!("self-play iteration {} failed", iteration + 1))?;

            for env in batcher.environments() {
                stats.record_game(env.result(), env.board().filled_count());
            }

            let datapoints = batcher.export_training_data();
            for datapoint in &datapoints {
                store.store(datapoint)?;
            }
            let dropped = store.constrain(config.max_datapoints);
            if store.is_dirty() {
                store.apply_changes()?;
            }

            stats.record_datapoints(datapoints.len());
            stats.record_iteration();
            stats.write_stats();

            let log = || {
                info!(
                    iteration = iteration + 1,
                    average_winner,
                    datapoints = datapoints.len(),
                    dropped,
                    stored = store.count(),
                    newest = ?store.get(store.count().saturating_sub(1)).map(|d| d.best_move),
                    secs = format!("{:.2}", started.elapsed().as_secs_f64()),
                    "Iteration complete"
                );
            };
            match progress {
                Some(ref pb) => {
                    pb.suspend(log);
                    pb.inc(1);
                }
                None => log(),
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message("done");
        }

        debug!(path = %stats.stats_path().display(), "run stats written");
        Ok(stats.snapshot())
    }

    /// Play the opponent against the model. Positive results favour the
    /// opponent.
    pub fn run_duel(&self) -> Result<DuelOutcome> {
        let config = &self.config;
        let opponent = self
            .opponent
            .as_ref()
            .context("duel needs an opponent evaluator")?;

        info!(
            model = self.model.name(),
            opponent = opponent.name(),
            environments = config.environments(),
            simulations = config.simulations(),
            opponent_simulations = config.opponent_budget(),
            random_moves = config.opening_moves(),
            "Starting duel"
        );

        let mut batcher = Batcher::new(
            config.to_mcts_config(),
            config.board_size,
            vec![Arc::clone(&self.model), Arc::clone(opponent)],
            config.environments(),
        )?
        .with_seed(config.seed);

        let budgets = [config.simulations(), config.opponent_budget()];
        let delta = batcher
            .evaluate_matchup(config.opening_moves(), budgets)
            .context("duel failed")?;

        let outcome = DuelOutcome {
            delta,
            moves: batcher.commits(),
            confident: batcher.confident_commits(),
        };
        info!(
            delta,
            moves = outcome.moves,
            confident = outcome.confident,
            bound = config.confidence_bound,
            "Duel finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(data_dir: &str, mode: Mode) -> Config {
        Config {
            mode,
            model: "uniform".into(),
            opponent: "uniform".into(),
            num_simulations: Some(30),
            opponent_simulations: None,
            num_environments: Some(2),
            random_moves: Some(0),
            iterations: 1,
            board_size: 5,
            data_dir: data_dir.into(),
            dataset_file: "dataset.txt".into(),
            max_datapoints: 100_000,
            num_threads: 1,
            seed: 7,
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
    fn selfplay_writes_dataset_and_stats() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap(), Mode::Selfplay);
        let dataset = config.dataset_path();

        let actor = Actor::new(config).unwrap();
        let snapshot = actor.run_selfplay().unwrap();

        assert_eq!(snapshot.games, 2);
        assert_eq!(snapshot.iterations, 1);
        assert!(snapshot.datapoints > 0);

        let store = LineStore::open(&dataset).unwrap();
        assert_eq!(store.count() as u64, snapshot.datapoints);
        for i in 0..store.count() {
            let datapoint = store.get(i).unwrap();
            assert!(datapoint.best_move < 25);
            assert!(datapoint.winner <= 2);
        }
        assert!(dir.path().join("run_stats.json").exists());
    }

    #[test]
    fn selfplay_respects_max_datapoints() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path().to_str().unwrap(), Mode::Selfplay);
        config.max_datapoints = 3;
        config.iterations = 2;
        let dataset = config.dataset_path();

        let actor = Actor::new(config).unwrap();
        let snapshot = actor.run_selfplay().unwrap();

        assert_eq!(snapshot.iterations, 2);
        assert_eq!(LineStore::open(&dataset).unwrap().count(), 3);
    }

    #[test]
    fn duel_between_identical_models_is_even() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap(), Mode::Duel);

        let actor = Actor::new(config).unwrap();
        let outcome = actor.run_duel().unwrap();
        assert!(outcome.delta.abs() < 1e-6);
        assert!(outcome.moves > 0);
    }

    #[test]
    fn duel_counts_moves_clearing_confidence_bound() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path().to_str().unwrap(), Mode::Duel);
        config.confidence_bound = 0.0;
        let outcome = Actor::new(config).unwrap().run_duel().unwrap();
        assert!(outcome.moves > 0);
        assert_eq!(outcome.confident, outcome.moves);

        // A single simulation leaves the chosen child with half the visits
        let mut config = test_config(dir.path().to_str().unwrap(), Mode::Duel);
        config.num_simulations = Some(1);
        config.confidence_bound = 0.6;
        let outcome = Actor::new(config).unwrap().run_duel().unwrap();
        assert!(outcome.moves > 0);
        assert_eq!(outcome.confident, 0);
    }

    #[test]
    fn duel_with_stronger_opponent_budget_completes() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path().to_str().unwrap(), Mode::Duel);
        config.num_simulations = Some(2);
        config.opponent_simulations = Some(20);
        let outcome = Actor::new(config).unwrap().run_duel().unwrap();
        assert!((-1.0..=1.0).contains(&outcome.delta));
    }

    #[test]
    fn selfplay_actor_has_no_opponent() {
        let dir = tempdir().unwrap();
        let config = test_config(dir.path().to_str().unwrap(), Mode::Selfplay);

        let actor = Actor::new(config).unwrap();
        assert!(actor.run_duel().is_err());
    }

    #[test]
    fn unknown_model_fails_at_startup() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path().to_str().unwrap(), Mode::Selfplay);
        config.model = "missing.onnx".into();
        assert!(Actor::new(config).is_err());
    }
}
