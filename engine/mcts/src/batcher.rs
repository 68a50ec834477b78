//! Batched search across many environments.
//!
//! Each round runs one selection step per live environment on a rayon
//! pool, evaluates every queued node with one call per evaluator (or per
//! `max_batch_size` chunk) on the calling thread, then absorbs the results
//! in parallel. `pool.install` is the round barrier: no evaluator call
//! starts before every environment has stepped, and no environment absorbs
//! before every batch has been scattered.

use std::sync::Arc;

use games_gomoku::Color;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{ConfigError, MctsConfig};
use crate::datapoint::{collect_tree, Datapoint};
use crate::environment::{EvalReply, EvalRequest, GameEnvironment};
use crate::evaluator::{Evaluator, EvaluatorError};
use crate::log_table::LogTable;
use crate::tree::TreeError;

/// Errors from orchestrating a batch of games.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Pairwise operation needs an even environment count, got {0}")]
    OddEnvironmentCount(usize),

    #[error("Matchups need two evaluators")]
    SingleTree,

    #[error("At least one evaluator is required")]
    NoEvaluators,

    #[error("At most two evaluators are supported, got {0}")]
    TooManyEvaluators(usize),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] EvaluatorError),

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),

    #[error("No environment could commit a move ({0} still running)")]
    Stalled(usize),

    #[error("Expected one simulation budget per evaluator ({expected}), got {got}")]
    BudgetCount { expected: usize, got: usize },
}

/// Drives a set of environments through simulation rounds and moves.
pub struct Batcher {
    envs: Vec<GameEnvironment>,
    evaluators: Vec<Arc<dyn Evaluator>>,
    config: MctsConfig,
    board_size: usize,
    log_table: LogTable,
    pool: rayon::ThreadPool,
    rng: ChaCha20Rng,
    commits: u64,
    confident_commits: u64,
}

impl std::fmt::Debug for Batcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batcher")
            .field("environments", &self.envs.len())
            .field("evaluators", &self.evaluators.len())
            .field("board_size", &self.board_size)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Batcher {
    /// Create `environment_count` empty games of `board_size`.
    ///
    /// One evaluator searches with a single tree per game; two give each
    /// color its own tree and evaluator.
    pub fn new(
        config: MctsConfig,
        board_size: usize,
        evaluators: Vec<Arc<dyn Evaluator>>,
        environment_count: usize,
    ) -> Result<Self, BatchError> {
        config.validate()?;
        let dual_tree = match evaluators.len() {
            0 => return Err(BatchError::NoEvaluators),
            1 => false,
            2 => true,
            n => return Err(BatchError::TooManyEvaluators(n)),
        };

        let envs = (0..environment_count)
            .map(|_| GameEnvironment::new(board_size, dual_tree))
            .collect::<Result<Vec<_>, _>>()
            .map_err(TreeError::from)?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if config.num_threads > 0 {
            builder = builder.num_threads(config.num_threads);
        }
        let pool = builder
            .build()
            .map_err(|e| BatchError::ThreadPool(e.to_string()))?;

        debug!(
            environments = environment_count,
            board_size,
            dual_tree,
            threads = pool.current_num_threads(),
            "batcher created"
        );

        Ok(Self {
            envs,
            evaluators,
            config,
            board_size,
            log_table: LogTable::new(),
            pool,
            rng: ChaCha20Rng::from_entropy(),
            commits: 0,
            confident_commits: 0,
        })
    }

    /// Reseed the random opening generator.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha20Rng::seed_from_u64(seed);
        self
    }

    #[inline]
    pub fn environments(&self) -> &[GameEnvironment] {
        &self.envs
    }

    #[inline]
    pub fn environments_mut(&mut self) -> &mut [GameEnvironment] {
        &mut self.envs
    }

    #[inline]
    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    #[inline]
    pub fn board_size(&self) -> usize {
        self.board_size
    }

    /// Environments whose game has not ended.
    pub fn live_count(&self) -> usize {
        self.envs.iter().filter(|env| !env.is_terminal()).count()
    }

    /// Moves committed so far.
    pub fn commits(&self) -> u64 {
        self.commits
    }

    /// Committed moves whose visit share cleared `confidence_bound`.
    pub fn confident_commits(&self) -> u64 {
        self.confident_commits
    }

    /// Evaluate whatever is already queued, then run `count` rounds.
    pub fn run_simulations(&mut self, count: u32) -> Result<(), BatchError> {
        let budgets = vec![count; self.evaluators.len()];
        self.run_simulations_per_evaluator(&budgets)
    }

    /// Like [`Batcher::run_simulations`], but every environment searches
    /// with the budget of the evaluator that moves next in it.
    pub fn run_simulations_per_evaluator(&mut self, budgets: &[u32]) -> Result<(), BatchError> {
        if budgets.len() != self.evaluators.len() {
            return Err(BatchError::BudgetCount {
                expected: self.evaluators.len(),
                got: budgets.len(),
            });
        }
        let requests: Vec<Vec<EvalRequest>> = {
            let depth = self.config.history_depth;
            let envs = &self.envs;
            self.pool
                .install(|| envs.par_iter().map(|env| env.collect_requests(depth)).collect())
        };
        if requests.iter().any(|reqs| !reqs.is_empty()) {
            let inboxes = self.evaluate(requests)?;
            self.absorb_all(inboxes);
        }

        let env_budgets: Vec<u32> = self
            .envs
            .iter()
            .map(|env| budgets[env.next_evaluator()])
            .collect();
        let count = env_budgets.iter().copied().max().unwrap_or(0);

        for round in 0..count {
            let max_visits = self
                .envs
                .iter()
                .map(GameEnvironment::max_head_visits)
                .max()
                .unwrap_or(0);
            self.log_table.ensure(max_visits + 2);

            let requests = self.step_all(round, &env_budgets);
            let queued: usize = requests.iter().map(Vec::len).sum();
            let inboxes = self.evaluate(requests)?;
            self.absorb_all(inboxes);
            trace!(round, queued, "simulation round complete");
        }
        Ok(())
    }

    /// Parallel selection step plus encoding of the resulting requests.
    /// Environments whose budget is spent sit the round out.
    fn step_all(&mut self, round: u32, budgets: &[u32]) -> Vec<Vec<EvalRequest>> {
        let config = &self.config;
        let log_table = &self.log_table;
        let envs = &mut self.envs;
        self.pool.install(|| {
            envs.par_iter_mut()
                .enumerate()
                .map(|(i, env)| {
                    if env.is_terminal() || round >= budgets[i] {
                        return Vec::new();
                    }
                    if let Err(e) = env.run_one_policy_step(config, log_table) {
                        warn!(env = i, error = %e, "policy step failed, skipping round");
                        return Vec::new();
                    }
                    env.collect_requests(config.history_depth)
                })
                .collect()
        })
    }

    /// Run every evaluator over its share of `requests` and route the
    /// results back to per-environment inboxes.
    fn evaluate(&self, requests: Vec<Vec<EvalRequest>>) -> Result<Vec<Vec<EvalReply>>, BatchError> {
        let num_actions = self.board_size * self.board_size;
        let mut inboxes: Vec<Vec<EvalReply>> = (0..requests.len()).map(|_| Vec::new()).collect();

        for (index, evaluator) in self.evaluators.iter().enumerate() {
            let batch: Vec<(usize, &EvalRequest)> = requests
                .iter()
                .enumerate()
                .flat_map(|(env, reqs)| {
                    reqs.iter()
                        .filter(move |req| req.evaluator == index)
                        .map(move |req| (env, req))
                })
                .collect();
            if batch.is_empty() {
                continue;
            }

            let chunk_size = match self.config.max_batch_size {
                0 => batch.len(),
                n => n,
            };
            for chunk in batch.chunks(chunk_size) {
                let inputs: Vec<&[f32]> = chunk.iter().map(|(_, req)| req.input.as_slice()).collect();
                let results = evaluator.evaluate_batch(&inputs, num_actions)?;
                if results.len() != chunk.len() {
                    return Err(EvaluatorError::EvaluationFailed(format!(
                        "{} returned {} results for {} inputs",
                        evaluator.name(),
                        results.len(),
                        chunk.len()
                    ))
                    .into());
                }
                for (&(env, req), result) in chunk.iter().zip(results) {
                    inboxes[env].push(EvalReply {
                        tree: req.tree,
                        node: req.node,
                        result,
                    });
                }
            }
            debug!(
                evaluator = evaluator.name(),
                batch = batch.len(),
                "batch evaluated"
            );
        }
        Ok(inboxes)
    }

    fn absorb_all(&mut self, inboxes: Vec<Vec<EvalReply>>) {
        let envs = &mut self.envs;
        self.pool.install(|| {
            envs.par_iter_mut()
                .zip(inboxes.into_par_iter())
                .for_each(|(env, inbox)| {
                    env.absorb(inbox);
                });
        });
    }

    /// Search and commit moves until every game has ended.
    pub fn play_until_terminal(&mut self) -> Result<(), BatchError> {
        let budgets = vec![self.config.num_simulations; self.evaluators.len()];
        self.play_with(&budgets)
    }

    fn play_with(&mut self, budgets: &[u32]) -> Result<(), BatchError> {
        let bound = self.config.confidence_bound;
        let mut ply = 0u32;
        loop {
            let live = self.live_count();
            if live == 0 {
                break;
            }

            self.run_simulations_per_evaluator(budgets)?;

            let mut committed = 0;
            let mut confident = 0;
            for (i, env) in self.envs.iter_mut().enumerate() {
                if env.is_terminal() {
                    continue;
                }
                let clears_bound = env.confident_move(bound).is_some();
                match env.commit_best_move() {
                    Ok(action) => {
                        committed += 1;
                        if clears_bound {
                            confident += 1;
                        } else {
                            trace!(env = i, action, bound, "no move clears the confidence bound");
                        }
                        trace!(env = i, action, "move committed");
                    }
                    Err(e) => warn!(env = i, error = %e, "commit failed"),
                }
            }
            let freed: usize = self.envs.iter_mut().map(GameEnvironment::reclaim).sum();
            ply += 1;
            self.commits += committed;
            self.confident_commits += confident;
            debug!(ply, live, committed, confident, freed, "commit pass");

            if committed == 0 {
                return Err(BatchError::Stalled(live));
            }
        }
        info!(plies = ply, games = self.envs.len(), "all games finished");
        Ok(())
    }

    /// Play `amount` uniformly random legal moves in every live game.
    ///
    /// With `mirrored`, each consecutive pair of environments receives the
    /// same moves.
    pub fn make_random_moves(&mut self, amount: usize, mirrored: bool) -> Result<(), BatchError> {
        if mirrored && self.envs.len() % 2 != 0 {
            return Err(BatchError::OddEnvironmentCount(self.envs.len()));
        }
        let group = if mirrored { 2 } else { 1 };
        for _ in 0..amount {
            for envs in self.envs.chunks_mut(group) {
                if envs.iter().any(GameEnvironment::is_terminal) {
                    continue;
                }
                let legal = envs[0].legal_actions();
                let Some(&action) = legal.choose(&mut self.rng) else {
                    continue;
                };
                for env in envs.iter_mut() {
                    env.apply_move(action)?;
                }
            }
        }
        Ok(())
    }

    /// Pit evaluator 1 against evaluator 0.
    ///
    /// Pairs of environments share a random opening, then every
    /// even-indexed environment swaps which evaluator plays Black. Returns
    /// `(wins_1 - wins_0) / decisive_games`, or 0.0 when nothing was
    /// decided.
    ///
    /// `simulations[i]` is the per-move budget of evaluator `i`.
    pub fn evaluate_matchup(
        &mut self,
        random_opening_moves: usize,
        simulations: [u32; 2],
    ) -> Result<f32, BatchError> {
        if self.evaluators.len() != 2 {
            return Err(BatchError::SingleTree);
        }
        if self.envs.len() % 2 != 0 {
            return Err(BatchError::OddEnvironmentCount(self.envs.len()));
        }

        self.make_random_moves(random_opening_moves, true)?;
        for env in self.envs.iter_mut().step_by(2) {
            env.swap_models();
        }
        self.play_with(&simulations)?;

        let (mut first_wins, mut second_wins) = (0u32, 0u32);
        for env in &self.envs {
            let Some(winner) = env.result().winner() else {
                continue;
            };
            // Black is evaluator 0 unless the models were swapped
            let winner = if env.models_swapped() {
                winner.opposite()
            } else {
                winner
            };
            match winner {
                Color::Black => first_wins += 1,
                Color::White => second_wins += 1,
            }
        }

        let decisive = first_wins + second_wins;
        info!(
            first = self.evaluators[0].name(),
            second = self.evaluators[1].name(),
            first_wins,
            second_wins,
            draws = self.envs.len() as u32 - decisive,
            "matchup finished"
        );
        if decisive == 0 {
            warn!("no decisive games in matchup");
            return Ok(0.0);
        }
        Ok((second_wins as f32 - first_wins as f32) / decisive as f32)
    }

    /// Play every game out from a random opening. Returns
    /// [`Batcher::average_winner`].
    pub fn selfplay(&mut self, random_opening_moves: usize) -> Result<f32, BatchError> {
        self.make_random_moves(random_opening_moves, false)?;
        self.play_until_terminal()?;
        Ok(self.average_winner())
    }

    /// Mean outcome over finished games: Black wins count -1, White wins +1.
    pub fn average_winner(&self) -> f32 {
        let mut finished = 0u32;
        let mut total = 0.0f32;
        for env in self.envs.iter().filter(|env| env.is_terminal()) {
            finished += 1;
            total += match env.result().winner() {
                Some(Color::Black) => -1.0,
                Some(Color::White) => 1.0,
                None => 0.0,
            };
        }
        if finished == 0 {
            return 0.0;
        }
        total / finished as f32
    }

    /// Datapoints from every tree of every finished game.
    pub fn export_training_data(&self) -> Vec<Datapoint> {
        let mut out = Vec::new();
        for (i, env) in self.envs.iter().enumerate() {
            if !env.is_terminal() {
                warn!(env = i, "skipping unfinished game during export");
                continue;
            }
            let result = env.result();
            for tree in env.trees() {
                collect_tree(tree, result, &mut out);
            }
        }
        debug!(datapoints = out.len(), "training data exported");
        out
    }
}
