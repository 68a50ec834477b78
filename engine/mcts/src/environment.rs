//! One game in progress, searched by one or two trees.
//!
//! In dual-tree mode tree 0 searches Black's moves and tree 1 searches
//! White's, each backed by its own evaluator. Both trees always sit at the
//! same real position.

use games_gomoku::{Action, Board, BoardError, Color, GameResult};
use tracing::{trace, warn};

use crate::config::MctsConfig;
use crate::encoding::encode_node;
use crate::evaluator::EvalResult;
use crate::log_table::LogTable;
use crate::node::NodeId;
use crate::tree::{PolicyStep, SearchTree, TreeError};

/// A node that needs evaluator output.
#[derive(Debug, Clone)]
pub struct EvalRequest {
    pub tree: usize,
    pub node: NodeId,
    /// Index into the batcher's evaluator list
    pub evaluator: usize,
    pub input: Vec<f32>,
}

/// Evaluator output routed back to its node.
#[derive(Debug, Clone)]
pub struct EvalReply {
    pub tree: usize,
    pub node: NodeId,
    pub result: EvalResult,
}

/// A single game with its search trees.
#[derive(Debug)]
pub struct GameEnvironment {
    trees: Vec<SearchTree>,
    next_color: Color,
    models_swapped: bool,
}

impl GameEnvironment {
    /// Empty board of `board_size`; `dual_tree` gives each color its own tree.
    pub fn new(board_size: usize, dual_tree: bool) -> Result<Self, BoardError> {
        let board = Board::new(board_size)?;
        Ok(Self::from_board(board, dual_tree))
    }

    /// Start from an arbitrary position.
    pub fn from_board(board: Board, dual_tree: bool) -> Self {
        let next_color = board.color_to_move();
        let tree_count = if dual_tree { 2 } else { 1 };
        let trees = (0..tree_count)
            .map(|_| SearchTree::new(board.clone()))
            .collect();
        Self {
            trees,
            next_color,
            models_swapped: false,
        }
    }

    #[inline]
    pub fn trees(&self) -> &[SearchTree] {
        &self.trees
    }

    #[inline]
    pub fn is_dual(&self) -> bool {
        self.trees.len() == 2
    }

    #[inline]
    pub fn next_color(&self) -> Color {
        self.next_color
    }

    #[inline]
    pub fn models_swapped(&self) -> bool {
        self.models_swapped
    }

    /// Exchange which evaluator backs each tree.
    pub fn swap_models(&mut self) {
        self.models_swapped = !self.models_swapped;
    }

    /// The real position.
    #[inline]
    pub fn board(&self) -> &Board {
        self.trees[0].board()
    }

    #[inline]
    pub fn result(&self) -> GameResult {
        self.board().result()
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.board().is_terminal()
    }

    pub fn legal_actions(&self) -> Vec<Action> {
        self.board().legal_actions()
    }

    /// Tree searching for the side to move.
    #[inline]
    pub fn active_tree_index(&self) -> usize {
        if self.is_dual() {
            self.next_color.index()
        } else {
            0
        }
    }

    /// Evaluator serving tree `tree`.
    #[inline]
    pub fn evaluator_index(&self, tree: usize) -> usize {
        if self.is_dual() {
            tree ^ usize::from(self.models_swapped)
        } else {
            0
        }
    }

    /// Evaluator searching for the side to move.
    #[inline]
    pub fn next_evaluator(&self) -> usize {
        self.evaluator_index(self.active_tree_index())
    }

    /// Highest visit count among the trees' current nodes.
    pub fn max_head_visits(&self) -> u32 {
        self.trees
            .iter()
            .map(|tree| tree.get(tree.current()).visit_count)
            .max()
            .unwrap_or(0)
    }

    /// Play `action` on every tree.
    pub fn apply_move(&mut self, action: Action) -> Result<(), TreeError> {
        for tree in &mut self.trees {
            tree.apply_move(action)?;
        }
        self.next_color = self.next_color.opposite();
        Ok(())
    }

    pub fn apply_move_xy(&mut self, x: usize, y: usize) -> Result<(), TreeError> {
        let size = self.board().size();
        if x >= size || y >= size {
            return Err(TreeError::IllegalMove(BoardError::OutOfBounds {
                action: y * size + x,
                cells: size * size,
            }));
        }
        let action = self.board().action_index(x, y);
        self.apply_move(action)
    }

    /// One selection step on the active tree.
    pub fn run_one_policy_step(
        &mut self,
        config: &MctsConfig,
        log_table: &LogTable,
    ) -> Result<PolicyStep, TreeError> {
        let active = self.active_tree_index();
        self.trees[active].run_one_policy_step(config, log_table)
    }

    /// `(tree, node, evaluator)` for every pending node.
    pub fn pending_evaluation(&self) -> Vec<(usize, NodeId, usize)> {
        self.trees
            .iter()
            .enumerate()
            .flat_map(|(t, tree)| {
                let evaluator = self.evaluator_index(t);
                tree.pending_evaluation()
                    .iter()
                    .filter(move |&&id| tree.get(id).needs_evaluation())
                    .map(move |&id| (t, id, evaluator))
            })
            .collect()
    }

    /// Encode every pending node.
    pub fn collect_requests(&self, history_depth: usize) -> Vec<EvalRequest> {
        self.pending_evaluation()
            .into_iter()
            .map(|(tree, node, evaluator)| EvalRequest {
                tree,
                node,
                evaluator,
                input: encode_node(&self.trees[tree], node, history_depth),
            })
            .collect()
    }

    /// Initialize and backpropagate evaluated nodes, then clear the pending
    /// lists. Returns the number of nodes absorbed.
    pub fn absorb(&mut self, replies: Vec<EvalReply>) -> usize {
        let mut absorbed = 0;
        for reply in replies {
            let Some(tree) = self.trees.get_mut(reply.tree) else {
                warn!(tree = reply.tree, "reply for unknown tree dropped");
                continue;
            };
            if !tree.initialize(reply.node, &reply.result) {
                trace!(node = reply.node.0, "reply for resolved node ignored");
                continue;
            }
            let value = tree.get(reply.node).value;
            let head = tree.current();
            tree.backpropagate(reply.node, value, head);
            absorbed += 1;
        }
        for (t, tree) in self.trees.iter_mut().enumerate() {
            if let Err(e) = tree.clear_pending() {
                warn!(tree = t, error = %e, "pending nodes left unevaluated");
            }
        }
        absorbed
    }

    /// Commit the active tree's most-visited move.
    pub fn commit_best_move(&mut self) -> Result<Action, TreeError> {
        let tree = &self.trees[self.active_tree_index()];
        let best = tree
            .abs_best_child(tree.current(), None)
            .ok_or(TreeError::NoBestChild)?;
        let action = tree.get(best).action;
        self.apply_move(action)?;
        Ok(action)
    }

    /// The active tree's most-visited move, if its visit share exceeds
    /// `bound`.
    pub fn confident_move(&self, bound: f32) -> Option<Action> {
        let tree = &self.trees[self.active_tree_index()];
        tree.abs_best_child(tree.current(), Some(bound))
            .map(|id| tree.get(id).action)
    }

    /// Reclaim detached subtrees on every tree.
    pub fn reclaim(&mut self) -> usize {
        self.trees.iter_mut().map(SearchTree::reclaim).sum()
    }
}
