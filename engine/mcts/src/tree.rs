//! MCTS tree structure with arena allocation.
//!
//! Nodes live in a contiguous Vec and are referenced by [`NodeId`]
//! indices. Subtrees pruned by a committed move are parked on a deletion
//! queue and only returned to the free list by [`SearchTree::reclaim`],
//! which the batcher calls between rounds so no in-flight request ever
//! points at a recycled slot.

use games_gomoku::{Action, Board, BoardError};
use thiserror::Error;
use tracing::trace;

use crate::config::MctsConfig;
use crate::evaluator::EvalResult;
use crate::log_table::LogTable;
use crate::node::{NodeId, SearchNode};

/// Errors raised by tree operations.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("Illegal move: {0}")]
    IllegalMove(#[from] BoardError),

    #[error("Node has not been evaluated yet")]
    Uninitialized,

    #[error("Node has no untried actions")]
    NoUntriedActions,

    #[error("No child is eligible for selection")]
    NoSelectableChild,

    #[error("Current node has no children to commit")]
    NoBestChild,

    #[error("{0} pending node(s) were never evaluated")]
    UnevaluatedNodes(usize),
}

/// Outcome of one selection/expansion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyStep {
    /// A new node was expanded and awaits evaluation.
    Pending(NodeId),
    /// A terminal node was reached and already backpropagated.
    Resolved(NodeId),
}

/// MCTS tree with arena-based node storage.
#[derive(Debug)]
pub struct SearchTree {
    /// Arena storing all nodes, live and free
    nodes: Vec<SearchNode>,

    /// Recyclable arena slots
    free: Vec<NodeId>,

    /// Root node index (always 0)
    root: NodeId,

    /// Committed real position
    current: NodeId,

    /// Nodes awaiting evaluator output
    pending: Vec<NodeId>,

    /// Roots of detached subtrees awaiting reclaim
    deletion_queue: Vec<NodeId>,
}

impl SearchTree {
    /// Create a tree rooted at `board`. A non-terminal root is queued for
    /// evaluation.
    pub fn new(board: Board) -> Self {
        let root_node = SearchNode::new_root(board);
        let pending = if root_node.needs_evaluation() {
            vec![NodeId(0)]
        } else {
            Vec::new()
        };
        Self {
            nodes: vec![root_node],
            free: Vec::new(),
            root: NodeId(0),
            current: NodeId(0),
            pending,
            deletion_queue: Vec::new(),
        }
    }

    /// Get the root node ID.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Node of the committed real position.
    #[inline]
    pub fn current(&self) -> NodeId {
        self.current
    }

    /// Board of the committed real position.
    #[inline]
    pub fn board(&self) -> &Board {
        &self.get(self.current).board
    }

    /// Get a reference to a node by ID.
    #[inline]
    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id.index()]
    }

    /// Get a mutable reference to a node by ID.
    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id.index()]
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Check if tree is empty (never true after construction).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nodes queued for evaluation, in queue order.
    #[inline]
    pub fn pending_evaluation(&self) -> &[NodeId] {
        &self.pending
    }

    /// Detached subtree roots not yet reclaimed.
    #[inline]
    pub fn deletion_queue(&self) -> &[NodeId] {
        &self.deletion_queue
    }

    /// Store a node, reusing a free slot when one exists.
    fn allocate(&mut self, node: SearchNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id.index()] = node;
            id
        } else {
            let id = NodeId(self.nodes.len() as u32);
            self.nodes.push(node);
            id
        }
    }

    /// Populate a node from evaluator output. Returns false if the node
    /// was not awaiting evaluation.
    pub fn initialize(&mut self, id: NodeId, result: &EvalResult) -> bool {
        self.get_mut(id).initialize(result)
    }

    /// Expand the highest-prior untried action of `id`.
    ///
    /// A non-terminal child is queued for evaluation; a terminal one is
    /// resolved on creation.
    pub fn expand(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        if !self.get(id).is_initialized() {
            return Err(TreeError::Uninitialized);
        }
        let (action, prior) = self
            .get_mut(id)
            .pop_untried()
            .ok_or(TreeError::NoUntriedActions)?;
        let board = self.get(id).board.apply(action)?;

        let child = SearchNode::new_child(board, id, action, prior);
        let needs_evaluation = child.needs_evaluation();
        let child_id = self.allocate(child);
        self.get_mut(id).children.push(child_id);
        if needs_evaluation {
            self.pending.push(child_id);
        }
        Ok(child_id)
    }

    /// Select the child of `id` with the highest selection score.
    ///
    /// Unvisited children are skipped; ties keep the earliest child.
    pub fn best_child(
        &self,
        id: NodeId,
        config: &MctsConfig,
        log_table: &LogTable,
    ) -> Option<NodeId> {
        let node = self.get(id);
        let mover = node.color_to_move();
        let two_ln_parent = 2.0 * log_table.ln(node.visit_count);

        let mut best = None;
        let mut best_score = f32::NEG_INFINITY;
        for &child_id in &node.children {
            let Some(score) = self.get(child_id).selection_score(
                mover,
                two_ln_parent,
                config.exploration_bias,
                config.policy_bias,
                config.value_bias,
            ) else {
                continue;
            };
            if best.is_none() || score > best_score {
                best = Some(child_id);
                best_score = score;
            }
        }
        best
    }

    /// Most-visited child of `id`; ties keep the earliest child.
    ///
    /// With `confidence_bound`, a child is only eligible when its share of
    /// the parent's visits exceeds the bound.
    pub fn abs_best_child(&self, id: NodeId, confidence_bound: Option<f32>) -> Option<NodeId> {
        let node = self.get(id);
        let parent_visits = node.visit_count.max(1) as f32;

        let mut best: Option<(NodeId, u32)> = None;
        for &child_id in &node.children {
            let visits = self.get(child_id).visit_count;
            if let Some(bound) = confidence_bound {
                if visits as f32 / parent_visits <= bound {
                    continue;
                }
            }
            if best.map_or(true, |(_, most)| visits > most) {
                best = Some((child_id, visits));
            }
        }
        best.map(|(child_id, _)| child_id)
    }

    /// Add one visit and a Black-positive `value` to `leaf` and its
    /// ancestors, stopping after `head`.
    pub fn backpropagate(&mut self, leaf: NodeId, value: f32, head: NodeId) {
        let mut id = leaf;
        while id.is_some() {
            let node = self.get_mut(id);
            node.visit_count += 1;
            node.value_sum += value;
            if id == head {
                break;
            }
            id = node.parent;
        }
    }

    /// Descend from `current` to the next node needing work.
    pub fn run_one_policy_step(
        &mut self,
        config: &MctsConfig,
        log_table: &LogTable,
    ) -> Result<PolicyStep, TreeError> {
        let mut id = self.current;
        loop {
            let node = self.get(id);
            if node.is_terminal() {
                let value = node.value;
                self.backpropagate(id, value, self.current);
                trace!(node = id.0, value, "terminal node resolved");
                return Ok(PolicyStep::Resolved(id));
            }
            if !node.is_initialized() {
                return Err(TreeError::Uninitialized);
            }
            if !node.untried_actions().is_empty() {
                let child = self.expand(id)?;
                let child_node = self.get(child);
                if child_node.is_terminal() {
                    let value = child_node.value;
                    self.backpropagate(child, value, self.current);
                    trace!(node = child.0, value, "expanded into terminal node");
                    return Ok(PolicyStep::Resolved(child));
                }
                trace!(node = child.0, action = child_node.action, "expanded");
                return Ok(PolicyStep::Pending(child));
            }
            id = self
                .best_child(id, config, log_table)
                .ok_or(TreeError::NoSelectableChild)?;
        }
    }

    /// Commit a real move, advancing `current`.
    ///
    /// Siblings of the chosen child are detached into the deletion queue.
    /// If no child exists for `action`, a fresh one is created and queued
    /// for evaluation.
    pub fn apply_move(&mut self, action: Action) -> Result<(), TreeError> {
        let current = self.current;
        let existing = self
            .get(current)
            .children
            .iter()
            .copied()
            .find(|&child| self.get(child).action == action);

        let next = match existing {
            Some(child) => {
                let node = self.get_mut(current);
                let siblings = std::mem::replace(&mut node.children, vec![child]);
                self.deletion_queue
                    .extend(siblings.into_iter().filter(|&id| id != child));
                child
            }
            None => {
                let board = self.get(current).board.apply(action)?;
                let node = self.get_mut(current);
                let prior = node
                    .untried_actions()
                    .iter()
                    .find(|&&(a, _)| a == action)
                    .map_or(0.0, |&(_, p)| p);
                node.remove_untried(action);
                let detached = std::mem::take(&mut node.children);
                self.deletion_queue.extend(detached);

                let child = SearchNode::new_child(board, current, action, prior);
                let needs_evaluation = child.needs_evaluation();
                let child_id = self.allocate(child);
                self.get_mut(current).children.push(child_id);
                if needs_evaluation {
                    self.pending.push(child_id);
                }
                child_id
            }
        };

        // An unevaluated committed ancestor is never searched again
        if self.get(current).needs_evaluation() {
            self.pending.retain(|&id| id != current);
        }
        self.current = next;
        Ok(())
    }

    /// Free every node owned by the deletion queue. Returns the number of
    /// slots freed.
    pub fn reclaim(&mut self) -> usize {
        let mut stack = std::mem::take(&mut self.deletion_queue);
        let mut freed = 0;
        while let Some(id) = stack.pop() {
            let node = self.get_mut(id);
            if node.is_free() {
                continue;
            }
            stack.append(&mut node.children);
            node.release();
            self.free.push(id);
            freed += 1;
        }
        if freed > 0 {
            let nodes = &self.nodes;
            self.pending.retain(|&id| !nodes[id.index()].is_free());
        }
        freed
    }

    /// Empty the pending list, reporting nodes that were never evaluated.
    pub fn clear_pending(&mut self) -> Result<(), TreeError> {
        let unevaluated = self
            .pending
            .iter()
            .filter(|&&id| self.get(id).needs_evaluation())
            .count();
        self.pending.clear();
        if unevaluated > 0 {
            return Err(TreeError::UnevaluatedNodes(unevaluated));
        }
        Ok(())
    }

    /// Actions from the root down to `id`.
    pub fn move_history(&self, id: NodeId) -> Vec<Action> {
        let mut moves = Vec::new();
        let mut node_id = id;
        while node_id.is_some() && node_id != self.root {
            let node = self.get(node_id);
            moves.push(node.action);
            node_id = node.parent;
        }
        moves.reverse();
        moves
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let current = self.get(self.current);
        TreeStats {
            live_nodes: self.len(),
            free_slots: self.free.len(),
            current_visits: current.visit_count,
            current_value: current.mean_value(),
        }
    }
}

/// Statistics about an MCTS tree.
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub live_nodes: usize,
    pub free_slots: usize,
    pub current_visits: u32,
    /// Black-positive mean at the current node
    pub current_value: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::{Evaluator, UniformEvaluator};

    fn uniform(num_actions: usize) -> EvalResult {
        UniformEvaluator::new().evaluate(&[], num_actions).unwrap()
    }

    fn evaluated_tree(size: usize) -> SearchTree {
        let mut tree = SearchTree::new(Board::new(size).unwrap());
        let root = tree.root();
        assert!(tree.initialize(root, &uniform(size * size)));
        tree.backpropagate(root, tree.get(root).value, root);
        tree.clear_pending().unwrap();
        tree
    }

    #[test]
    fn test_new_tree() {
        let tree = SearchTree::new(Board::new(5).unwrap());

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root(), NodeId(0));
        assert_eq!(tree.current(), tree.root());
        assert_eq!(tree.pending_evaluation(), &[NodeId(0)]);

        let root = tree.get(tree.root());
        assert!(root.parent.is_none());
        assert!(root.needs_evaluation());
    }

    #[test]
    fn test_expand_requires_initialization() {
        let mut tree = SearchTree::new(Board::new(5).unwrap());
        assert!(matches!(
            tree.expand(tree.root()),
            Err(TreeError::Uninitialized)
        ));
    }

    #[test]
    fn test_expand_descending_prior_order() {
        let mut tree = SearchTree::new(Board::new(5).unwrap());
        let root = tree.root();
        let policy: Vec<f32> = (0..25).map(|a| ((a * 7) % 25) as f32 + 1.0).collect();
        tree.initialize(root, &EvalResult { policy, value: 0.0 });

        let mut last_prior = f32::INFINITY;
        let mut seen = std::collections::HashSet::new();
        while !tree.get(root).untried_actions().is_empty() {
            let child = tree.expand(root).unwrap();
            let node = tree.get(child);
            assert!(node.prior < last_prior);
            assert!(seen.insert(node.action));
            assert_eq!(node.parent, root);
            last_prior = node.prior;
        }
        assert_eq!(seen.len(), 25);
        assert_eq!(tree.get(root).children.len(), 25);
        assert_eq!(tree.pending_evaluation().len(), 26);
        assert!(matches!(
            tree.expand(root),
            Err(TreeError::NoUntriedActions)
        ));
    }

    #[test]
    fn test_untried_and_children_partition_legal_actions() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        for _ in 0..7 {
            tree.expand(root).unwrap();
        }
        let node = tree.get(root);
        let mut covered: Vec<Action> = node
            .children
            .iter()
            .map(|&c| tree.get(c).action)
            .chain(node.untried_actions().iter().map(|&(a, _)| a))
            .collect();
        covered.sort_unstable();
        assert_eq!(covered, node.board.legal_actions());
    }

    #[test]
    fn test_backpropagate_stops_at_head() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        let child = tree.expand(root).unwrap();
        tree.initialize(child, &uniform(25));
        let grandchild = tree.expand(child).unwrap();

        let root_visits = tree.get(root).visit_count;
        let root_sum = tree.get(root).value_sum;

        tree.backpropagate(grandchild, 1.0, child);

        assert_eq!(tree.get(grandchild).visit_count, 1);
        assert_eq!(tree.get(child).visit_count, 1);
        assert!((tree.get(child).value_sum - 1.0).abs() < 1e-6);

        // Ancestors of the head are untouched
        assert_eq!(tree.get(root).visit_count, root_visits);
        assert!((tree.get(root).value_sum - root_sum).abs() < 1e-6);

        // Without a head inside the path the walk reaches the root
        tree.backpropagate(grandchild, -1.0, root);
        assert_eq!(tree.get(root).visit_count, root_visits + 1);
    }

    #[test]
    fn test_best_child_skips_unvisited_and_keeps_first_on_tie() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        let config = MctsConfig::for_testing();
        let log_table = LogTable::new();

        let a = tree.expand(root).unwrap();
        let b = tree.expand(root).unwrap();
        assert_eq!(tree.best_child(root, &config, &log_table), None);

        tree.get_mut(b).visit_count = 1;
        assert_eq!(tree.best_child(root, &config, &log_table), Some(b));

        // Identical statistics: first child wins
        tree.get_mut(a).visit_count = 1;
        assert_eq!(tree.best_child(root, &config, &log_table), Some(a));
    }

    #[test]
    fn test_best_child_resigns_for_mover() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        let config = MctsConfig::for_testing().with_exploration_bias(0.0);
        let log_table = LogTable::new();

        let a = tree.expand(root).unwrap();
        let b = tree.expand(root).unwrap();
        tree.get_mut(root).visit_count = 3;
        // Black to move at root: a good-for-Black child is preferred
        tree.get_mut(a).visit_count = 1;
        tree.get_mut(a).value_sum = -0.5;
        tree.get_mut(b).visit_count = 1;
        tree.get_mut(b).value_sum = 0.5;
        assert_eq!(tree.best_child(root, &config, &log_table), Some(b));

        // One ply deeper White is choosing and wants the Black-negative child
        tree.initialize(b, &uniform(25));
        let c = tree.expand(b).unwrap();
        let d = tree.expand(b).unwrap();
        tree.get_mut(c).visit_count = 1;
        tree.get_mut(c).value_sum = -0.5;
        tree.get_mut(d).visit_count = 1;
        tree.get_mut(d).value_sum = 0.5;
        assert_eq!(tree.best_child(b, &config, &log_table), Some(c));
    }

    #[test]
    fn test_abs_best_child() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        assert_eq!(tree.abs_best_child(root, None), None);

        let a = tree.expand(root).unwrap();
        let b = tree.expand(root).unwrap();
        let c = tree.expand(root).unwrap();
        tree.get_mut(root).visit_count = 10;
        tree.get_mut(a).visit_count = 3;
        tree.get_mut(b).visit_count = 6;
        tree.get_mut(c).visit_count = 6;

        // Ties keep the first
        assert_eq!(tree.abs_best_child(root, None), Some(b));
        // 6 / 10 > 0.5
        assert_eq!(tree.abs_best_child(root, Some(0.5)), Some(b));
        // 6 / 10 is not > 0.6
        assert_eq!(tree.abs_best_child(root, Some(0.6)), None);
    }

    #[test]
    fn test_policy_step_expands_then_selects() {
        let mut tree = evaluated_tree(5);
        let config = MctsConfig::for_testing();
        let log_table = LogTable::new();

        let step = tree.run_one_policy_step(&config, &log_table).unwrap();
        let PolicyStep::Pending(first) = step else {
            panic!("expected a pending node, got {step:?}");
        };
        // Uniform priors expand in row-major order
        assert_eq!(tree.get(first).action, 0);
        assert_eq!(tree.pending_evaluation(), &[first]);
    }

    #[test]
    fn test_policy_step_on_uninitialized_current() {
        let mut tree = SearchTree::new(Board::new(5).unwrap());
        let config = MctsConfig::for_testing();
        assert!(matches!(
            tree.run_one_policy_step(&config, &LogTable::new()),
            Err(TreeError::Uninitialized)
        ));
    }

    #[test]
    fn test_policy_step_resolves_terminal() {
        // Black has four in column 0 and it is Black to move
        let mut board = Board::new(5).unwrap();
        for (x, y) in [(0, 0), (4, 0), (0, 1), (4, 1), (0, 2), (4, 2), (0, 3), (3, 4)] {
            board = board.apply_xy(x, y).unwrap();
        }
        let mut tree = SearchTree::new(board);
        let root = tree.root();
        let mut policy = vec![0.0; 25];
        policy[20] = 1.0;
        tree.initialize(root, &EvalResult { policy, value: 0.0 });
        tree.clear_pending().unwrap();

        let config = MctsConfig::for_testing();
        let step = tree.run_one_policy_step(&config, &LogTable::new()).unwrap();
        let PolicyStep::Resolved(win) = step else {
            panic!("expected a resolved node, got {step:?}");
        };
        assert_eq!(tree.get(win).action, 20);
        assert!(tree.get(win).is_terminal());
        assert_eq!(tree.get(win).visit_count, 1);
        assert!((tree.get(root).value_sum - 1.0).abs() < 1e-6);
        assert!(tree.pending_evaluation().is_empty());
    }

    #[test]
    fn test_apply_move_existing_child_prunes_siblings() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        let a = tree.expand(root).unwrap();
        let b = tree.expand(root).unwrap();
        tree.initialize(a, &uniform(25));
        tree.initialize(b, &uniform(25));
        tree.clear_pending().unwrap();
        let b_action = tree.get(b).action;

        tree.apply_move(b_action).unwrap();
        assert_eq!(tree.current(), b);
        assert_eq!(tree.get(root).children, vec![b]);
        assert_eq!(tree.deletion_queue(), &[a]);

        assert_eq!(tree.reclaim(), 1);
        assert!(tree.get(a).is_free());
        assert!(tree.deletion_queue().is_empty());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_apply_move_fresh_child() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        let a = tree.expand(root).unwrap();
        tree.initialize(a, &uniform(25));
        tree.clear_pending().unwrap();

        tree.apply_move(12).unwrap();
        let current = tree.current();
        assert_ne!(current, a);
        assert_eq!(tree.get(current).action, 12);
        assert!(tree.get(current).needs_evaluation());
        assert_eq!(tree.pending_evaluation(), &[current]);
        assert_eq!(tree.get(root).children, vec![current]);
        assert!(tree
            .get(root)
            .untried_actions()
            .iter()
            .all(|&(action, _)| action != 12));
        assert_eq!(tree.move_history(current), vec![12]);

        // The detached child's slot is recycled by the next allocation
        assert_eq!(tree.reclaim(), 1);
        tree.apply_move(3).unwrap();
        assert_eq!(tree.current(), a);
        assert_eq!(tree.move_history(tree.current()), vec![12, 3]);
    }

    #[test]
    fn test_apply_move_drops_unevaluated_ancestor_from_pending() {
        let mut tree = SearchTree::new(Board::new(5).unwrap());
        tree.apply_move(0).unwrap();
        tree.apply_move(1).unwrap();

        let current = tree.current();
        assert_eq!(tree.pending_evaluation(), &[current]);
        assert!(tree.get(tree.root()).needs_evaluation());
        assert_eq!(tree.move_history(current), vec![0, 1]);
    }

    #[test]
    fn test_apply_move_rejects_illegal() {
        let mut tree = SearchTree::new(Board::new(5).unwrap());
        tree.apply_move(0).unwrap();
        assert!(matches!(
            tree.apply_move(0),
            Err(TreeError::IllegalMove(BoardError::Occupied(0)))
        ));
        assert!(matches!(
            tree.apply_move(25),
            Err(TreeError::IllegalMove(BoardError::OutOfBounds { .. }))
        ));
    }

    #[test]
    fn test_reclaim_frees_whole_subtree() {
        let mut tree = evaluated_tree(5);
        let root = tree.root();
        let a = tree.expand(root).unwrap();
        tree.initialize(a, &uniform(25));
        let grandchildren: Vec<NodeId> = (0..3).map(|_| tree.expand(a).unwrap()).collect();
        for &id in &grandchildren {
            tree.initialize(id, &uniform(25));
        }
        let b = tree.expand(root).unwrap();
        tree.initialize(b, &uniform(25));
        tree.clear_pending().unwrap();

        let b_action = tree.get(b).action;
        tree.apply_move(b_action).unwrap();
        assert_eq!(tree.reclaim(), 4);
        let stats = tree.stats();
        assert_eq!(stats.live_nodes, 2);
        assert_eq!(stats.free_slots, 4);

        // Freed slots drop their boards
        for id in grandchildren.into_iter().chain([a]) {
            assert!(tree.get(id).is_free());
            assert_eq!(tree.get(id).board.total_cells(), 0);
        }
        assert_eq!(tree.get(b).board.total_cells(), 25);
    }

    #[test]
    fn test_clear_pending_reports_unevaluated() {
        let mut tree = SearchTree::new(Board::new(5).unwrap());
        assert!(matches!(
            tree.clear_pending(),
            Err(TreeError::UnevaluatedNodes(1))
        ));
        assert!(tree.pending_evaluation().is_empty());
    }
}
