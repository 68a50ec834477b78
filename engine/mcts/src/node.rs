//! MCTS tree node representation.
//!
//! Each node owns the board reached by playing `action` from its parent.
//! Values stored on a node are always from Black's perspective; selection
//! re-signs them for whoever is choosing.

use games_gomoku::{Action, Board, Color};

use crate::evaluator::EvalResult;

/// Index into the node arena. Using a newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    pub fn is_some(self) -> bool {
        !self.is_none()
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Lifecycle of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Awaiting evaluator output; cannot be expanded yet.
    Uninitialized,
    /// Value and priors populated.
    Initialized,
    /// Game over at this board; never evaluated, never expanded.
    Terminal,
    /// Arena slot on the free list.
    Free,
}

/// A node in the MCTS tree.
#[derive(Debug, Clone)]
pub struct SearchNode {
    /// Position at this node
    pub board: Board,

    /// Parent node index (NONE for root)
    pub parent: NodeId,

    /// Action that led to this node from parent
    pub action: Action,

    /// Number of times this node has been visited
    pub visit_count: u32,

    /// Sum of Black-positive evaluations backpropagated through this node
    pub value_sum: f32,

    /// Evaluator (or terminal) value, Black-positive
    pub value: f32,

    /// Prior probability assigned by the parent's expansion
    pub prior: f32,

    /// Expanded children in expansion order
    pub children: Vec<NodeId>,

    /// Legal actions not yet expanded, sorted so `pop()` yields the
    /// highest prior (ties: lowest action first)
    untried: Vec<(Action, f32)>,

    status: NodeStatus,
}

impl SearchNode {
    /// Create a root node for `board`.
    pub fn new_root(board: Board) -> Self {
        Self::new_child(board, NodeId::NONE, 0, 1.0)
    }

    /// Create a node reached from `parent` by `action`.
    pub fn new_child(board: Board, parent: NodeId, action: Action, prior: f32) -> Self {
        let (status, value) = if board.is_terminal() {
            (NodeStatus::Terminal, board.result().value())
        } else {
            (NodeStatus::Uninitialized, 0.0)
        };
        Self {
            board,
            parent,
            action,
            visit_count: 0,
            value_sum: 0.0,
            value,
            prior,
            children: Vec::new(),
            untried: Vec::new(),
            status,
        }
    }

    #[inline]
    pub fn status(&self) -> NodeStatus {
        self.status
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.status == NodeStatus::Terminal
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.status == NodeStatus::Initialized
    }

    /// Needs evaluator output before it can be searched from.
    #[inline]
    pub fn needs_evaluation(&self) -> bool {
        self.status == NodeStatus::Uninitialized
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.status == NodeStatus::Free
    }

    /// Initialized and every legal action has a child.
    #[inline]
    pub fn is_fully_expanded(&self) -> bool {
        self.is_initialized() && self.untried.is_empty()
    }

    /// Side to move at this node.
    #[inline]
    pub fn color_to_move(&self) -> Color {
        self.board.color_to_move()
    }

    /// Untried `(action, prior)` pairs; the last entry pops next.
    pub fn untried_actions(&self) -> &[(Action, f32)] {
        &self.untried
    }

    /// Populate value and priors from evaluator output.
    ///
    /// `result.value` is from the mover's perspective and is stored
    /// Black-positive. Priors are restricted to legal actions and
    /// renormalized; if the legal mass is not positive they fall back to
    /// uniform. Returns false (and changes nothing) unless the node is
    /// awaiting evaluation.
    pub fn initialize(&mut self, result: &EvalResult) -> bool {
        if !self.needs_evaluation() {
            return false;
        }

        let legal = self.board.legal_actions();
        let mut priors: Vec<(Action, f32)> = legal
            .iter()
            .map(|&a| {
                let p = result.policy.get(a as usize).copied().unwrap_or(0.0);
                (a, if p.is_finite() && p > 0.0 { p } else { 0.0 })
            })
            .collect();

        let total: f32 = priors.iter().map(|(_, p)| p).sum();
        if total > 0.0 {
            for (_, p) in &mut priors {
                *p /= total;
            }
        } else if !priors.is_empty() {
            let uniform = 1.0 / priors.len() as f32;
            for (_, p) in &mut priors {
                *p = uniform;
            }
        }

        // Ascending prior; among equal priors the lower action sits later so it pops first
        priors.sort_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));

        let value = if result.value.is_finite() {
            result.value.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        self.value = self.color_to_move().negate_for(value);
        self.untried = priors;
        self.status = NodeStatus::Initialized;
        true
    }

    /// Pop the highest-prior untried action.
    pub(crate) fn pop_untried(&mut self) -> Option<(Action, f32)> {
        self.untried.pop()
    }

    /// Drop `action` from the untried list (it was played as a real move).
    pub(crate) fn remove_untried(&mut self, action: Action) {
        self.untried.retain(|&(a, _)| a != action);
    }

    /// Mark the slot free and drop its heap data.
    pub(crate) fn release(&mut self) {
        self.board = Board::vacant();
        self.children = Vec::new();
        self.untried = Vec::new();
        self.parent = NodeId::NONE;
        self.visit_count = 0;
        self.value_sum = 0.0;
        self.status = NodeStatus::Free;
    }

    /// Mean Black-positive evaluation. Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }

    /// Mean evaluation seen from `color`'s side.
    #[inline]
    pub fn mean_for(&self, color: Color) -> f32 {
        color.negate_for(self.mean_value())
    }

    /// Selection score of this node as a child of a parent where `mover`
    /// is choosing.
    ///
    /// `value_bias * Q + exploration_bias * sqrt(2 ln N_parent / N) + policy_bias * P`
    /// where `two_ln_parent = 2 ln N_parent`. Unvisited nodes score `None`.
    #[inline]
    pub fn selection_score(
        &self,
        mover: Color,
        two_ln_parent: f32,
        exploration_bias: f32,
        policy_bias: f32,
        value_bias: f32,
    ) -> Option<f32> {
        if self.visit_count == 0 {
            return None;
        }
        let exploitation = value_bias * self.mean_for(mover);
        let exploration = exploration_bias * (two_ln_parent / self.visit_count as f32).sqrt();
        Some(exploitation + exploration + policy_bias * self.prior)
    }
}
