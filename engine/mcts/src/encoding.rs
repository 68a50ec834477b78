//! Evaluator input encoding.
//!
//! A node is encoded as `history_depth + 1` planes of `N x N` floats,
//! plane-major, with cell index equal to the action index:
//!
//! - plane 0: all ones when White is to move
//! - planes `1..=H`: Black stones every second ply, oldest first, so
//!   plane `H` is the current position
//! - planes `H+1..=2H`: White stones at the same plies, plane `2H` current
//!
//! where `H = history_depth / 2`. Positions before the tree root are left
//! as zero planes.

use games_gomoku::{Action, Color};

use crate::node::NodeId;
use crate::tree::SearchTree;

/// Number of floats in one encoded position.
#[inline]
pub fn encoded_len(board_size: usize, history_depth: usize) -> usize {
    (history_depth + 1) * board_size * board_size
}

/// Encode node `id` of `tree` for the evaluator.
pub fn encode_node(tree: &SearchTree, id: NodeId, history_depth: usize) -> Vec<f32> {
    let node = tree.get(id);
    let size = node.board.size();
    let cells = size * size;
    let half = history_depth / 2;
    let mut planes = vec![0.0f32; encoded_len(size, history_depth)];

    if node.color_to_move() == Color::White {
        planes[..cells].fill(1.0);
    }

    let mut cursor = id;
    for step in 0..half {
        if cursor.is_none() {
            break;
        }
        let board = &tree.get(cursor).board;
        let black = (half - step) * cells;
        let white = (2 * half - step) * cells;
        for cell in 0..cells {
            match board.cell(cell as Action) {
                Some(Color::Black) => planes[black + cell] = 1.0,
                Some(Color::White) => planes[white + cell] = 1.0,
                None => {}
            }
        }

        // Two plies back
        for _ in 0..2 {
            if cursor.is_some() {
                cursor = tree.get(cursor).parent;
            }
        }
    }

    planes
}
