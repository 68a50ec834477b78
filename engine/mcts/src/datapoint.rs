//! Training records harvested from finished search trees.
//!
//! A record is serialized as one text line: `m1,m2,...;best;winner`, where
//! the moves lead from the empty board to the recorded position, `best` is
//! the most visited reply and `winner` is `1` when the side to move at the
//! position went on to win, `0` when it lost and `2` for a draw.

use std::fmt;
use std::str::FromStr;

use games_gomoku::{Action, Color, GameResult};
use thiserror::Error;

use crate::node::NodeId;
use crate::tree::SearchTree;

/// Mover-relative draw digit.
pub const DRAW_DIGIT: u8 = 2;

/// Errors from parsing a record line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatapointParseError {
    #[error("expected 3 ';'-separated fields, found {0}")]
    FieldCount(usize),

    #[error("invalid move {0:?}")]
    InvalidMove(String),

    #[error("invalid best move {0:?}")]
    InvalidBestMove(String),

    #[error("invalid winner digit {0:?}")]
    InvalidWinner(String),
}

/// One training sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datapoint {
    pub moves: Vec<Action>,
    pub best_move: Action,
    pub winner: u8,
}

impl fmt::Display for Datapoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.moves.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{action}")?;
        }
        write!(f, ";{};{}", self.best_move, self.winner)
    }
}

impl FromStr for Datapoint {
    type Err = DatapointParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = line.trim_end_matches(['\r', '\n']).split(';').collect();
        let [moves, best, winner] = fields.as_slice() else {
            return Err(DatapointParseError::FieldCount(fields.len()));
        };

        let moves = if moves.is_empty() {
            Vec::new()
        } else {
            moves
                .split(',')
                .map(|m| {
                    m.parse::<Action>()
                        .map_err(|_| DatapointParseError::InvalidMove(m.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?
        };
        let best_move = best
            .parse::<Action>()
            .map_err(|_| DatapointParseError::InvalidBestMove(best.to_string()))?;
        let winner = match winner.parse::<u8>() {
            Ok(digit) if digit <= DRAW_DIGIT => digit,
            _ => return Err(DatapointParseError::InvalidWinner(winner.to_string())),
        };

        Ok(Self {
            moves,
            best_move,
            winner,
        })
    }
}

/// Outcome digit re-signed to the side to move.
///
/// `None` while the game is still running.
pub fn mover_digit(result: GameResult, to_move: Color) -> Option<u8> {
    let digit = result.winner_digit()?;
    if digit == DRAW_DIGIT {
        return Some(DRAW_DIGIT);
    }
    Some(match to_move {
        Color::White => digit,
        Color::Black => 1 - digit,
    })
}

/// Append a datapoint for every fully expanded, non-terminal node of
/// `tree`, labelled with the final `result` of the game.
pub fn collect_tree(tree: &SearchTree, result: GameResult, out: &mut Vec<Datapoint>) {
    let mut path = Vec::new();
    visit(tree, tree.root(), result, &mut path, out);
}

fn visit(
    tree: &SearchTree,
    id: NodeId,
    result: GameResult,
    path: &mut Vec<Action>,
    out: &mut Vec<Datapoint>,
) {
    let node = tree.get(id);
    if node.is_terminal() {
        return;
    }

    if node.is_fully_expanded() {
        let best = tree.abs_best_child(id, None);
        let winner = mover_digit(result, node.color_to_move());
        if let (Some(best), Some(winner)) = (best, winner) {
            out.push(Datapoint {
                moves: path.clone(),
                best_move: tree.get(best).action,
                winner,
            });
        }
    }

    for &child in &node.children {
        path.push(tree.get(child).action);
        visit(tree, child, result, path, out);
        path.pop();
    }
}
