//! Five-in-a-row (Gomoku) board state for the self-play engine
//!
//! The board is an `N x N` grid (15x15 by default). Black moves first and
//! players alternate placing a single stone on any empty cell. The first
//! player to form an unbroken line of five or more stones horizontally,
//! vertically, or diagonally wins. A full board without a five is a draw.
//!
//! # Board Layout
//!
//! Actions are cell indices in row-major order, `action = y * N + x`:
//! ```text
//! Row 0: [  0][  1][  2] ... [ 14]
//! Row 1: [ 15][ 16][ 17] ... [ 29]
//!  ...
//! Row 14:[210][211][212] ... [224]
//!         Col 0    1    2      14
//! ```
//!
//! # Bitboard
//!
//! Every cell belongs to four lines (row, column, and the two diagonals).
//! Each line is a `u32` word, so the board keeps `6N` words per mask:
//!
//! ```text
//! [0, N)      rows            bit x
//! [N, 2N)     columns         bit y
//! [2N, 4N)    x - y diagonals bit x
//! [4N, 6N)    x + y diagonals bit x
//! ```
//!
//! Two masks are stored: `occupied`, and `last_mover`, which is XORed with
//! `occupied` after every move. A set `last_mover` bit is therefore a stone
//! of whoever moved last, and an occupied-but-clear bit belongs to the
//! other player. Only the four lines through the played cell are checked
//! for a win.
//!
//! # Usage
//!
//! ```rust
//! use games_gomoku::{Board, Color, GameResult};
//!
//! let board = Board::new(5).unwrap();
//! let board = board.apply_xy(2, 2).unwrap();
//! assert_eq!(board.color_to_move(), Color::White);
//! assert_eq!(board.result(), GameResult::InProgress);
//! ```

use thiserror::Error;

/// Cell index on the board (`y * size + x`).
pub type Action = u16;

/// Default board edge length.
pub const DEFAULT_BOARD_SIZE: usize = 15;
/// Smallest supported board edge length.
pub const MIN_BOARD_SIZE: usize = 5;
/// Largest supported board edge length (one line must fit in a `u32`).
pub const MAX_BOARD_SIZE: usize = 32;
/// Stones in a row needed to win.
pub const WIN_LENGTH: usize = 5;

/// Errors raised by board operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("Board size {0} is outside the supported range 5..=32")]
    InvalidSize(usize),

    #[error("Action {action} is outside a board of {cells} cells")]
    OutOfBounds { action: usize, cells: usize },

    #[error("Cell {0} is already occupied")]
    Occupied(Action),

    #[error("Game is already over")]
    GameOver,
}

/// Stone color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
}

impl Color {
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Re-sign a value between Black's perspective and this color's.
    ///
    /// Identity for Black, negation for White. Applying it twice is a no-op,
    /// so the same call converts in either direction.
    #[inline]
    pub fn negate_for(self, value: f32) -> f32 {
        match self {
            Color::Black => value,
            Color::White => -value,
        }
    }

    /// 0 for Black, 1 for White.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Color::Black => 0,
            Color::White => 1,
        }
    }
}

/// Outcome of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameResult {
    InProgress,
    BlackWin,
    WhiteWin,
    Draw,
}

impl GameResult {
    #[inline]
    pub fn is_terminal(self) -> bool {
        self != GameResult::InProgress
    }

    pub fn winner(self) -> Option<Color> {
        match self {
            GameResult::BlackWin => Some(Color::Black),
            GameResult::WhiteWin => Some(Color::White),
            _ => None,
        }
    }

    /// Outcome value from Black's perspective: +1 win, -1 loss, 0 otherwise.
    pub fn value(self) -> f32 {
        match self {
            GameResult::BlackWin => 1.0,
            GameResult::WhiteWin => -1.0,
            _ => 0.0,
        }
    }

    /// Dataset digit: 0 Black, 1 White, 2 draw. `None` while in progress.
    pub fn winner_digit(self) -> Option<u8> {
        match self {
            GameResult::BlackWin => Some(0),
            GameResult::WhiteWin => Some(1),
            GameResult::Draw => Some(2),
            GameResult::InProgress => None,
        }
    }
}

/// Immutable-move bitboard position.
///
/// `apply` returns a new board; a board owned by a search node is never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    /// Occupied cells, `6 * size` line words
    occupied: Vec<u32>,
    /// Stones of the player who moved last, same layout as `occupied`
    last_mover: Vec<u32>,
    last_move: Option<Action>,
    empty_cells: usize,
    result: GameResult,
}

impl Default for Board {
    fn default() -> Self {
        Self::empty(DEFAULT_BOARD_SIZE)
    }
}

impl Board {
    /// Create an empty board of the given edge length.
    pub fn new(size: usize) -> Result<Self, BoardError> {
        if !(MIN_BOARD_SIZE..=MAX_BOARD_SIZE).contains(&size) {
            return Err(BoardError::InvalidSize(size));
        }
        Ok(Self::empty(size))
    }

    fn empty(size: usize) -> Self {
        Self {
            size,
            occupied: vec![0; 6 * size],
            last_mover: vec![0; 6 * size],
            last_move: None,
            empty_cells: size * size,
            result: GameResult::InProgress,
        }
    }

    /// Zero-cell placeholder holding no heap storage. It is terminal and
    /// rejects every move.
    pub fn vacant() -> Self {
        Self {
            result: GameResult::Draw,
            ..Self::empty(0)
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn total_cells(&self) -> usize {
        self.size * self.size
    }

    #[inline]
    pub fn empty_count(&self) -> usize {
        self.empty_cells
    }

    #[inline]
    pub fn filled_count(&self) -> usize {
        self.total_cells() - self.empty_cells
    }

    /// Action that produced this position (`None` for an empty board).
    #[inline]
    pub fn last_move(&self) -> Option<Action> {
        self.last_move
    }

    #[inline]
    pub fn result(&self) -> GameResult {
        self.result
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.result.is_terminal()
    }

    /// Black moves on an even number of filled cells, White on odd.
    #[inline]
    pub fn color_to_move(&self) -> Color {
        if self.filled_count() % 2 == 0 {
            Color::Black
        } else {
            Color::White
        }
    }

    #[inline]
    pub fn action_index(&self, x: usize, y: usize) -> Action {
        (y * self.size + x) as Action
    }

    #[inline]
    pub fn coords(&self, action: Action) -> (usize, usize) {
        let a = action as usize;
        (a % self.size, a / self.size)
    }

    #[inline]
    fn in_bounds(&self, action: Action) -> bool {
        (action as usize) < self.total_cells()
    }

    /// True if `action` is on the board and the cell is empty.
    pub fn is_empty(&self, action: Action) -> bool {
        if !self.in_bounds(action) {
            return false;
        }
        let (x, y) = self.coords(action);
        self.occupied[y] & (1 << x) == 0
    }

    /// Stone color at `action`, or `None` for an empty or off-board cell.
    pub fn cell(&self, action: Action) -> Option<Color> {
        if !self.in_bounds(action) || self.is_empty(action) {
            return None;
        }
        let (x, y) = self.coords(action);
        let last = self.color_to_move().opposite();
        if self.last_mover[y] & (1 << x) != 0 {
            Some(last)
        } else {
            Some(last.opposite())
        }
    }

    /// All empty cells in row-major order; empty once the game is over.
    pub fn legal_actions(&self) -> Vec<Action> {
        if self.is_terminal() {
            return Vec::new();
        }
        let full_row = row_mask(self.size);
        let mut actions = Vec::with_capacity(self.empty_cells);
        for y in 0..self.size {
            let mut free = !self.occupied[y] & full_row;
            while free != 0 {
                let x = free.trailing_zeros() as usize;
                actions.push((y * self.size + x) as Action);
                free &= free - 1;
            }
        }
        actions
    }

    /// Popcount of the occupied mask over the row words.
    pub fn stone_count(&self) -> usize {
        self.occupied[..self.size]
            .iter()
            .map(|row| row.count_ones() as usize)
            .sum()
    }

    /// Place the side-to-move's stone at `action`, returning the new position.
    pub fn apply(&self, action: Action) -> Result<Board, BoardError> {
        if !self.in_bounds(action) {
            return Err(BoardError::OutOfBounds {
                action: action as usize,
                cells: self.total_cells(),
            });
        }
        if self.is_terminal() {
            return Err(BoardError::GameOver);
        }
        if !self.is_empty(action) {
            return Err(BoardError::Occupied(action));
        }

        let mover = self.color_to_move();
        let (x, y) = self.coords(action);
        let lines = self.lines_through(x, y);

        let mut next = self.clone();
        for (word, bit) in lines {
            next.occupied[word] |= 1 << bit;
        }
        // Flip ownership so `last_mover` now marks the mover's stones
        for (c, m) in next.last_mover.iter_mut().zip(next.occupied.iter()) {
            *c ^= *m;
        }
        next.empty_cells -= 1;
        next.last_move = Some(action);

        next.result = if lines.iter().any(|&(word, _)| has_five(next.last_mover[word])) {
            match mover {
                Color::Black => GameResult::BlackWin,
                Color::White => GameResult::WhiteWin,
            }
        } else if next.empty_cells == 0 {
            GameResult::Draw
        } else {
            GameResult::InProgress
        };

        Ok(next)
    }

    /// Coordinate form of [`Board::apply`].
    pub fn apply_xy(&self, x: usize, y: usize) -> Result<Board, BoardError> {
        if x >= self.size || y >= self.size {
            return Err(BoardError::OutOfBounds {
                action: y * self.size + x,
                cells: self.total_cells(),
            });
        }
        self.apply(self.action_index(x, y))
    }

    /// (word, bit) for the row, column, and both diagonals through (x, y).
    #[inline]
    fn lines_through(&self, x: usize, y: usize) -> [(usize, usize); 4] {
        let n = self.size;
        [
            (y, x),
            (n + x, y),
            (2 * n + (x + n - 1 - y), x),
            (4 * n + (x + y), x),
        ]
    }
}

#[inline]
fn row_mask(size: usize) -> u32 {
    if size >= 32 {
        u32::MAX
    } else {
        (1u32 << size) - 1
    }
}

/// True if `line` holds at least five consecutive set bits.
#[inline]
fn has_five(mut line: u32) -> bool {
    line &= line >> 1;
    line &= line >> 2;
    line & (line >> 1) != 0
}
