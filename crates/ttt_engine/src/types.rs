//! Core domain types for N x N tic-tac-toe.

use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Mark placed by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Mark {
    /// Player X (goes first).
    X,
    /// Player O (goes second).
    O,
}

impl Mark {
    /// Returns the opponent's mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// A square on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square occupied by a mark.
    Occupied(Mark),
}

/// A zero-based cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("({row}, {col})")]
pub struct Position {
    /// Row index.
    pub row: usize,
    /// Column index.
    pub col: usize,
}

impl Position {
    /// Creates a new position.
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl From<(usize, usize)> for Position {
    fn from((row, col): (usize, usize)) -> Self {
        Self { row, col }
    }
}

/// Square N x N board.
///
/// The size is fixed when the board is created; moves produce new boards
/// through [`Board::apply_move`](crate::Board::apply_move). Deserialization
/// rejects any board whose square count is not `size * size`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBoard")]
pub struct Board {
    /// Side length.
    size: usize,
    /// Squares in row-major order.
    squares: Vec<Square>,
}

/// Board as it appears on the wire, before its shape is checked.
#[derive(Deserialize)]
struct RawBoard {
    size: usize,
    squares: Vec<Square>,
}

/// A deserialized board whose dimensions do not describe a square grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum BoardShapeError {
    /// The side length was zero.
    #[display("Board size must be at least 1")]
    ZeroSize,
    /// The square count does not match the side length.
    #[display("Board of size {size} needs {expected} squares, got {found}")]
    SquareCount {
        /// Declared side length.
        size: usize,
        /// `size * size`, or `usize::MAX` if that overflows.
        expected: usize,
        /// Squares actually supplied.
        found: usize,
    },
}

impl TryFrom<RawBoard> for Board {
    type Error = BoardShapeError;

    fn try_from(raw: RawBoard) -> Result<Self, Self::Error> {
        if raw.size == 0 {
            return Err(BoardShapeError::ZeroSize);
        }
        let expected = raw.size.checked_mul(raw.size).unwrap_or(usize::MAX);
        if raw.squares.len() != expected {
            return Err(BoardShapeError::SquareCount {
                size: raw.size,
                expected,
                found: raw.squares.len(),
            });
        }
        Ok(Self {
            size: raw.size,
            squares: raw.squares,
        })
    }
}

impl Board {
    /// Creates an empty board with `size` rows and columns (at least 1).
    #[instrument]
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            squares: vec![Square::Empty; size * size],
        }
    }

    /// Side length of the board.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` if the position lies on the board.
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.size && pos.col < self.size
    }

    /// Gets the square at the given position, or `None` if off the board.
    pub fn get(&self, pos: Position) -> Option<Square> {
        if !self.contains(pos) {
            return None;
        }
        self.squares.get(pos.row * self.size + pos.col).copied()
    }

    /// Checks if a square is on the board and empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        matches!(self.get(pos), Some(Square::Empty))
    }

    /// Returns `true` when no empty square remains.
    pub fn is_full(&self) -> bool {
        crate::rules::draw::is_full(self)
    }

    /// Returns all squares in row-major order.
    pub fn squares(&self) -> &[Square] {
        &self.squares
    }

    /// Iterates over the rows of the board.
    pub fn rows(&self) -> impl Iterator<Item = &[Square]> {
        self.squares.chunks(self.size)
    }

    /// Lists every empty position in row-major order.
    pub fn empty_positions(&self) -> Vec<Position> {
        self.squares
            .iter()
            .enumerate()
            .filter(|(_, sq)| **sq == Square::Empty)
            .map(|(idx, _)| Position::new(idx / self.size, idx % self.size))
            .collect()
    }

    /// Writes a mark without any validation.
    pub(crate) fn place(&mut self, pos: Position, mark: Mark) {
        let idx = pos.row * self.size + pos.col;
        self.squares[idx] = Square::Occupied(mark);
    }

    /// Formats the board as a human-readable grid, empty squares shown as `.`.
    pub fn display(&self) -> String {
        let separator = vec!["-"; self.size].join("+");
        self.rows()
            .map(|row| {
                row.iter()
                    .map(|sq| match sq {
                        Square::Empty => ".",
                        Square::Occupied(Mark::X) => "X",
                        Square::Occupied(Mark::O) => "O",
                    })
                    .collect::<Vec<_>>()
                    .join("|")
            })
            .collect::<Vec<_>>()
            .join(&format!("\n{separator}\n"))
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_empty() {
        let board = Board::new(4);
        assert_eq!(board.size(), 4);
        assert_eq!(board.empty_positions().len(), 16);
        assert!(board.squares().iter().all(|s| *s == Square::Empty));
    }

    #[test]
    fn test_zero_size_is_raised() {
        assert_eq!(Board::new(0).size(), 1);
    }

    #[test]
    fn test_single_square_fills() {
        let mut board = Board::new(1);
        assert!(!board.is_full());
        board.place(Position::new(0, 0), Mark::O);
        assert!(board.is_full());
    }

    #[test]
    fn test_deserialize_checks_shape() {
        let mut board = Board::new(3);
        board.place(Position::new(2, 1), Mark::X);
        let json = serde_json::to_string(&board).unwrap();
        assert_eq!(serde_json::from_str::<Board>(&json).unwrap(), board);

        let zero = r#"{"size":0,"squares":[]}"#;
        assert!(serde_json::from_str::<Board>(zero).is_err());

        let short = r#"{"size":3,"squares":["Empty","Empty"]}"#;
        let err = serde_json::from_str::<Board>(short).unwrap_err();
        assert!(err.to_string().contains("needs 9 squares, got 2"));

        let overflow = format!(r#"{{"size":{},"squares":["Empty"]}}"#, usize::MAX);
        assert!(serde_json::from_str::<Board>(&overflow).is_err());
    }

    #[test]
    fn test_get_off_board() {
        let board = Board::new(3);
        assert_eq!(board.get(Position::new(3, 0)), None);
        assert_eq!(board.get(Position::new(0, 3)), None);
        assert!(!board.is_empty(Position::new(5, 5)));
    }

    #[test]
    fn test_display() {
        let mut board = Board::new(3);
        board.place(Position::new(0, 0), Mark::X);
        board.place(Position::new(1, 1), Mark::O);
        assert_eq!(board.display(), "X|.|.\n-+-+-\n.|O|.\n-+-+-\n.|.|.");
    }
}
