//! Moves and their application to a board.

use super::{Board, Mark, Position, Square};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// A move: a mark placed at a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{mark} -> {position}")]
pub struct Move {
    /// Where the mark goes.
    pub position: Position,
    /// The mark being placed.
    pub mark: Mark,
}

impl Move {
    /// Creates a new move.
    pub fn new(position: impl Into<Position>, mark: Mark) -> Self {
        Self {
            position: position.into(),
            mark,
        }
    }
}

/// Error returned when a move cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum MoveError {
    /// Coordinates fall outside the board.
    #[display("Position {_0} is off the board")]
    OutOfBounds(Position),

    /// The target square already holds a mark.
    #[display("Square {_0} is already occupied")]
    SquareOccupied(Position),
}

impl std::error::Error for MoveError {}

impl Board {
    /// Applies a move, returning the resulting board.
    ///
    /// The receiver is left untouched whether or not the move is legal.
    ///
    /// # Errors
    ///
    /// - [`MoveError::OutOfBounds`] if the position is off the board.
    /// - [`MoveError::SquareOccupied`] if the square is not empty.
    #[instrument(skip(self), fields(size = self.size()))]
    pub fn apply_move(&self, mv: Move) -> Result<Board, MoveError> {
        match self.get(mv.position) {
            None => {
                debug!(position = %mv.position, "Rejected move off the board");
                Err(MoveError::OutOfBounds(mv.position))
            }
            Some(Square::Occupied(_)) => {
                debug!(position = %mv.position, "Rejected move on occupied square");
                Err(MoveError::SquareOccupied(mv.position))
            }
            Some(Square::Empty) => {
                let mut next = self.clone();
                next.place(mv.position, mv.mark);
                Ok(next)
            }
        }
    }
}
