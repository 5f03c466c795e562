//! Pure tic-tac-toe game logic.
//!
//! - **Board engine**: N x N boards, move application, outcome detection.
//! - **Opponent engine**: a one-ply win/block/random heuristic.
//!
//! Nothing in this crate performs I/O; every operation is a function of the
//! board it is given.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod action;
mod opponent;
pub mod rules;
mod types;

pub use action::{Move, MoveError};
pub use opponent::{HeuristicOpponent, Opponent, choose_move};
pub use rules::{GameOutcome, detect_outcome};
pub use types::{Board, BoardShapeError, Mark, Position, Square};
