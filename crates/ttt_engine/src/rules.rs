//! Outcome detection for tic-tac-toe.

pub mod draw;
pub mod win;

use super::{Board, Mark};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Status of a game derived from its board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameOutcome {
    /// Game is ongoing.
    InProgress,
    /// A mark completed a line.
    Won(Mark),
    /// Board is full with no completed line.
    Draw,
}

impl GameOutcome {
    /// Returns `true` once the game has been won or drawn.
    pub fn is_over(self) -> bool {
        self != GameOutcome::InProgress
    }

    /// Returns the winning mark, if any.
    pub fn winner(self) -> Option<Mark> {
        match self {
            GameOutcome::Won(mark) => Some(mark),
            _ => None,
        }
    }

    /// Short label used in logs and game records.
    pub fn label(self) -> &'static str {
        match self {
            GameOutcome::InProgress => "PLAYING",
            GameOutcome::Won(Mark::X) => "WIN_X",
            GameOutcome::Won(Mark::O) => "WIN_O",
            GameOutcome::Draw => "DRAW",
        }
    }
}

impl std::fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Derives the outcome of a board.
///
/// Lines are scanned rows first, then columns, then the main diagonal, then the
/// anti-diagonal. If a corrupted board holds winning lines for both marks, the
/// first one found in that order is reported.
#[instrument(skip(board), fields(size = board.size()))]
pub fn detect_outcome(board: &Board) -> GameOutcome {
    if let Some(mark) = win::check_winner(board) {
        GameOutcome::Won(mark)
    } else if draw::is_full(board) {
        GameOutcome::Draw
    } else {
        GameOutcome::InProgress
    }
}
