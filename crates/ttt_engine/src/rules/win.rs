//! Win detection logic for tic-tac-toe.

use super::super::{Board, Mark, Position, Square};

/// Checks if there is a winner on the board.
///
/// Returns `Some(mark)` for the first full line of one mark found, scanning
/// rows, columns, the main diagonal and then the anti-diagonal.
pub fn check_winner(board: &Board) -> Option<Mark> {
    let n = board.size();

    let rows = (0..n).map(|r| line(n, |i| Position::new(r, i)));
    let cols = (0..n).map(|c| line(n, |i| Position::new(i, c)));
    let diagonals = [
        line(n, |i| Position::new(i, i)),
        line(n, |i| Position::new(i, n - 1 - i)),
    ];

    rows.chain(cols)
        .chain(diagonals)
        .find_map(|cells| uniform_mark(board, &cells))
}

/// Returns `true` if `mark` is the winner reported by [`check_winner`].
pub fn is_winner(board: &Board, mark: Mark) -> bool {
    check_winner(board) == Some(mark)
}

fn line(n: usize, at: impl Fn(usize) -> Position) -> Vec<Position> {
    (0..n).map(at).collect()
}

fn uniform_mark(board: &Board, cells: &[Position]) -> Option<Mark> {
    let first = board.get(*cells.first()?)?;
    let Square::Occupied(mark) = first else {
        return None;
    };
    cells
        .iter()
        .all(|pos| board.get(*pos) == Some(first))
        .then_some(mark)
}
