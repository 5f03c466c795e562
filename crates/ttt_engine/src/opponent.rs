//! One-ply heuristic opponent.
//!
//! The heuristic takes an immediate win if one exists, otherwise blocks an
//! immediate loss, otherwise plays a uniformly random empty square. It does not
//! look further ahead than one move.

use super::rules::{GameOutcome, detect_outcome};
use super::{Board, Mark, Move, Position};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, instrument};

/// Something that picks a square for the AI side.
pub trait Opponent: Send + Sync {
    /// Chooses a move for `mark`, or `None` if the board has no empty square.
    fn choose_move(&mut self, board: &Board, mark: Mark) -> Option<Position>;

    /// Returns the opponent's display name.
    fn name(&self) -> &str;
}

/// Picks a move for `ai_mark` using win > block > random.
///
/// Returns `None` when no empty square remains.
#[instrument(skip(board, rng), fields(size = board.size()))]
pub fn choose_move<R: Rng + ?Sized>(
    board: &Board,
    ai_mark: Mark,
    opponent_mark: Mark,
    rng: &mut R,
) -> Option<Position> {
    let empty = board.empty_positions();

    if let Some(pos) = completing_move(board, &empty, ai_mark) {
        debug!(position = %pos, "Taking winning square");
        return Some(pos);
    }

    if let Some(pos) = completing_move(board, &empty, opponent_mark) {
        debug!(position = %pos, "Blocking opponent");
        return Some(pos);
    }

    let pos = empty.choose(rng).copied();
    debug!(position = ?pos, "Playing random square");
    pos
}

/// First empty square where `mark` would immediately win.
fn completing_move(board: &Board, empty: &[Position], mark: Mark) -> Option<Position> {
    empty.iter().copied().find(|&pos| {
        board
            .apply_move(Move::new(pos, mark))
            .map(|next| detect_outcome(&next) == GameOutcome::Won(mark))
            .unwrap_or(false)
    })
}

/// Heuristic opponent backed by a random number generator.
#[derive(Debug)]
pub struct HeuristicOpponent<R = StdRng> {
    name: String,
    rng: R,
}

impl HeuristicOpponent<StdRng> {
    /// Creates an opponent seeded from OS entropy.
    pub fn from_entropy() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an opponent with a fixed seed, for reproducible games.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send + Sync> HeuristicOpponent<R> {
    /// Creates an opponent drawing from the given generator.
    pub fn with_rng(rng: R) -> Self {
        Self {
            name: "Heuristic AI".to_string(),
            rng,
        }
    }
}

impl<R: Rng + Send + Sync> Opponent for HeuristicOpponent<R> {
    fn choose_move(&mut self, board: &Board, mark: Mark) -> Option<Position> {
        choose_move(board, mark, mark.opponent(), &mut self.rng)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_board_yields_none() {
        let mut board = Board::new(1);
        board = board.apply_move(Move::new((0, 0), Mark::X)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(choose_move(&board, Mark::O, Mark::X, &mut rng), None);
    }

    #[test]
    fn test_random_move_is_empty_square() {
        let board = Board::new(3)
            .apply_move(Move::new((1, 1), Mark::X))
            .unwrap();
        let mut opponent = HeuristicOpponent::seeded(7);
        for _ in 0..20 {
            let pos = opponent.choose_move(&board, Mark::O).unwrap();
            assert!(board.is_empty(pos));
        }
    }
}
