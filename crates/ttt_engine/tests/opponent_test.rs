//! Tests for the heuristic opponent.

use ttt_engine::{
    Board, GameOutcome, HeuristicOpponent, Mark, Move, Opponent, Position, choose_move,
    detect_outcome,
};

fn board_from(rows: &[&str]) -> Board {
    let mut board = Board::new(rows.len());
    for (r, row) in rows.iter().enumerate() {
        for (c, ch) in row.chars().enumerate() {
            let mark = match ch {
                'X' => Mark::X,
                'O' => Mark::O,
                _ => continue,
            };
            board = board.apply_move(Move::new((r, c), mark)).unwrap();
        }
    }
    board
}

#[test]
fn test_takes_win_over_block() {
    // O can win at (1,2); X threatens (0,2). Win must be preferred.
    let board = board_from(&["XX.", "OO.", "X.."]);
    for seed in 0..25 {
        let mut opponent = HeuristicOpponent::seeded(seed);
        assert_eq!(opponent.choose_move(&board, Mark::O), Some(Position::new(1, 2)));
    }
}

#[test]
fn test_blocks_immediate_threat() {
    // X threatens the main diagonal at (2,2); O has no win.
    let board = board_from(&["X.O", ".X.", "..."]);
    for seed in 0..25 {
        let mut opponent = HeuristicOpponent::seeded(seed);
        assert_eq!(opponent.choose_move(&board, Mark::O), Some(Position::new(2, 2)));
    }
}

#[test]
fn test_blocks_on_larger_board() {
    let board = board_from(&["X...", "X...", "X...", "...."]);
    let mut rng = rand::rngs::mock::StepRng::new(0, 1);
    assert_eq!(
        choose_move(&board, Mark::O, Mark::X, &mut rng),
        Some(Position::new(3, 0))
    );
}

#[test]
fn test_ai_as_x_wins_when_possible() {
    let board = board_from(&["X.O", ".XO", "..."]);
    let mut opponent = HeuristicOpponent::seeded(3);
    let pos = opponent.choose_move(&board, Mark::X).unwrap();
    let next = board.apply_move(Move::new(pos, Mark::X)).unwrap();
    assert_eq!(detect_outcome(&next), GameOutcome::Won(Mark::X));
}

#[test]
fn test_scenario_human_row_wins_before_ai_moves_again() {
    // Human is X, AI is O; AI replies are placed away from row 0.
    let mut board = Board::new(3);
    let human = [(0, 0), (0, 1), (0, 2)];
    let ai = [(1, 0), (1, 1)];

    for (turn, cell) in human.iter().enumerate() {
        board = board.apply_move(Move::new(*cell, Mark::X)).unwrap();
        let outcome = detect_outcome(&board);
        if turn == 2 {
            assert_eq!(outcome, GameOutcome::Won(Mark::X));
            break;
        }
        assert_eq!(outcome, GameOutcome::InProgress);
        board = board.apply_move(Move::new(ai[turn], Mark::O)).unwrap();
    }
    assert_eq!(board.empty_positions().len(), 4);
}
