//! Line-based console front end.

use anyhow::Result;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, instrument};
use ttt_engine::GameOutcome;
use ttt_peer::{SessionHandle, SessionPhase, SessionSnapshot};

/// One line of player input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Place a mark at zero-based `row col`.
    Place {
        /// Row index.
        row: usize,
        /// Column index.
        col: usize,
    },
    /// Start the board over.
    Reset,
    /// Leave the game.
    Exit,
    /// Print finished games.
    Records,
    /// Print the command list.
    Help,
}

impl FromStr for Input {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["reset"] => Ok(Input::Reset),
            ["exit"] | ["quit"] => Ok(Input::Exit),
            ["records"] => Ok(Input::Records),
            ["help"] | ["?"] => Ok(Input::Help),
            [row, col] => {
                let row = row.parse().map_err(|_| format!("Not a row number: {}", row))?;
                let col = col.parse().map_err(|_| format!("Not a column number: {}", col))?;
                Ok(Input::Place { row, col })
            }
            _ => Err(format!("Unknown command: {}", line.trim())),
        }
    }
}

const HELP: &str = "Commands: <row> <col> | reset | records | exit";

/// Plays until the player exits, the peer leaves, or stdin closes.
#[instrument(skip(session))]
pub async fn play(session: &SessionHandle) -> Result<()> {
    let mut updates = session.subscribe();
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut last = updates.borrow_and_update().clone();
    let mut engaged = !matches!(last.phase(), SessionPhase::Idle);

    println!("{}", HELP);
    render(&last);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    debug!("Session closed");
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                if snapshot == last {
                    continue;
                }
                render_changes(&last, &snapshot);
                match snapshot.phase() {
                    SessionPhase::Idle if engaged => break,
                    SessionPhase::Ended => break,
                    SessionPhase::Idle => {}
                    _ => engaged = true,
                }
                last = snapshot;
            }
            line = input.next_line() => {
                let Some(line) = line? else {
                    debug!("Input closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Input>() {
                    Ok(Input::Place { row, col }) => report(session.click_cell(row, col).await),
                    Ok(Input::Reset) => report(session.reset_game().await),
                    Ok(Input::Exit) => {
                        report(session.exit_room().await);
                        break;
                    }
                    Ok(Input::Records) => print_records(&session.snapshot()),
                    Ok(Input::Help) => println!("{}", HELP),
                    Err(message) => println!("{}. {}", message, HELP),
                }
            }
        }
    }

    Ok(())
}

fn report(result: Result<(), ttt_peer::SessionError>) {
    if let Err(e) = result {
        println!("! {}", e);
    }
}

fn render_changes(previous: &SessionSnapshot, current: &SessionSnapshot) {
    if current.notice() != previous.notice()
        && let Some(notice) = current.notice()
    {
        println!("* {}", notice);
    }
    if current.error() != previous.error()
        && let Some(error) = current.error()
    {
        println!("! {}", error);
    }
    if current.phase() != previous.phase() || current.room_link() != previous.room_link() {
        render(current);
    }
}

fn render(snapshot: &SessionSnapshot) {
    match snapshot.phase() {
        SessionPhase::Idle => println!("Not in a game."),
        SessionPhase::Hosting => println!("Opening room..."),
        SessionPhase::Waiting(room) => {
            println!("Room {} is open, waiting for a guest.", room.room_id());
            if let Some(link) = snapshot.room_link() {
                println!("Share this link: {}", link);
            }
        }
        SessionPhase::Active(game) => {
            println!();
            println!("{}", game.board().display());
            let status = match game.outcome() {
                GameOutcome::InProgress if game.is_local_turn() => {
                    format!("Your move ({})", game.local_mark())
                }
                GameOutcome::InProgress => format!("Waiting for {}", game.turn()),
                GameOutcome::Won(mark) if *mark == *game.local_mark() => {
                    String::from("You win! Type 'reset' to play again.")
                }
                GameOutcome::Won(mark) => format!("{} wins. Type 'reset' to play again.", mark),
                GameOutcome::Draw => String::from("Draw. Type 'reset' to play again."),
            };
            println!("{}", status);
        }
        SessionPhase::Ended => println!("Session ended."),
    }
}

fn print_records(snapshot: &SessionSnapshot) {
    if snapshot.records().is_empty() {
        println!("No finished games yet.");
        return;
    }
    for record in snapshot.records() {
        println!("{}", record);
    }
}
