//! Errors reported by session commands.

use crate::matchmaking::MatchError;
use crate::room::RoomLinkError;
use crate::transport::{ConnectError, ListenError, SendError};
use derive_more::{Display, Error};
use ttt_engine::MoveError;

/// Why a session command failed.
///
/// The `Display` text is what the UI shows in the snapshot's error field.
#[derive(Debug, Clone, Display, Error)]
pub enum SessionError {
    /// The shared link could not be parsed.
    #[display("Invalid room link: {_0}")]
    InvalidRoomLink(RoomLinkError),

    /// No port could be bound for hosting.
    #[display("Failed to create room: {_0}")]
    RoomCreationFailed(ListenError),

    /// The host answered that the room does not exist or is closed.
    #[display("Room does not exist or is closed")]
    RoomNotFound,

    /// The host could not be reached.
    #[display("Could not connect to room: {_0}")]
    ConnectionFailed(ConnectError),

    /// A message to the peer was not delivered.
    #[display("Failed to reach opponent: {_0}")]
    Send(SendError),

    /// The move is off the board or on an occupied square.
    #[display("Invalid move: {_0}")]
    InvalidMove(MoveError),

    /// The local player tried to move out of turn.
    #[display("Not your turn")]
    NotYourTurn,

    /// The game has already been won or drawn.
    #[display("Game is already over")]
    GameOver,

    /// The command does not apply in the current phase.
    #[display("Not allowed while {phase}")]
    WrongPhase {
        /// Name of the current phase.
        phase: &'static str,
    },

    /// Matchmaking failed.
    #[display("{_0}")]
    MatchFailed(MatchError),

    /// The controller task is gone.
    #[display("Session controller has stopped")]
    Stopped,
}
