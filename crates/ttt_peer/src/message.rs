//! Line-delimited JSON wire protocol between peers.
//!
//! Each message is one JSON object followed by `\n`. Moves and resets carry a
//! full board snapshot, so any single message can be applied on its own.

use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use ttt_engine::{Board, GameOutcome, Mark};

/// A unit of peer-to-peer synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Guest announces itself to the host.
    Join {
        /// Guest player's name.
        player_name: String,
    },
    /// Authoritative board after a move.
    Move {
        /// Board after the move.
        board: Board,
        /// Mark to play next.
        next_mark: Mark,
        /// Outcome of `board`.
        outcome: GameOutcome,
    },
    /// Board cleared for a new game.
    Reset {
        /// The cleared board.
        board: Board,
        /// Mark to play first.
        next_mark: Mark,
    },
    /// Sender is leaving the room.
    Disconnect,
    /// Asks a listener whether `room_id` is its open room.
    RoomProbe {
        /// Room being looked for.
        room_id: String,
    },
    /// Answer to [`SyncMessage::RoomProbe`].
    RoomProbeResult {
        /// Whether the room exists and can be joined.
        exists: bool,
    },
}

impl SyncMessage {
    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::Join { .. } => "join",
            SyncMessage::Move { .. } => "move",
            SyncMessage::Reset { .. } => "reset",
            SyncMessage::Disconnect => "disconnect",
            SyncMessage::RoomProbe { .. } => "room_probe",
            SyncMessage::RoomProbeResult { .. } => "room_probe_result",
        }
    }
}

/// A received line could not be decoded into a [`SyncMessage`].
#[derive(Debug, Clone, Display, Error)]
#[display("Undecodable message ({reason}): {line}")]
pub struct DecodeError {
    /// Decoder error text.
    pub reason: String,
    /// The offending line, truncated.
    pub line: String,
}

/// Encodes a message as a single newline-terminated JSON line.
#[instrument(skip(message), fields(kind = message.kind()))]
pub fn encode_line(message: &SyncMessage) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Decodes one line (with or without its trailing newline).
pub fn decode_line(line: &str) -> Result<SyncMessage, DecodeError> {
    serde_json::from_str(line.trim_end()).map_err(|e| DecodeError {
        reason: e.to_string(),
        line: line.chars().take(120).collect(),
    })
}
