//! Peer-to-peer tic-tac-toe over the local network.
//!
//! # Architecture
//!
//! - **Room**: room identity and the `ADDRESS:PORT:ROOM_ID` link format
//! - **Message**: the newline-delimited JSON sync protocol
//! - **Transport**: TCP listener, connections, and room probes
//! - **Session**: the controller that owns game state and drives both local
//!   AI games and online games
//! - **Config / Records / Matchmaking**: saved preferences, finished-game
//!   history, and the optional remote matchmaking client
//!
//! # Example
//!
//! ```no_run
//! use ttt_engine::HeuristicOpponent;
//! use ttt_peer::{SessionHandle, SessionSettings};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (session, task) = SessionHandle::spawn(
//!     SessionSettings::default(),
//!     Box::new(HeuristicOpponent::from_entropy()),
//!     None,
//! );
//! let link = session.create_room("alice").await?;
//! println!("Share this link: {link}");
//! drop(session);
//! task.join().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod matchmaking;
mod message;
mod records;
mod room;
mod session;
mod transport;

// Crate-level exports - Configuration
pub use config::{
    BOARD_SIZE_RANGE, Config, ConfigError, DEFAULT_BOARD_SIZE, DEFAULT_CONFIG_PATH, GameMode,
};

// Crate-level exports - Matchmaking
pub use matchmaking::{HttpMatchmaker, MatchData, MatchError, Matchmaker};

// Crate-level exports - Wire protocol
pub use message::{DecodeError, SyncMessage, decode_line, encode_line};

// Crate-level exports - Records
pub use records::{GameRecord, GameRecords};

// Crate-level exports - Rooms
pub use room::{Room, RoomId, RoomLink, RoomLinkError};

// Crate-level exports - Session
pub use session::{
    ActiveGame, DEFAULT_THINK_DELAY, Role, SessionError, SessionHandle, SessionPhase,
    SessionSettings, SessionSnapshot, SessionTask, Versus,
};

// Crate-level exports - Transport
pub use transport::{
    ConnectError, Connection, ConnectionId, ListenError, Listener, MAX_LINE_BYTES, SendError,
    SessionTransport, TransportEvent, TransportSettings, local_ip,
};
