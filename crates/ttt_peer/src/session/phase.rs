//! Session state as seen by the UI.

use crate::config::{Config, GameMode};
use crate::records::GameRecord;
use crate::room::{Room, RoomLink};
use derive_getters::Getters;
use ttt_engine::{Board, GameOutcome, Mark};

/// Which side of a peer-to-peer room this device is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum Role {
    /// Started the listener; plays X and moves first.
    Host,
    /// Dialed in; plays O.
    Guest,
}

impl Role {
    /// The mark this role always plays.
    pub fn mark(self) -> Mark {
        match self {
            Role::Host => Mark::X,
            Role::Guest => Mark::O,
        }
    }
}

/// Who the local player faces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Versus {
    /// The heuristic opponent on this device.
    Ai {
        /// Mark the AI plays.
        ai_mark: Mark,
    },
    /// A human on another device.
    Peer {
        /// Local role in the room.
        role: Role,
        /// The room being played in.
        room: Room,
    },
}

/// A game being played.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct ActiveGame {
    /// Opponent kind.
    versus: Versus,
    /// Mark the local player places.
    local_mark: Mark,
    /// Current board.
    board: Board,
    /// Mark to play next.
    turn: Mark,
    /// Outcome of `board`.
    outcome: GameOutcome,
}

impl ActiveGame {
    /// Starts a local game against the AI; the human plays X.
    pub(crate) fn versus_ai(board_size: usize) -> Self {
        Self {
            versus: Versus::Ai { ai_mark: Mark::O },
            local_mark: Mark::X,
            board: Board::new(board_size),
            turn: Mark::X,
            outcome: GameOutcome::InProgress,
        }
    }

    /// Starts an online game; X always moves first.
    pub(crate) fn versus_peer(role: Role, room: Room, board_size: usize) -> Self {
        Self {
            versus: Versus::Peer { role, room },
            local_mark: role.mark(),
            board: Board::new(board_size),
            turn: Mark::X,
            outcome: GameOutcome::InProgress,
        }
    }

    /// Returns `true` if the local player may move now.
    pub fn is_local_turn(&self) -> bool {
        self.outcome == GameOutcome::InProgress && self.turn == self.local_mark
    }

    /// The mode this game is played in.
    pub fn mode(&self) -> GameMode {
        match self.versus {
            Versus::Ai { .. } => GameMode::HumanVsAi,
            Versus::Peer { .. } => GameMode::HumanVsHumanOnline,
        }
    }

    /// Room for online games.
    pub fn room(&self) -> Option<&Room> {
        match &self.versus {
            Versus::Peer { room, .. } => Some(room),
            Versus::Ai { .. } => None,
        }
    }

    /// Local role for online games.
    pub fn role(&self) -> Option<Role> {
        match &self.versus {
            Versus::Peer { role, .. } => Some(*role),
            Versus::Ai { .. } => None,
        }
    }

    pub(crate) fn set_position(&mut self, board: Board, turn: Mark, outcome: GameOutcome) {
        self.board = board;
        self.turn = turn;
        self.outcome = outcome;
    }
}

/// Lifecycle of a session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No game or room.
    #[default]
    Idle,
    /// Binding the listener for a new room.
    Hosting,
    /// Room open, waiting for a guest.
    Waiting(Room),
    /// A game is in play.
    Active(ActiveGame),
    /// The controller has shut down.
    Ended,
}

impl SessionPhase {
    /// Short phase name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Hosting => "hosting",
            SessionPhase::Waiting(_) => "waiting for a guest",
            SessionPhase::Active(_) => "in a game",
            SessionPhase::Ended => "ended",
        }
    }

    /// The active game, if any.
    pub fn active(&self) -> Option<&ActiveGame> {
        match self {
            SessionPhase::Active(game) => Some(game),
            _ => None,
        }
    }

    /// The current room, if hosting or playing online.
    pub fn room(&self) -> Option<&Room> {
        match self {
            SessionPhase::Waiting(room) => Some(room),
            SessionPhase::Active(game) => game.room(),
            _ => None,
        }
    }
}

/// Everything the UI renders, published after every state change.
#[derive(Debug, Clone, PartialEq, Eq, Default, Getters)]
pub struct SessionSnapshot {
    /// Current phase.
    phase: SessionPhase,
    /// Link to share while hosting or playing online.
    room_link: Option<RoomLink>,
    /// Last user-facing error.
    error: Option<String>,
    /// Last informational notice, such as a peer leaving.
    notice: Option<String>,
    /// Opponent found by matchmaking.
    matched_opponent: Option<String>,
    /// A network operation is in progress.
    busy: bool,
    /// Preferences applied to new games.
    config: Config,
    /// Finished games, newest first.
    records: Vec<GameRecord>,
}

impl SessionSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        phase: SessionPhase,
        room_link: Option<RoomLink>,
        error: Option<String>,
        notice: Option<String>,
        matched_opponent: Option<String>,
        busy: bool,
        config: Config,
        records: Vec<GameRecord>,
    ) -> Self {
        Self {
            phase,
            room_link,
            error,
            notice,
            matched_opponent,
            busy,
            config,
            records,
        }
    }
}
