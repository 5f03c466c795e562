//! Cloneable front door to the session actor.

use super::controller::{Command, Reply, SessionController};
use super::error::SessionError;
use super::phase::SessionSnapshot;
use crate::config::Config;
use crate::matchmaking::{MatchData, Matchmaker};
use crate::room::RoomLink;
use crate::transport::{SessionTransport, TransportSettings};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use ttt_engine::Opponent;

/// Default pause before the AI answers a move.
pub const DEFAULT_THINK_DELAY: Duration = Duration::from_millis(800);

const COMMAND_BUFFER: usize = 32;
const EVENT_BUFFER: usize = 64;

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Network parameters for hosting and joining.
    pub transport: TransportSettings,
    /// Pause before the AI's reply is applied.
    pub think_delay: Duration,
    /// Initial preferences.
    pub config: Config,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            think_delay: DEFAULT_THINK_DELAY,
            config: Config::default(),
        }
    }
}

/// Handle used by a UI to drive one session.
///
/// Every method sends a command to the controller task and waits for its
/// reply. State changes, including those caused by the remote peer, are
/// observed through [`SessionHandle::subscribe`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

/// Owns the controller task; awaiting it waits for teardown.
#[derive(Debug)]
pub struct SessionTask(JoinHandle<()>);

impl SessionTask {
    /// Waits for the controller to finish after every handle is dropped.
    pub async fn join(self) {
        if let Err(e) = self.0.await {
            tracing::error!(error = %e, "Session controller task failed");
        }
    }
}

impl SessionHandle {
    /// Spawns a session controller on the current tokio runtime.
    #[instrument(skip(opponent, matchmaker))]
    pub fn spawn(
        settings: SessionSettings,
        opponent: Box<dyn Opponent>,
        matchmaker: Option<Box<dyn Matchmaker>>,
    ) -> (Self, SessionTask) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());

        let transport = SessionTransport::new(settings.transport, event_tx);
        let controller = SessionController::new(
            settings.config,
            settings.think_delay,
            transport,
            opponent,
            matchmaker,
            snapshot_tx,
        );
        let task = tokio::spawn(controller.run(command_rx, event_rx));

        (
            Self {
                commands: command_tx,
                snapshot: snapshot_rx,
            },
            SessionTask(task),
        )
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| SessionError::Stopped)?;
        response.await.map_err(|_| SessionError::Stopped)?
    }

    /// Opens a room and returns the link to share with a guest.
    pub async fn create_room(
        &self,
        host_name: impl Into<String>,
    ) -> Result<RoomLink, SessionError> {
        let host_name = host_name.into();
        self.request(|reply| Command::CreateRoom { host_name, reply })
            .await
    }

    /// Joins the room behind a shared `ADDRESS:PORT:ROOM_ID` link.
    pub async fn join_room(
        &self,
        link: impl Into<String>,
        player_name: impl Into<String>,
    ) -> Result<(), SessionError> {
        let link = link.into();
        let player_name = player_name.into();
        self.request(|reply| Command::JoinRoom {
            link,
            player_name,
            reply,
        })
        .await
    }

    /// Starts a local game against the AI.
    pub async fn start_ai_game(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::StartAiGame { reply }).await
    }

    /// Places the local player's mark at `(row, col)`.
    pub async fn click_cell(&self, row: usize, col: usize) -> Result<(), SessionError> {
        self.request(|reply| Command::ClickCell { row, col, reply })
            .await
    }

    /// Clears the board; X moves first.
    pub async fn reset_game(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::ResetGame { reply }).await
    }

    /// Leaves the current room or game and returns to idle.
    pub async fn exit_room(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::ExitRoom { reply }).await
    }

    /// Asks the matchmaking service for an opponent.
    pub async fn find_match(&self) -> Result<MatchData, SessionError> {
        self.request(|reply| Command::FindMatch { reply }).await
    }

    /// Replaces the preferences used for new games.
    pub async fn set_config(&self, config: Config) -> Result<(), SessionError> {
        self.request(|reply| Command::SetConfig { config, reply })
            .await
    }

    /// Forgets all finished games.
    pub async fn clear_records(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::ClearRecords { reply }).await
    }

    /// Leaves any room, stops the controller, and waits for its reply.
    ///
    /// Later commands on any clone of this handle fail with
    /// [`SessionError::Stopped`].
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Returns the latest published state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Returns a receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        debug!("New snapshot subscriber");
        self.snapshot.clone()
    }
}
