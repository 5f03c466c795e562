//! The session actor: sole owner of game, room, and connection state.

use super::error::SessionError;
use super::phase::{ActiveGame, Role, SessionPhase, SessionSnapshot, Versus};
use crate::config::{Config, GameMode};
use crate::matchmaking::{MatchData, MatchError, Matchmaker};
use crate::message::SyncMessage;
use crate::records::{GameRecord, GameRecords};
use crate::room::{Room, RoomLink};
use crate::transport::{Connection, ConnectionId, Listener, SessionTransport, TransportEvent};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, instrument, warn};
use ttt_engine::{Board, GameOutcome, Mark, Move, Opponent, Position, detect_outcome};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Requests from [`super::SessionHandle`].
#[derive(Debug)]
pub(crate) enum Command {
    CreateRoom {
        host_name: String,
        reply: Reply<RoomLink>,
    },
    JoinRoom {
        link: String,
        player_name: String,
        reply: Reply<()>,
    },
    StartAiGame {
        reply: Reply<()>,
    },
    ClickCell {
        row: usize,
        col: usize,
        reply: Reply<()>,
    },
    ResetGame {
        reply: Reply<()>,
    },
    ExitRoom {
        reply: Reply<()>,
    },
    FindMatch {
        reply: Reply<MatchData>,
    },
    SetConfig {
        config: Config,
        reply: Reply<()>,
    },
    ClearRecords {
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// An AI move waiting out its think delay.
#[derive(Debug, Clone, Copy)]
struct PendingAiMove {
    due: Instant,
    position: Position,
    epoch: u64,
}

pub(crate) struct SessionController {
    config: Config,
    think_delay: Duration,
    transport: SessionTransport,
    opponent: Box<dyn Opponent>,
    matchmaker: Option<Box<dyn Matchmaker>>,
    phase: SessionPhase,
    listener: Option<Listener>,
    peer: Option<Connection>,
    room_link: Option<RoomLink>,
    pending_ai: Option<PendingAiMove>,
    // Bumped whenever the board is replaced wholesale; stale AI moves compare against it.
    epoch: u64,
    error: Option<String>,
    notice: Option<String>,
    matched_opponent: Option<String>,
    busy: bool,
    records: GameRecords,
    snapshot: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    pub(crate) fn new(
        config: Config,
        think_delay: Duration,
        transport: SessionTransport,
        opponent: Box<dyn Opponent>,
        matchmaker: Option<Box<dyn Matchmaker>>,
        snapshot: watch::Sender<SessionSnapshot>,
    ) -> Self {
        Self {
            config,
            think_delay,
            transport,
            opponent,
            matchmaker,
            phase: SessionPhase::Idle,
            listener: None,
            peer: None,
            room_link: None,
            pending_ai: None,
            epoch: 0,
            error: None,
            notice: None,
            matched_opponent: None,
            busy: false,
            records: GameRecords::default(),
            snapshot,
        }
    }

    /// Runs until shut down or every handle is dropped.
    #[instrument(skip_all)]
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<TransportEvent>,
    ) {
        info!(opponent = self.opponent.name(), "Session controller started");
        self.publish();

        loop {
            let ai_due = self.pending_ai.map(|pending| pending.due);
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                Some(event) = events.recv() => {
                    self.handle_event(event).await;
                    self.publish();
                }
                _ = sleep_until(ai_due.unwrap_or_else(Instant::now)), if ai_due.is_some() => {
                    self.commit_ai_move();
                    self.publish();
                }
            }
        }

        if self.phase != SessionPhase::Ended {
            self.stop().await;
            self.publish();
        }
        info!("Session controller stopped");
    }

    async fn stop(&mut self) {
        self.leave_room(None).await;
        self.phase = SessionPhase::Ended;
    }

    fn publish(&self) {
        self.snapshot.send_replace(SessionSnapshot::new(
            self.phase.clone(),
            self.room_link.clone(),
            self.error.clone(),
            self.notice.clone(),
            self.matched_opponent.clone(),
            self.busy,
            self.config,
            self.records.as_slice().to_vec(),
        ));
    }

    /// Publishes first so callers observe the new state once the reply lands.
    fn respond<T>(&self, reply: Reply<T>, result: Result<T, SessionError>) {
        self.publish();
        if reply.send(result).is_err() {
            debug!("Caller dropped reply channel");
        }
    }

    /// Returns `false` once the controller should stop.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::CreateRoom { host_name, reply } => {
                let result = self.create_room(host_name).await;
                self.respond(reply, result);
            }
            Command::JoinRoom {
                link,
                player_name,
                reply,
            } => {
                let result = self.join_room(&link, player_name).await;
                self.respond(reply, result);
            }
            Command::StartAiGame { reply } => {
                let result = self.start_ai_game();
                self.respond(reply, result);
            }
            Command::ClickCell { row, col, reply } => {
                let result = self.click_cell(Position::new(row, col)).await;
                self.respond(reply, result);
            }
            Command::ResetGame { reply } => {
                let result = self.reset_game().await;
                self.respond(reply, result);
            }
            Command::ExitRoom { reply } => {
                self.leave_room(None).await;
                self.error = None;
                self.respond(reply, Ok(()));
            }
            Command::FindMatch { reply } => {
                let result = self.find_match().await;
                self.respond(reply, result);
            }
            Command::SetConfig { config, reply } => {
                info!(mode = %config.mode(), board_size = config.board_size(), "Config updated");
                self.config = config;
                self.respond(reply, Ok(()));
            }
            Command::ClearRecords { reply } => {
                self.records.clear();
                self.respond(reply, Ok(()));
            }
            Command::Shutdown { reply } => {
                self.stop().await;
                self.respond(reply, Ok(()));
                return false;
            }
        }
        true
    }

    fn require_idle(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => Ok(()),
            ref other => Err(SessionError::WrongPhase {
                phase: other.name(),
            }),
        }
    }

    /// Stores a user-facing error and hands it back.
    fn fail<T>(&mut self, error: SessionError) -> Result<T, SessionError> {
        warn!(error = %error, "Session command failed");
        self.error = Some(error.to_string());
        Err(error)
    }

    #[instrument(skip(self))]
    async fn create_room(&mut self, host_name: String) -> Result<RoomLink, SessionError> {
        self.require_idle()?;
        self.error = None;
        self.notice = None;
        self.phase = SessionPhase::Hosting;
        self.publish();

        let listener = match self.transport.start_listening().await {
            Ok(listener) => listener,
            Err(e) => {
                self.phase = SessionPhase::Idle;
                return self.fail(SessionError::RoomCreationFailed(e));
            }
        };

        let addr = listener.advertised_addr();
        let room = Room::new(Room::generate_id(), addr.to_string(), host_name);
        listener.set_room(Some(room.room_id().clone()));
        let link = RoomLink::new(addr.ip().to_string(), addr.port(), room.room_id().clone());

        info!(link = %link, "Room open");
        self.listener = Some(listener);
        self.room_link = Some(link.clone());
        self.phase = SessionPhase::Waiting(room);
        Ok(link)
    }

    #[instrument(skip(self))]
    async fn join_room(&mut self, link: &str, player_name: String) -> Result<(), SessionError> {
        self.require_idle()?;
        self.error = None;
        self.notice = None;

        let link: RoomLink = match link.parse() {
            Ok(link) => link,
            Err(e) => return self.fail(SessionError::InvalidRoomLink(e)),
        };

        self.busy = true;
        self.publish();
        let result = self.dial(&link, &player_name).await;
        self.busy = false;

        let connection = match result {
            Ok(connection) => connection,
            Err(e) => return self.fail(e),
        };

        let mut room = Room::new(
            link.room_id().clone(),
            format!("{}:{}", link.address(), link.port()),
            String::from("Host"),
        );
        room.admit_guest(player_name);

        info!(id = %connection.id(), "Joined room as guest");
        self.peer = Some(connection);
        self.room_link = Some(link);
        self.epoch += 1;
        self.phase = SessionPhase::Active(ActiveGame::versus_peer(
            Role::Guest,
            room,
            *self.config.board_size(),
        ));
        Ok(())
    }

    /// Probe, connect, announce. Leaves nothing open on failure.
    async fn dial(&self, link: &RoomLink, player_name: &str) -> Result<Connection, SessionError> {
        let exists = self
            .transport
            .probe_room(link.address(), *link.port(), link.room_id())
            .await
            .map_err(SessionError::ConnectionFailed)?;
        if !exists {
            return Err(SessionError::RoomNotFound);
        }

        let connection = self
            .transport
            .connect(link.address(), *link.port())
            .await
            .map_err(SessionError::ConnectionFailed)?;

        let join = SyncMessage::Join {
            player_name: player_name.to_string(),
        };
        if let Err(e) = connection.send(&join).await {
            connection.close().await;
            return Err(SessionError::Send(e));
        }
        Ok(connection)
    }

    #[instrument(skip(self))]
    fn start_ai_game(&mut self) -> Result<(), SessionError> {
        self.require_idle()?;
        self.error = None;
        self.notice = None;
        self.epoch += 1;
        self.phase = SessionPhase::Active(ActiveGame::versus_ai(*self.config.board_size()));
        info!(board_size = self.config.board_size(), "AI game started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn click_cell(&mut self, position: Position) -> Result<(), SessionError> {
        let phase = self.phase.name();
        let SessionPhase::Active(game) = &mut self.phase else {
            return Err(SessionError::WrongPhase { phase });
        };
        if game.outcome().is_over() {
            return Err(SessionError::GameOver);
        }
        if *game.turn() != *game.local_mark() {
            return Err(SessionError::NotYourTurn);
        }

        let mark = *game.local_mark();
        let board = game
            .board()
            .apply_move(Move::new(position, mark))
            .map_err(SessionError::InvalidMove)?;
        let outcome = detect_outcome(&board);
        game.set_position(board, mark.opponent(), outcome);
        debug!(outcome = %outcome, "Local move applied");

        let game = game.clone();
        if outcome.is_over() {
            self.record(game.mode(), outcome);
        }

        match game.versus() {
            Versus::Peer { .. } => {
                let message = SyncMessage::Move {
                    board: game.board().clone(),
                    next_mark: *game.turn(),
                    outcome,
                };
                self.send_to_peer(&message).await
            }
            Versus::Ai { ai_mark } => {
                if !outcome.is_over() {
                    self.schedule_ai_move(game.board(), *ai_mark);
                }
                Ok(())
            }
        }
    }

    fn schedule_ai_move(&mut self, board: &Board, ai_mark: Mark) {
        let Some(position) = self.opponent.choose_move(board, ai_mark) else {
            warn!("Opponent found no move on an unfinished board");
            return;
        };
        debug!(position = %position, delay = ?self.think_delay, "AI move scheduled");
        self.pending_ai = Some(PendingAiMove {
            due: Instant::now() + self.think_delay,
            position,
            epoch: self.epoch,
        });
    }

    fn commit_ai_move(&mut self) {
        let Some(pending) = self.pending_ai.take() else {
            return;
        };
        if pending.epoch != self.epoch {
            debug!("Discarding AI move for a replaced board");
            return;
        }
        let SessionPhase::Active(game) = &mut self.phase else {
            return;
        };
        let Versus::Ai { ai_mark } = *game.versus() else {
            return;
        };
        if *game.turn() != ai_mark || game.outcome().is_over() {
            return;
        }

        let board = match game.board().apply_move(Move::new(pending.position, ai_mark)) {
            Ok(board) => board,
            Err(e) => {
                error!(error = %e, "AI chose an illegal move");
                return;
            }
        };
        let outcome = detect_outcome(&board);
        game.set_position(board, ai_mark.opponent(), outcome);
        info!(position = %pending.position, outcome = %outcome, "AI moved");

        if outcome.is_over() {
            let mode = game.mode();
            self.record(mode, outcome);
        }
    }

    #[instrument(skip(self))]
    async fn reset_game(&mut self) -> Result<(), SessionError> {
        let phase = self.phase.name();
        let SessionPhase::Active(game) = &mut self.phase else {
            return Err(SessionError::WrongPhase { phase });
        };

        let size = match game.versus() {
            Versus::Ai { .. } => *self.config.board_size(),
            Versus::Peer { .. } => game.board().size(),
        };
        let board = Board::new(size);
        game.set_position(board.clone(), Mark::X, GameOutcome::InProgress);
        let online = matches!(game.versus(), Versus::Peer { .. });

        self.epoch += 1;
        self.pending_ai = None;
        info!(size, "Game reset");

        if online {
            self.send_to_peer(&SyncMessage::Reset {
                board,
                next_mark: Mark::X,
            })
            .await
        } else {
            Ok(())
        }
    }

    #[instrument(skip(self))]
    async fn find_match(&mut self) -> Result<MatchData, SessionError> {
        self.error = None;
        let Some(matchmaker) = self.matchmaker.as_ref() else {
            return self.fail(SessionError::MatchFailed(MatchError::new(
                "No matchmaking service configured",
            )));
        };

        self.busy = true;
        self.publish();
        let result = matchmaker.find_match(*self.config.mode()).await;
        self.busy = false;

        match result {
            Ok(data) => {
                info!(opponent = %data.opponent, match_id = %data.match_id, "Match found");
                self.matched_opponent = Some(data.opponent.clone());
                Ok(data)
            }
            Err(e) => self.fail(SessionError::MatchFailed(e)),
        }
    }

    /// Best-effort delivery; the local state has already changed.
    async fn send_to_peer(&self, message: &SyncMessage) -> Result<(), SessionError> {
        let Some(peer) = self.peer.as_ref() else {
            warn!(kind = message.kind(), "No peer to send to");
            return Ok(());
        };
        peer.send(message).await.map_err(|e| {
            warn!(error = %e, kind = message.kind(), "Failed to sync with peer");
            SessionError::Send(e)
        })
    }

    fn record(&mut self, mode: GameMode, outcome: GameOutcome) {
        info!(mode = %mode, outcome = %outcome, "Game finished");
        self.records.push(GameRecord::now(mode, outcome));
    }

    /// Tears down any room or game and returns to idle.
    ///
    /// Tells the peer first when leaving voluntarily (`notice` is `None`).
    #[instrument(skip(self))]
    async fn leave_room(&mut self, notice: Option<String>) {
        if let Some(peer) = self.peer.take() {
            if notice.is_none()
                && let Err(e) = peer.send(&SyncMessage::Disconnect).await
            {
                debug!(error = %e, "Could not notify peer of exit");
            }
            peer.close().await;
        }
        if let Some(listener) = self.listener.take() {
            listener.shutdown();
        }

        if !matches!(self.phase, SessionPhase::Idle | SessionPhase::Ended) {
            info!(phase = self.phase.name(), "Leaving to idle");
        }
        self.phase = SessionPhase::Idle;
        self.room_link = None;
        self.pending_ai = None;
        self.epoch += 1;
        self.notice = notice;
    }

    fn is_peer(&self, id: ConnectionId) -> bool {
        self.peer.as_ref().is_some_and(|peer| peer.id() == id)
    }

    #[instrument(skip(self))]
    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::PeerJoined {
                connection,
                player_name,
            } => self.on_peer_joined(connection, player_name).await,
            TransportEvent::Message { from, message } => {
                if self.is_peer(from) {
                    self.on_peer_message(message).await;
                } else {
                    debug!(%from, kind = message.kind(), "Ignoring message from stale connection");
                }
            }
            TransportEvent::Closed { id } => {
                if self.is_peer(id) {
                    self.leave_room(Some(String::from("Opponent disconnected")))
                        .await;
                } else {
                    debug!(%id, "Stale connection closed");
                }
            }
        }
    }

    async fn on_peer_joined(&mut self, connection: Connection, player_name: String) {
        let SessionPhase::Waiting(room) = &self.phase else {
            warn!(phase = self.phase.name(), "Guest arrived with no open room");
            connection.close().await;
            return;
        };
        if self.peer.is_some() {
            warn!("Room already has a guest");
            connection.close().await;
            return;
        }

        let mut room = room.clone();
        room.admit_guest(player_name.clone());
        if let Some(listener) = self.listener.as_ref() {
            listener.set_room(None);
        }

        info!(id = %connection.id(), guest = %player_name, "Guest joined, starting game");
        self.peer = Some(connection);
        self.notice = Some(format!("{} joined the room", player_name));
        self.epoch += 1;
        self.phase = SessionPhase::Active(ActiveGame::versus_peer(
            Role::Host,
            room,
            *self.config.board_size(),
        ));
    }

    async fn on_peer_message(&mut self, message: SyncMessage) {
        match message {
            SyncMessage::Move {
                board,
                next_mark,
                outcome,
            } => {
                let Some(game) = self.online_game() else {
                    debug!("Move received outside an online game");
                    return;
                };
                game.set_position(board, next_mark, outcome);
                debug!(next_mark = %next_mark, outcome = %outcome, "Remote move applied");
                if outcome.is_over() {
                    self.record(GameMode::HumanVsHumanOnline, outcome);
                }
            }
            SyncMessage::Reset { board, next_mark } => {
                let Some(game) = self.online_game() else {
                    debug!("Reset received outside an online game");
                    return;
                };
                game.set_position(board, next_mark, GameOutcome::InProgress);
                self.epoch += 1;
                self.notice = Some(String::from("Opponent restarted the game"));
                info!("Remote reset applied");
            }
            SyncMessage::Disconnect => {
                self.leave_room(Some(String::from("Opponent left the room")))
                    .await;
            }
            other => {
                warn!(kind = other.kind(), "Ignoring unexpected message from peer");
            }
        }
    }

    fn online_game(&mut self) -> Option<&mut ActiveGame> {
        match &mut self.phase {
            SessionPhase::Active(game) if matches!(game.versus(), Versus::Peer { .. }) => {
                Some(game)
            }
            _ => None,
        }
    }
}
