//! End-to-end session scenarios over loopback sockets.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use ttt_engine::{Board, GameOutcome, Mark, Move, Opponent, Position, Square};
use ttt_peer::{
    Config, GameMode, MatchData, MatchError, Matchmaker, Role, RoomLink, SessionError,
    SessionHandle, SessionPhase, SessionSettings, SessionSnapshot, SessionTask, SessionTransport,
    SyncMessage, TransportEvent, TransportSettings, encode_line,
};

const WAIT: Duration = Duration::from_secs(5);

/// Plays a fixed list of squares, then the first empty one.
struct ScriptedOpponent {
    moves: VecDeque<Position>,
}

impl ScriptedOpponent {
    fn new(moves: &[(usize, usize)]) -> Box<Self> {
        Box::new(Self {
            moves: moves.iter().map(|&(r, c)| Position::new(r, c)).collect(),
        })
    }
}

impl Opponent for ScriptedOpponent {
    fn choose_move(&mut self, board: &Board, _mark: Mark) -> Option<Position> {
        self.moves
            .pop_front()
            .or_else(|| board.empty_positions().first().copied())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct FixedMatchmaker(Result<MatchData, MatchError>);

#[async_trait]
impl Matchmaker for FixedMatchmaker {
    async fn find_match(&self, _mode: GameMode) -> Result<MatchData, MatchError> {
        self.0.clone()
    }
}

fn settings(think_delay: Duration) -> SessionSettings {
    SessionSettings {
        transport: TransportSettings::loopback(),
        think_delay,
        config: Config::default(),
    }
}

fn spawn() -> (SessionHandle, SessionTask) {
    SessionHandle::spawn(settings(Duration::ZERO), ScriptedOpponent::new(&[]), None)
}

async fn wait_until(
    session: &SessionHandle,
    condition: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut updates = session.subscribe();
    let snapshot = timeout(WAIT, updates.wait_for(|s| condition(s)))
        .await
        .expect("timed out waiting for session state")
        .expect("session closed")
        .clone();
    snapshot
}

fn square(snapshot: &SessionSnapshot, row: usize, col: usize) -> Option<Square> {
    snapshot
        .phase()
        .active()
        .and_then(|game| game.board().get(Position::new(row, col)))
}

fn outcome(snapshot: &SessionSnapshot) -> Option<GameOutcome> {
    snapshot.phase().active().map(|game| *game.outcome())
}

/// Host creates a room and a second session joins it.
async fn connected_pair() -> (SessionHandle, SessionHandle) {
    let (host, _) = spawn();
    let (guest, _) = spawn();

    let link = host.create_room("alice").await.unwrap();
    guest.join_room(link.to_string(), "bob").await.unwrap();
    wait_until(&host, |s| s.phase().active().is_some()).await;
    (host, guest)
}

#[tokio::test]
async fn test_ai_game_human_wins() {
    let opponent = ScriptedOpponent::new(&[(1, 0), (1, 1)]);
    let (session, _task) = SessionHandle::spawn(settings(Duration::ZERO), opponent, None);

    session.start_ai_game().await.unwrap();
    let game = session.snapshot().phase().active().cloned().unwrap();
    assert_eq!(*game.local_mark(), Mark::X);
    assert_eq!(*game.turn(), Mark::X);
    assert_eq!(game.mode(), GameMode::HumanVsAi);

    session.click_cell(0, 0).await.unwrap();
    wait_until(&session, |s| square(s, 1, 0) == Some(Square::Occupied(Mark::O))).await;

    session.click_cell(0, 1).await.unwrap();
    wait_until(&session, |s| square(s, 1, 1) == Some(Square::Occupied(Mark::O))).await;

    session.click_cell(0, 2).await.unwrap();
    let snapshot = session.snapshot();
    assert_eq!(outcome(&snapshot), Some(GameOutcome::Won(Mark::X)));
    assert_eq!(snapshot.records().len(), 1);
    assert_eq!(*snapshot.records()[0].mode(), GameMode::HumanVsAi);
    assert_eq!(*snapshot.records()[0].outcome(), GameOutcome::Won(Mark::X));

    assert!(matches!(
        session.click_cell(2, 2).await,
        Err(SessionError::GameOver)
    ));
}

#[tokio::test]
async fn test_ai_game_rejects_bad_clicks() {
    let (session, _task) = SessionHandle::spawn(
        settings(Duration::from_secs(30)),
        ScriptedOpponent::new(&[]),
        None,
    );

    assert!(matches!(
        session.click_cell(0, 0).await,
        Err(SessionError::WrongPhase { .. })
    ));

    session.start_ai_game().await.unwrap();
    assert!(matches!(
        session.click_cell(3, 0).await,
        Err(SessionError::InvalidMove(_))
    ));

    session.click_cell(0, 0).await.unwrap();
    // The AI is still thinking.
    assert!(matches!(
        session.click_cell(0, 1).await,
        Err(SessionError::NotYourTurn)
    ));
    assert!(matches!(
        session.start_ai_game().await,
        Err(SessionError::WrongPhase { .. })
    ));
}

#[tokio::test]
async fn test_reset_discards_pending_ai_move() {
    let (session, _task) = SessionHandle::spawn(
        settings(Duration::from_millis(150)),
        ScriptedOpponent::new(&[(2, 2)]),
        None,
    );

    session.start_ai_game().await.unwrap();
    session.click_cell(0, 0).await.unwrap();
    session.reset_game().await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    let game = session.snapshot().phase().active().cloned().unwrap();
    assert!(game.board().empty_positions().len() == 9);
    assert_eq!(*game.turn(), Mark::X);
    assert!(session.snapshot().records().is_empty());
}

#[tokio::test]
async fn test_config_applies_to_next_game() {
    let (session, _task) = spawn();
    session
        .set_config(Config::new(GameMode::HumanVsAi, 4))
        .await
        .unwrap();
    session.start_ai_game().await.unwrap();

    let snapshot = session.snapshot();
    assert_eq!(*snapshot.config().board_size(), 4);
    assert_eq!(snapshot.phase().active().unwrap().board().size(), 4);
}

#[tokio::test]
async fn test_online_game_host_wins() {
    let (host, guest) = connected_pair().await;

    let host_game = host.snapshot().phase().active().cloned().unwrap();
    assert_eq!(host_game.role(), Some(Role::Host));
    assert_eq!(*host_game.local_mark(), Mark::X);
    assert!(host_game.is_local_turn());
    assert_eq!(host_game.room().unwrap().guest_name().as_deref(), Some("bob"));

    let guest_game = guest.snapshot().phase().active().cloned().unwrap();
    assert_eq!(guest_game.role(), Some(Role::Guest));
    assert_eq!(*guest_game.local_mark(), Mark::O);
    assert!(!guest_game.is_local_turn());

    // X: (0,0) (0,1) (0,2), O: (1,0) (1,1)
    host.click_cell(0, 0).await.unwrap();
    wait_until(&guest, |s| square(s, 0, 0) == Some(Square::Occupied(Mark::X))).await;
    guest.click_cell(1, 0).await.unwrap();
    wait_until(&host, |s| square(s, 1, 0) == Some(Square::Occupied(Mark::O))).await;
    host.click_cell(0, 1).await.unwrap();
    wait_until(&guest, |s| square(s, 0, 1) == Some(Square::Occupied(Mark::X))).await;
    guest.click_cell(1, 1).await.unwrap();
    wait_until(&host, |s| square(s, 1, 1) == Some(Square::Occupied(Mark::O))).await;
    host.click_cell(0, 2).await.unwrap();

    assert_eq!(outcome(&host.snapshot()), Some(GameOutcome::Won(Mark::X)));
    let guest_view =
        wait_until(&guest, |s| outcome(s) == Some(GameOutcome::Won(Mark::X))).await;

    assert_eq!(host.snapshot().records().len(), 1);
    assert_eq!(guest_view.records().len(), 1);
    assert_eq!(
        *guest_view.records()[0].mode(),
        GameMode::HumanVsHumanOnline
    );
}

#[tokio::test]
async fn test_guest_cannot_move_first() {
    let (_host, guest) = connected_pair().await;
    assert!(matches!(
        guest.click_cell(1, 1).await,
        Err(SessionError::NotYourTurn)
    ));
}

#[tokio::test]
async fn test_online_reset_syncs() {
    let (host, guest) = connected_pair().await;

    host.click_cell(1, 1).await.unwrap();
    wait_until(&guest, |s| square(s, 1, 1) == Some(Square::Occupied(Mark::X))).await;

    guest.reset_game().await.unwrap();
    let host_view = wait_until(&host, |s| square(s, 1, 1) == Some(Square::Empty)).await;
    let game = host_view.phase().active().unwrap();
    assert_eq!(*game.turn(), Mark::X);
    assert_eq!(*game.outcome(), GameOutcome::InProgress);
    assert_eq!(
        host_view.notice().as_deref(),
        Some("Opponent restarted the game")
    );
}

#[tokio::test]
async fn test_exit_notifies_peer() {
    let (host, guest) = connected_pair().await;

    host.exit_room().await.unwrap();
    assert_eq!(*host.snapshot().phase(), SessionPhase::Idle);
    assert!(host.snapshot().room_link().is_none());

    let guest_view = wait_until(&guest, |s| *s.phase() == SessionPhase::Idle).await;
    assert_eq!(guest_view.notice().as_deref(), Some("Opponent left the room"));

    // Both sides can start over.
    host.start_ai_game().await.unwrap();
    guest.start_ai_game().await.unwrap();
}

#[tokio::test]
async fn test_lost_connection_returns_host_to_idle() {
    let (host, _task) = spawn();
    let link = host.create_room("alice").await.unwrap();

    let (tx, _rx) = mpsc::channel(8);
    let raw = SessionTransport::new(TransportSettings::loopback(), tx);
    let conn = raw.connect(link.address(), *link.port()).await.unwrap();
    conn.send(&SyncMessage::Join {
        player_name: "flaky".to_string(),
    })
    .await
    .unwrap();
    wait_until(&host, |s| s.phase().active().is_some()).await;

    conn.close().await;
    let snapshot = wait_until(&host, |s| *s.phase() == SessionPhase::Idle).await;
    assert_eq!(snapshot.notice().as_deref(), Some("Opponent disconnected"));
}

#[tokio::test]
async fn test_host_ignores_misshapen_boards() {
    let (host, _task) = spawn();
    let link = host.create_room("alice").await.unwrap();

    let mut raw = TcpStream::connect(format!("{}:{}", link.address(), link.port()))
        .await
        .unwrap();
    raw.write_all(b"{\"type\":\"join\",\"player_name\":\"raw\"}\n")
        .await
        .unwrap();
    wait_until(&host, |s| s.phase().active().is_some()).await;

    let valid_move = encode_line(&SyncMessage::Move {
        board: Board::new(3).apply_move(Move::new((0, 0), Mark::O)).unwrap(),
        next_mark: Mark::X,
        outcome: GameOutcome::InProgress,
    })
    .unwrap();
    let valid: serde_json::Value = serde_json::from_str(&valid_move).unwrap();
    let mut zero = valid.clone();
    zero["board"] = serde_json::json!({ "size": 0, "squares": [] });
    let mut short = valid.clone();
    short["board"]["squares"] = serde_json::json!(["Empty"]);
    let reset = encode_line(&SyncMessage::Reset {
        board: Board::new(3),
        next_mark: Mark::X,
    })
    .unwrap();

    let payload = format!("{zero}\n{short}\n{reset}");
    raw.write_all(payload.as_bytes()).await.unwrap();

    let snapshot = wait_until(&host, |s| {
        s.notice().as_deref() == Some("Opponent restarted the game")
    })
    .await;
    let game = snapshot.phase().active().unwrap();
    assert_eq!(game.board().size(), 3);
    assert_eq!(game.board().squares().len(), 9);
    assert_eq!(*game.turn(), Mark::X);
    host.click_cell(2, 2).await.unwrap();
}

#[tokio::test]
async fn test_guest_adopts_latest_move_wholesale() {
    let (tx, mut host_events) = mpsc::channel(8);
    let raw_host = SessionTransport::new(TransportSettings::loopback(), tx);
    let listener = raw_host.start_listening().await.unwrap();
    listener.set_room(Some("room_raw".to_string()));
    let link = RoomLink::new("127.0.0.1", listener.advertised_addr().port(), "room_raw");

    let (guest, _task) = spawn();
    guest.join_room(link.to_string(), "bob").await.unwrap();
    let to_guest = match timeout(WAIT, host_events.recv()).await.unwrap().unwrap() {
        TransportEvent::PeerJoined { connection, .. } => connection,
        other => panic!("expected PeerJoined, got {:?}", other),
    };

    // X takes the top row.
    let finished = [
        (0, 0, Mark::X),
        (1, 1, Mark::O),
        (0, 1, Mark::X),
        (2, 2, Mark::O),
        (0, 2, Mark::X),
    ]
    .into_iter()
    .fold(Board::new(3), |board, (r, c, mark)| {
        board.apply_move(Move::new((r, c), mark)).unwrap()
    });
    to_guest
        .send(&SyncMessage::Move {
            board: finished,
            next_mark: Mark::O,
            outcome: GameOutcome::Won(Mark::X),
        })
        .await
        .unwrap();
    wait_until(&guest, |s| outcome(s) == Some(GameOutcome::Won(Mark::X))).await;

    let earlier = Board::new(3)
        .apply_move(Move::new((0, 0), Mark::X))
        .unwrap();
    to_guest
        .send(&SyncMessage::Move {
            board: earlier.clone(),
            next_mark: Mark::O,
            outcome: GameOutcome::InProgress,
        })
        .await
        .unwrap();
    let snapshot = wait_until(&guest, |s| {
        s.phase().active().map(|game| game.board()) == Some(&earlier)
    })
    .await;

    let game = snapshot.phase().active().unwrap();
    assert_eq!(*game.turn(), Mark::O);
    assert_eq!(*game.outcome(), GameOutcome::InProgress);
    assert!(game.is_local_turn());
    guest.click_cell(1, 1).await.unwrap();
}

#[tokio::test]
async fn test_waiting_room_published() {
    let (host, _task) = spawn();
    let link = host.create_room("alice").await.unwrap();

    let snapshot = host.snapshot();
    let SessionPhase::Waiting(room) = snapshot.phase() else {
        panic!("expected Waiting, got {:?}", snapshot.phase());
    };
    assert_eq!(room.room_id(), link.room_id());
    assert_eq!(room.host_name(), "alice");
    assert!(!*room.is_full());
    assert_eq!(snapshot.room_link().as_ref(), Some(&link));
    assert_eq!(link.address(), "127.0.0.1");

    assert!(matches!(
        host.create_room("again").await,
        Err(SessionError::WrongPhase { .. })
    ));
}

#[tokio::test]
async fn test_join_invalid_link() {
    let (guest, _task) = spawn();
    let err = guest.join_room("not-a-link", "bob").await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidRoomLink(_)));

    let snapshot = guest.snapshot();
    assert_eq!(*snapshot.phase(), SessionPhase::Idle);
    assert_eq!(snapshot.error().as_deref(), Some(err.to_string().as_str()));
}

#[tokio::test]
async fn test_join_unknown_room() {
    let (host, _host_task) = spawn();
    let (guest, _guest_task) = spawn();
    let link = host.create_room("alice").await.unwrap();

    let wrong = format!("{}:{}:room_missing", link.address(), link.port());
    let err = guest.join_room(wrong, "bob").await.unwrap_err();
    assert!(matches!(err, SessionError::RoomNotFound));
    assert_eq!(*guest.snapshot().phase(), SessionPhase::Idle);
    assert!(guest.snapshot().error().is_some());
    assert!(matches!(host.snapshot().phase(), SessionPhase::Waiting(_)));
}

#[tokio::test]
async fn test_join_full_room() {
    let (host, guest) = connected_pair().await;
    let link = host.snapshot().room_link().clone().unwrap();

    let (late, _task) = spawn();
    let err = late.join_room(link.to_string(), "carol").await.unwrap_err();
    assert!(matches!(err, SessionError::RoomNotFound));
    assert!(guest.snapshot().phase().active().is_some());
}

#[tokio::test]
async fn test_join_unreachable_host() {
    let port = {
        let socket = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        socket.local_addr().unwrap().port()
    };
    let (guest, _task) = spawn();

    let err = guest
        .join_room(format!("127.0.0.1:{}:room_x", port), "bob")
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::ConnectionFailed(_)));
    assert!(!guest.snapshot().busy());
}

#[tokio::test]
async fn test_find_match() {
    let found = MatchData {
        opponent: "zed".to_string(),
        match_id: "m-1".to_string(),
    };
    let (session, _task) = SessionHandle::spawn(
        settings(Duration::ZERO),
        ScriptedOpponent::new(&[]),
        Some(Box::new(FixedMatchmaker(Ok(found.clone())))),
    );
    assert_eq!(session.find_match().await.unwrap(), found);
    assert_eq!(session.snapshot().matched_opponent().as_deref(), Some("zed"));

    let (failing, _task) = SessionHandle::spawn(
        settings(Duration::ZERO),
        ScriptedOpponent::new(&[]),
        Some(Box::new(FixedMatchmaker(Err(MatchError::new("queue empty"))))),
    );
    assert!(matches!(
        failing.find_match().await,
        Err(SessionError::MatchFailed(_))
    ));
    assert!(failing.snapshot().error().as_deref().unwrap().contains("queue empty"));

    let (none, _task) = spawn();
    assert!(none.find_match().await.is_err());
}

#[tokio::test]
async fn test_clear_records() {
    let opponent = ScriptedOpponent::new(&[(1, 0), (1, 1)]);
    let (session, _task) = SessionHandle::spawn(settings(Duration::ZERO), opponent, None);
    session.start_ai_game().await.unwrap();
    for (col, ai_col) in [(0, Some(0)), (1, Some(1)), (2, None)] {
        session.click_cell(0, col).await.unwrap();
        if let Some(ai_col) = ai_col {
            wait_until(&session, |s| square(s, 1, ai_col) == Some(Square::Occupied(Mark::O)))
                .await;
        }
    }
    assert_eq!(session.snapshot().records().len(), 1);

    session.clear_records().await.unwrap();
    assert!(session.snapshot().records().is_empty());
}

#[tokio::test]
async fn test_shutdown_ends_session() {
    let (host, guest) = connected_pair().await;

    guest.shutdown().await.unwrap();
    assert_eq!(*guest.snapshot().phase(), SessionPhase::Ended);
    assert!(matches!(
        guest.start_ai_game().await,
        Err(SessionError::Stopped)
    ));

    let host_view = wait_until(&host, |s| *s.phase() == SessionPhase::Idle).await;
    assert_eq!(host_view.notice().as_deref(), Some("Opponent left the room"));
}

#[tokio::test]
async fn test_task_finishes_when_handles_drop() {
    let (session, task) = spawn();
    let updates = session.subscribe();
    drop(session);
    timeout(WAIT, task.join()).await.unwrap();
    assert_eq!(*updates.borrow().phase(), SessionPhase::Ended);
}
