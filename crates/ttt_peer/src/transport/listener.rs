//! Host-side accept loop.

use super::TransportEvent;
use super::connection::{Connection, ConnectionId, next_line, read_loop};
use crate::message::{SyncMessage, decode_line, encode_line};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, instrument, warn};

/// A bound listening socket accepting one guest.
///
/// Dropping the listener (or calling [`Listener::shutdown`]) stops the accept
/// loop and every connection task it spawned.
#[derive(Debug)]
pub struct Listener {
    local_addr: SocketAddr,
    advertised_addr: SocketAddr,
    open_room: watch::Sender<Option<String>>,
    accept_task: JoinHandle<()>,
}

impl Listener {
    /// Starts the accept loop on an already bound socket.
    pub(crate) fn spawn(
        listener: TcpListener,
        local_addr: SocketAddr,
        advertised_addr: SocketAddr,
        handshake_timeout: Duration,
        next_id: Arc<AtomicU64>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        let (open_room, room_rx) = watch::channel(None);
        let accept_task = tokio::spawn(accept_loop(
            listener,
            room_rx,
            handshake_timeout,
            next_id,
            events,
        ));
        Self {
            local_addr,
            advertised_addr,
            open_room,
            accept_task,
        }
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Address to hand out in room links.
    pub fn advertised_addr(&self) -> SocketAddr {
        self.advertised_addr
    }

    /// Publishes which room probes should report as existing; `None` closes it.
    #[instrument(skip(self))]
    pub fn set_room(&self, room_id: Option<String>) {
        debug!("Updating open room");
        self.open_room.send_replace(room_id);
    }

    /// Stops accepting and aborts all connection tasks.
    #[instrument(skip(self), fields(addr = %self.local_addr))]
    pub fn shutdown(&self) {
        if !self.accept_task.is_finished() {
            info!("Listener shut down");
        }
        self.open_room.send_replace(None);
        self.accept_task.abort();
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[instrument(skip_all)]
async fn accept_loop(
    listener: TcpListener,
    open_room: watch::Receiver<Option<String>>,
    handshake_timeout: Duration,
    next_id: Arc<AtomicU64>,
    events: mpsc::Sender<TransportEvent>,
) {
    let claimed = Arc::new(AtomicBool::new(false));
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let id = ConnectionId(next_id.fetch_add(1, Ordering::Relaxed));
                    info!(%id, %peer, "Accepted connection");
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(error = %e, "Could not set TCP_NODELAY");
                    }
                    connections.spawn(handle_incoming(
                        id,
                        stream,
                        peer,
                        Instant::now() + handshake_timeout,
                        open_room.clone(),
                        claimed.clone(),
                        events.clone(),
                    ));
                }
                Err(e) => {
                    error!(error = %e, "Accept failed, no longer accepting");
                    break;
                }
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished
                    && e.is_panic()
                {
                    error!(error = %e, "Connection task panicked");
                }
            }
        }
    }

    while connections.join_next().await.is_some() {}
}

/// Serves one incoming connection.
///
/// The first decodable line decides what the connection is: a room probe is
/// answered and closed, the first join becomes the guest connection, anything
/// else is closed. A connection that has not decided by `deadline` is dropped.
#[instrument(skip(stream, deadline, open_room, claimed, events))]
async fn handle_incoming(
    id: ConnectionId,
    stream: TcpStream,
    peer: SocketAddr,
    deadline: Instant,
    open_room: watch::Receiver<Option<String>>,
    claimed: Arc<AtomicBool>,
    events: mpsc::Sender<TransportEvent>,
) {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);

    loop {
        let line = match timeout_at(deadline, next_line(&mut reader)).await {
            Ok(Ok(Some(line))) => line,
            Ok(Ok(None)) => {
                debug!("Connection closed before sending a message");
                return;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Read failed before first message");
                return;
            }
            Err(_) => {
                warn!("No first message before the handshake deadline, closing connection");
                let _ = write.shutdown().await;
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let message = match decode_line(&line) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "Dropping undecodable message");
                continue;
            }
        };

        match message {
            SyncMessage::RoomProbe { room_id } => {
                let open = open_room.borrow().as_deref() == Some(room_id.as_str());
                let exists = open && !claimed.load(Ordering::SeqCst);
                info!(room_id = %room_id, exists, "Answering room probe");
                reply_and_close(&mut write, &SyncMessage::RoomProbeResult { exists }).await;
                return;
            }
            SyncMessage::Join { player_name } => {
                let room_open = open_room.borrow().is_some();
                if !room_open || claimed.swap(true, Ordering::SeqCst) {
                    warn!(
                        player_name = %player_name,
                        room_open,
                        "Rejecting join, room is not accepting guests"
                    );
                    let _ = write.shutdown().await;
                    return;
                }

                info!(player_name = %player_name, "Guest connection claimed");
                let (connection, shutdown) = Connection::new(id, peer, write);
                if events
                    .send(TransportEvent::PeerJoined {
                        connection,
                        player_name,
                    })
                    .await
                    .is_err()
                {
                    debug!("Event inbox closed");
                    return;
                }
                read_loop(id, reader, shutdown, events).await;
                return;
            }
            other => {
                warn!(kind = other.kind(), "Unexpected first message, closing connection");
                let _ = write.shutdown().await;
                return;
            }
        }
    }
}

async fn reply_and_close(write: &mut OwnedWriteHalf, message: &SyncMessage) {
    let line = match encode_line(message) {
        Ok(line) => line,
        Err(e) => {
            error!(error = %e, "Failed to encode reply");
            return;
        }
    };
    if let Err(e) = write.write_all(line.as_bytes()).await {
        warn!(error = %e, "Failed to send reply");
    }
    let _ = write.shutdown().await;
}
