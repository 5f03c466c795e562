//! A persistent line-delimited connection to one peer.

use super::{SendError, TransportEvent};
use crate::message::{SyncMessage, decode_line, encode_line};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

/// Longest line accepted from a peer, in bytes, excluding the newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Identifies one connection for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("#{_0}")]
pub struct ConnectionId(pub(crate) u64);

struct ConnectionInner {
    id: ConnectionId,
    peer_addr: SocketAddr,
    writer: Mutex<Option<BufWriter<OwnedWriteHalf>>>,
    shutdown: watch::Sender<bool>,
}

/// Handle to a live connection.
///
/// Clones share the same socket. The read side runs on its own task and
/// reports through the transport's event inbox.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("peer_addr", &self.inner.peer_addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Connection {
    /// Wraps the write half; the returned receiver stops the matching read loop.
    pub(crate) fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        writer: OwnedWriteHalf,
    ) -> (Self, watch::Receiver<bool>) {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let connection = Self {
            inner: Arc::new(ConnectionInner {
                id,
                peer_addr,
                writer: Mutex::new(Some(BufWriter::new(writer))),
                shutdown,
            }),
        };
        (connection, shutdown_rx)
    }

    /// Returns the connection id.
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.inner.peer_addr
    }

    /// Returns `true` once [`Connection::close`] has been called.
    pub fn is_closed(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Serializes and writes one message.
    ///
    /// # Errors
    ///
    /// [`SendError::ConnectionClosed`] if the connection is closed or the peer
    /// hung up, [`SendError::Io`] for any other write failure. A failed write
    /// leaves the connection unusable for further sends.
    #[instrument(skip(self, message), fields(id = %self.inner.id, kind = message.kind()))]
    pub async fn send(&self, message: &SyncMessage) -> Result<(), SendError> {
        let line = encode_line(message).map_err(|e| SendError::Io {
            message: e.to_string(),
        })?;

        let mut guard = self.inner.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            debug!("Send on closed connection");
            return Err(SendError::ConnectionClosed);
        };

        let result = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            warn!(error = %e, "Send failed, dropping writer");
            *guard = None;
            return Err(e.into());
        }

        debug!(bytes = line.len(), "Message sent");
        Ok(())
    }

    /// Stops the read loop and closes the socket. Safe to call repeatedly.
    #[instrument(skip(self), fields(id = %self.inner.id))]
    pub async fn close(&self) {
        let was_closed = self.inner.shutdown.send_replace(true);
        if let Some(mut writer) = self.inner.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Error shutting down write half");
            }
        }
        if !was_closed {
            info!(peer = %self.inner.peer_addr, "Connection closed");
        }
    }
}

/// Reads one line of at most [`MAX_LINE_BYTES`], without its line ending.
///
/// Returns `Ok(None)` at end of stream. A longer line or invalid UTF-8 is an
/// [`io::ErrorKind::InvalidData`] error.
pub(crate) async fn next_line<R>(reader: &mut BufReader<R>) -> io::Result<Option<String>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = MAX_LINE_BYTES as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > MAX_LINE_BYTES {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("line exceeds {MAX_LINE_BYTES} bytes"),
        ));
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Reads lines until EOF, error, or shutdown, forwarding decoded messages.
///
/// Undecodable lines are logged and skipped; an oversized line ends the loop.
/// A [`TransportEvent::Closed`] is always emitted when the loop ends.
#[instrument(skip(reader, shutdown, events))]
pub(crate) async fn read_loop(
    id: ConnectionId,
    mut reader: BufReader<OwnedReadHalf>,
    mut shutdown: watch::Receiver<bool>,
    events: mpsc::Sender<TransportEvent>,
) {
    debug!("Read loop started");

    if !*shutdown.borrow_and_update() {
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Read loop cancelled");
                        break;
                    }
                }
                line = next_line(&mut reader) => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match decode_line(&line) {
                            Ok(message) => {
                                debug!(kind = message.kind(), "Message received");
                                let event = TransportEvent::Message { from: id, message };
                                if events.send(event).await.is_err() {
                                    debug!("Event inbox closed");
                                    break;
                                }
                            }
                            Err(e) => error!(error = %e, "Dropping undecodable message"),
                        }
                    }
                    Ok(None) => {
                        info!("Peer closed the connection");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Read failed");
                        break;
                    }
                },
            }
        }
    }

    let _ = events.send(TransportEvent::Closed { id }).await;
}
