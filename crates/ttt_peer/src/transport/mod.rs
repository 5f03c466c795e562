//! Peer-to-peer session transport over TCP.
//!
//! One side listens ([`SessionTransport::start_listening`]) and the other
//! dials in ([`SessionTransport::connect`]). Both ends exchange
//! newline-delimited JSON [`SyncMessage`]s. Everything received is delivered
//! through a single [`mpsc`] inbox as [`TransportEvent`]s, so the owner of the
//! game state never shares it with the I/O tasks.

mod addr;
mod connection;
mod error;
mod listener;

pub use addr::local_ip;
pub use connection::{Connection, ConnectionId, MAX_LINE_BYTES};
pub use error::{ConnectError, ListenError, SendError};
pub use listener::Listener;

use crate::message::{SyncMessage, decode_line, encode_line};
use connection::{next_line, read_loop};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Something that happened on a connection.
#[derive(Debug)]
pub enum TransportEvent {
    /// A guest sent `Join` to our listener; the connection is now theirs.
    PeerJoined {
        /// Connection to the guest.
        connection: Connection,
        /// Name the guest announced.
        player_name: String,
    },
    /// A message arrived on an established connection.
    Message {
        /// Connection it arrived on.
        from: ConnectionId,
        /// The decoded message.
        message: SyncMessage,
    },
    /// An established connection's read loop ended.
    Closed {
        /// The connection that ended.
        id: ConnectionId,
    },
}

/// Network parameters for hosting and joining.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Interface to bind the listener on.
    pub bind_ip: IpAddr,
    /// Address to put in room links; discovered when `None`.
    pub advertise_ip: Option<IpAddr>,
    /// Ports tried in order when hosting; `0` asks the OS for any free port.
    pub port_range: RangeInclusive<u16>,
    /// Limit for establishing a game connection.
    pub connect_timeout: Duration,
    /// Limit for a whole room probe round trip.
    pub probe_timeout: Duration,
    /// How long an incoming connection may take to send its first message.
    pub handshake_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            advertise_ip: None,
            port_range: 8080..=8090,
            connect_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(3),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl TransportSettings {
    /// Loopback-only settings with ephemeral ports, for local play and tests.
    pub fn loopback() -> Self {
        Self {
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            advertise_ip: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port_range: 0..=0,
            ..Self::default()
        }
    }
}

/// Creates listeners and connections that report into one event inbox.
#[derive(Debug, Clone)]
pub struct SessionTransport {
    settings: TransportSettings,
    events: mpsc::Sender<TransportEvent>,
    next_id: Arc<AtomicU64>,
}

impl SessionTransport {
    /// Creates a transport delivering events to `events`.
    #[instrument(skip(events))]
    pub fn new(settings: TransportSettings, events: mpsc::Sender<TransportEvent>) -> Self {
        Self {
            settings,
            events,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Returns the network settings.
    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Binds the first free port in the configured range and starts accepting.
    ///
    /// # Errors
    ///
    /// Returns [`ListenError`] if no port in the range can be bound.
    #[instrument(skip(self), fields(range = ?self.settings.port_range))]
    pub async fn start_listening(&self) -> Result<Listener, ListenError> {
        let range = self.settings.port_range.clone();
        let mut last_error = String::from("empty port range");

        for port in range.clone() {
            match TcpListener::bind((self.settings.bind_ip, port)).await {
                Ok(listener) => {
                    let local_addr = listener.local_addr().map_err(|e| ListenError {
                        first: *range.start(),
                        last: *range.end(),
                        message: e.to_string(),
                    })?;
                    let advertised_ip = self.settings.advertise_ip.unwrap_or_else(|| {
                        if self.settings.bind_ip.is_unspecified() {
                            local_ip()
                        } else {
                            self.settings.bind_ip
                        }
                    });
                    let advertised_addr = SocketAddr::new(advertised_ip, local_addr.port());
                    info!(%local_addr, %advertised_addr, "Listening for guests");
                    return Ok(Listener::spawn(
                        listener,
                        local_addr,
                        advertised_addr,
                        self.settings.handshake_timeout,
                        self.next_id.clone(),
                        self.events.clone(),
                    ));
                }
                Err(e) => {
                    debug!(port, error = %e, "Port unavailable, trying next");
                    last_error = e.to_string();
                }
            }
        }

        warn!(error = %last_error, "Port range exhausted");
        Err(ListenError {
            first: *range.start(),
            last: *range.end(),
            message: last_error,
        })
    }

    /// Opens a game connection to a remote listener and starts its read loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the connection is not established within
    /// the connect timeout.
    #[instrument(skip(self))]
    pub async fn connect(&self, address: &str, port: u16) -> Result<Connection, ConnectError> {
        let connecting = TcpStream::connect((address, port));
        let stream = match timeout(self.settings.connect_timeout, connecting).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                warn!(error = %e, "Connect failed");
                return Err(ConnectError::from_io(&e));
            }
            Err(_) => {
                warn!(timeout = ?self.settings.connect_timeout, "Connect timed out");
                return Err(ConnectError::Timeout);
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Could not set TCP_NODELAY");
        }
        let peer_addr = stream.peer_addr().map_err(|e| ConnectError::from_io(&e))?;
        let (read, write) = stream.into_split();
        let id = self.next_id();
        let (connection, shutdown) = Connection::new(id, peer_addr, write);
        tokio::spawn(read_loop(
            id,
            BufReader::new(read),
            shutdown,
            self.events.clone(),
        ));

        info!(%id, %peer_addr, "Connected to host");
        Ok(connection)
    }

    /// Asks a remote listener whether `room_id` is its open room.
    ///
    /// Uses a short-lived connection of its own. A listener that hangs up or
    /// answers with something other than a probe result counts as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] if the listener cannot be reached or the round
    /// trip exceeds the probe timeout.
    #[instrument(skip(self))]
    pub async fn probe_room(
        &self,
        address: &str,
        port: u16,
        room_id: &str,
    ) -> Result<bool, ConnectError> {
        let request = encode_line(&SyncMessage::RoomProbe {
            room_id: room_id.to_string(),
        })
        .map_err(|e| {
            warn!(error = %e, "Failed to encode probe");
            ConnectError::Unreachable
        })?;

        let round_trip = async {
            let stream = TcpStream::connect((address, port))
                .await
                .map_err(|e| ConnectError::from_io(&e))?;
            let (read, mut write) = stream.into_split();
            write
                .write_all(request.as_bytes())
                .await
                .map_err(|e| ConnectError::from_io(&e))?;
            next_line(&mut BufReader::new(read))
                .await
                .map_err(|e| ConnectError::from_io(&e))
        };

        let reply = match timeout(self.settings.probe_timeout, round_trip).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(timeout = ?self.settings.probe_timeout, "Room probe timed out");
                return Err(ConnectError::Timeout);
            }
        };

        let exists = match reply.as_deref().map(decode_line) {
            Some(Ok(SyncMessage::RoomProbeResult { exists })) => exists,
            Some(Ok(other)) => {
                warn!(kind = other.kind(), "Unexpected probe reply");
                false
            }
            Some(Err(e)) => {
                warn!(error = %e, "Undecodable probe reply");
                false
            }
            None => {
                warn!("Listener closed without answering probe");
                false
            }
        };

        info!(exists, "Room probe answered");
        Ok(exists)
    }
}
