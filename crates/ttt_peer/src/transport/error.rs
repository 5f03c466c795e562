//! Transport error types.

use derive_more::{Display, Error};
use std::io;
use tracing::instrument;

/// Failure to reach a remote listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum ConnectError {
    /// No answer within the configured timeout.
    #[display("Connection timed out")]
    Timeout,
    /// The remote host actively refused the connection.
    #[display("Connection refused")]
    Refused,
    /// Any other failure to reach the remote host.
    #[display("Host unreachable")]
    Unreachable,
}

impl ConnectError {
    /// Classifies an I/O error raised while connecting.
    #[instrument]
    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectError::Refused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectError::Timeout,
            _ => ConnectError::Unreachable,
        }
    }
}

/// Failure to deliver one message.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SendError {
    /// The connection was closed locally or by the peer.
    #[display("Connection closed")]
    ConnectionClosed,
    /// Writing to the socket failed.
    #[display("I/O error while sending: {message}")]
    Io {
        /// Underlying error text.
        message: String,
    },
}

impl From<io::Error> for SendError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => SendError::ConnectionClosed,
            _ => SendError::Io {
                message: err.to_string(),
            },
        }
    }
}

/// No port in the configured window could be bound.
#[derive(Debug, Clone, Display, Error)]
#[display("No free port in {first}..={last}: {message}")]
pub struct ListenError {
    /// First port tried.
    pub first: u16,
    /// Last port tried.
    pub last: u16,
    /// Error from the last bind attempt.
    pub message: String,
}
