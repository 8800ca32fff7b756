/// rsock Error Types
///
/// One error taxonomy shared by every layer: configuration, connection
/// lifecycle, framing and request resolution.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type for rsock operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid or inconsistent configuration (bad address, scheme mismatch).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport kind unknown or not compiled into this build.
    #[error("Unsupported transport: {0}")]
    UnsupportedTransport(String),

    /// Transport-level connect failure.
    #[error("Connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    /// A connect is already in flight on this client.
    #[error("Client is already connecting")]
    AlreadyConnecting,

    /// The client already owns a live connection.
    #[error("Client is already connected")]
    AlreadyConnected,

    /// Operation requires a connected client.
    #[error("Client is not connected")]
    NotConnected,

    /// Operation is not valid in the current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Writing a frame to the transport failed.
    #[error("Send failed: {0}")]
    Send(String),

    /// Reading from the transport failed.
    #[error("Receive failed: {0}")]
    Recv(String),

    /// Peer sent something that violates the framing protocol.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Request was not answered within its deadline.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection closed while the operation was outstanding.
    #[error("Connection closed")]
    Disconnected,

    /// Peer answered with an ERROR frame.
    #[error("Application error {code:#010x}: {message}")]
    Application { code: u32, message: String },

    /// Frame exceeds the maximum encodable length.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// Buffer allocation failed.
    #[error("Out of memory allocating {0} bytes")]
    OutOfMemory(usize),

    /// Stream id space for this connection is used up.
    #[error("Stream ids exhausted")]
    StreamIdsExhausted,

    /// IO error during socket operations
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for rsock operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error with a message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a protocol error with a message
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a connect error for `endpoint`
    pub fn connect(endpoint: impl ToString, reason: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a send error from any displayable cause
    pub fn send(cause: impl ToString) -> Self {
        Self::Send(cause.to_string())
    }

    /// Create a receive error from any displayable cause
    pub fn recv(cause: impl ToString) -> Self {
        Self::Recv(cause.to_string())
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors leave the connection usable; the same client can
    /// keep issuing requests.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::Timeout(_)
            | Self::Application { .. }
            | Self::FrameTooLarge { .. }
            | Self::OutOfMemory(_) => true,
            _ => false,
        }
    }

    /// Check if this is a connection error
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::Disconnected
                | Self::NotConnected
                | Self::Send(_)
                | Self::Recv(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_error_display() {
        let err = Error::Application {
            code: 0x201,
            message: "no such route".into(),
        };
        assert_eq!(err.to_string(), "Application error 0x00000201: no such route");
    }

    #[test]
    fn test_classification() {
        assert!(Error::Disconnected.is_connection_error());
        assert!(!Error::Disconnected.is_recoverable());
        assert!(Error::Timeout(Duration::from_millis(5)).is_recoverable());
        assert!(Error::connect("127.0.0.1:1", "refused").is_connection_error());
        assert!(!Error::config("bad").is_connection_error());
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(err.is_recoverable());
    }
}
