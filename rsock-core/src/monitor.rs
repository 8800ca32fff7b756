//! Connection event monitoring.
//!
//! Provides an event stream for tracking connection lifecycle transitions.

use crate::endpoint::Endpoint;
use std::fmt;

/// Connection lifecycle events.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Connect attempt started.
    Connecting(Endpoint),

    /// Transport connected and the setup frame was written.
    Connected(Endpoint),

    /// Connect attempt failed.
    ConnectFailed { endpoint: Endpoint, reason: String },

    /// Connection ended, either by `close()` or by a transport failure.
    Disconnected {
        endpoint: Endpoint,
        reason: Option<String>,
    },
}

impl ConnectionEvent {
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::Connecting(ep) | Self::Connected(ep) => ep,
            Self::ConnectFailed { endpoint, .. } | Self::Disconnected { endpoint, .. } => endpoint,
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting(ep) => write!(f, "Connecting to {ep}"),
            Self::Connected(ep) => write!(f, "Connected to {ep}"),
            Self::ConnectFailed { endpoint, reason } => {
                write!(f, "Connect failed for {endpoint}: {reason}")
            }
            Self::Disconnected {
                endpoint,
                reason: Some(reason),
            } => write!(f, "Disconnected from {endpoint}: {reason}"),
            Self::Disconnected {
                endpoint,
                reason: None,
            } => write!(f, "Disconnected from {endpoint}"),
        }
    }
}

/// Handle for receiving connection events.
pub type ConnectionMonitor = flume::Receiver<ConnectionEvent>;

/// Sender half used by the client to emit events.
pub type ConnectionEventSender = flume::Sender<ConnectionEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (ConnectionEventSender, ConnectionMonitor) {
    flume::unbounded()
}
