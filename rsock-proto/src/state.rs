//! Client and connection lifecycle states.

use rsock_core::endpoint::Endpoint;
use rsock_core::transport::TransportKind;
use std::fmt;
use std::time::Instant;

/// Client lifecycle.
///
/// `Unconnected → Connecting → Connected → Closed`. A failed connect falls
/// back to `Unconnected`; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unconnected => "unconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
        })
    }
}

/// State of the transport connection a client owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Snapshot of a client's connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub endpoint: Endpoint,
    pub state: ConnectionState,
    pub connected_at: Option<Instant>,
}

impl ConnectionInfo {
    pub(crate) fn connecting(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: ConnectionState::Connecting,
            connected_at: None,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.endpoint.kind()
    }
}
