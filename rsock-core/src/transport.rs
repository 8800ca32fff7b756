//! Transport kinds and connection configuration.
//!
//! The set of transports is closed. Whether a kind is usable in a given build
//! depends on the protocol crate's cargo features; this module only names
//! them and carries the configuration values.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The transports a client can connect over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Length-prefixed frames over a TCP stream.
    Tcp,
    /// One binary WebSocket message per frame.
    WebSocket,
    /// Length-prefixed frames over a QUIC bidirectional stream.
    Quic,
    /// Length-prefixed frames over an iroh peer-to-peer connection.
    P2p,
    /// Anything that did not parse as one of the above.
    Unknown,
}

impl TransportKind {
    /// Every concrete kind, in numeric code order.
    pub const ALL: [Self; 4] = [Self::Tcp, Self::WebSocket, Self::Quic, Self::P2p];

    /// Parse a transport name, case-insensitively.
    ///
    /// Never fails: unrecognised names map to [`TransportKind::Unknown`].
    ///
    /// ```
    /// use rsock_core::transport::TransportKind;
    ///
    /// assert_eq!(TransportKind::parse("ws"), TransportKind::WebSocket);
    /// assert_eq!(TransportKind::parse("WebSocket"), TransportKind::WebSocket);
    /// assert_eq!(TransportKind::parse("bogus"), TransportKind::Unknown);
    /// ```
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "tcp" => Self::Tcp,
            "ws" | "websocket" => Self::WebSocket,
            "quic" => Self::Quic,
            "iroh" | "iroh-p2p" | "p2p" => Self::P2p,
            _ => Self::Unknown,
        }
    }

    /// Canonical name. `parse(kind.as_str()) == kind` for every kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::WebSocket => "websocket",
            Self::Quic => "quic",
            Self::P2p => "iroh-p2p",
            Self::Unknown => "unknown",
        }
    }

    /// Numeric code used at foreign boundaries (0..=3, -1 for unknown).
    pub const fn code(self) -> i32 {
        match self {
            Self::Tcp => 0,
            Self::WebSocket => 1,
            Self::Quic => 2,
            Self::P2p => 3,
            Self::Unknown => -1,
        }
    }

    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Tcp,
            1 => Self::WebSocket,
            2 => Self::Quic,
            3 => Self::P2p,
            _ => Self::Unknown,
        }
    }

    /// Kind implied by an address scheme (`ws`, `wss`, `iroh`, `tcp`, `quic`).
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "ws" | "wss" => Some(Self::WebSocket),
            "iroh" => Some(Self::P2p),
            "tcp" => Some(Self::Tcp),
            "quic" => Some(Self::Quic),
            _ => None,
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Parse a transport name. See [`TransportKind::parse`].
pub fn parse_transport_type(name: &str) -> TransportKind {
    TransportKind::parse(name)
}

/// Canonical name of a transport kind.
pub fn transport_type_to_string(kind: TransportKind) -> &'static str {
    kind.as_str()
}

/// Split `scheme://rest` into its parts.
pub(crate) fn split_scheme(address: &str) -> Option<(&str, &str)> {
    address.split_once("://")
}

/// Optional transport tuning.
///
/// The default is the plain set: no socket tuning, strict certificate
/// verification. [`TransportFeatures::advanced`] enables the latency
/// oriented options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportFeatures {
    /// Disable Nagle's algorithm on TCP-based transports.
    pub tcp_nodelay: bool,
    /// TCP keepalive idle time, `None` leaves the OS default.
    pub tcp_keepalive: Option<Duration>,
    /// Skip TLS certificate verification (QUIC, `wss://`).
    ///
    /// Never implied by `advanced()`; it has to be asked for.
    pub accept_invalid_certs: bool,
}

impl TransportFeatures {
    #[must_use]
    pub fn basic() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn advanced() -> Self {
        Self {
            tcp_nodelay: true,
            tcp_keepalive: Some(Duration::from_secs(60)),
            accept_invalid_certs: false,
        }
    }

    /// `advanced()` when `enabled`, `basic()` otherwise.
    #[must_use]
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Self::advanced()
        } else {
            Self::basic()
        }
    }

    #[must_use]
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }
}

/// Where and how to connect.
///
/// The address is kept exactly as given; it is interpreted when the
/// connection is opened (see `Endpoint::resolve`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub address: String,
    pub features: TransportFeatures,
}

impl TransportConfig {
    /// Explicit kind and address.
    pub fn new(kind: TransportKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
            features: TransportFeatures::default(),
        }
    }

    /// Infer the kind from the address scheme, defaulting to TCP when there
    /// is no scheme.
    pub fn from_address(address: impl Into<String>) -> Self {
        let address = address.into();
        let kind = split_scheme(&address)
            .and_then(|(scheme, _)| TransportKind::from_scheme(scheme))
            .unwrap_or(TransportKind::Tcp);
        Self::new(kind, address)
    }

    pub fn tcp(address: impl Into<String>) -> Self {
        Self::new(TransportKind::Tcp, address)
    }

    pub fn websocket(url: impl Into<String>) -> Self {
        Self::new(TransportKind::WebSocket, url)
    }

    pub fn quic(address: impl Into<String>) -> Self {
        Self::new(TransportKind::Quic, address)
    }

    pub fn p2p(peer: impl Into<String>) -> Self {
        Self::new(TransportKind::P2p, peer)
    }

    #[must_use]
    pub fn with_features(mut self, features: TransportFeatures) -> Self {
        self.features = features;
        self
    }

    #[must_use]
    pub fn with_advanced_features(self, enabled: bool) -> Self {
        self.with_features(TransportFeatures::from_flag(enabled))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse_transport_type("tcp"), TransportKind::Tcp);
        assert_eq!(parse_transport_type("ws"), TransportKind::WebSocket);
        assert_eq!(parse_transport_type("websocket"), TransportKind::WebSocket);
        assert_eq!(parse_transport_type("QUIC"), TransportKind::Quic);
        assert_eq!(parse_transport_type("iroh"), TransportKind::P2p);
        assert_eq!(parse_transport_type("iroh-p2p"), TransportKind::P2p);
        assert_eq!(parse_transport_type("bogus"), TransportKind::Unknown);
        assert_eq!(parse_transport_type(""), TransportKind::Unknown);
    }

    #[test]
    fn test_name_round_trip() {
        for kind in TransportKind::ALL {
            assert_eq!(parse_transport_type(transport_type_to_string(kind)), kind);
            assert_eq!(TransportKind::from_code(kind.code()), kind);
        }
        assert_eq!(transport_type_to_string(TransportKind::Unknown), "unknown");
    }

    #[test]
    fn test_from_address_infers_kind() {
        assert_eq!(
            TransportConfig::from_address("ws://localhost:7878").kind,
            TransportKind::WebSocket
        );
        assert_eq!(
            TransportConfig::from_address("iroh://abc").kind,
            TransportKind::P2p
        );
        assert_eq!(
            TransportConfig::from_address("127.0.0.1:7878").kind,
            TransportKind::Tcp
        );
    }

    #[test]
    fn test_feature_presets() {
        assert!(!TransportFeatures::from_flag(false).tcp_nodelay);
        let advanced = TransportFeatures::from_flag(true);
        assert!(advanced.tcp_nodelay);
        assert!(!advanced.accept_invalid_certs);
    }
}
