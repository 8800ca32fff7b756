//! Endpoint resolution.
//!
//! Turns a [`TransportConfig`] into a validated [`Endpoint`]. An explicit
//! scheme in the address is authoritative: a configured kind that disagrees
//! with it is rejected rather than guessed around.

use crate::error::Error;
use crate::transport::{split_scheme, TransportConfig, TransportKind};
use std::fmt;

/// A `host:port` pair, keeping the address text it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostPort {
    host: String,
    port: u16,
    raw: String,
}

impl HostPort {
    /// Parse `host:port`, `[v6]:port` included.
    pub fn parse(s: &str) -> Result<Self, EndpointError> {
        let invalid = || EndpointError::InvalidHostPort(s.to_string());
        let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() || host.contains('/') {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self {
            host: host.to_string(),
            port,
            raw: s.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// The address text as given, suitable for name resolution.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// TCP: `host:port`
    Tcp(HostPort),
    /// WebSocket: the full `ws://` or `wss://` URL
    WebSocket(String),
    /// QUIC: `host:port`
    Quic(HostPort),
    /// iroh peer: the node id, without the `iroh://` prefix
    P2p(String),
}

impl Endpoint {
    /// Validate `config` and produce the endpoint to dial.
    ///
    /// # Examples
    ///
    /// ```
    /// use rsock_core::endpoint::Endpoint;
    /// use rsock_core::transport::{TransportConfig, TransportKind};
    ///
    /// let ep = Endpoint::resolve(&TransportConfig::tcp("127.0.0.1:7878")).unwrap();
    /// assert_eq!(ep.kind(), TransportKind::Tcp);
    ///
    /// // Scheme and kind disagree
    /// assert!(Endpoint::resolve(&TransportConfig::tcp("ws://127.0.0.1:7878")).is_err());
    /// ```
    pub fn resolve(config: &TransportConfig) -> Result<Self, EndpointError> {
        let address = config.address.trim();
        if config.kind == TransportKind::Unknown {
            return Err(EndpointError::Unsupported(config.kind));
        }
        if address.is_empty() {
            return Err(EndpointError::EmptyAddress);
        }

        let Some((scheme, rest)) = split_scheme(address) else {
            return match config.kind {
                TransportKind::Tcp => Ok(Self::Tcp(HostPort::parse(address)?)),
                TransportKind::Quic => Ok(Self::Quic(HostPort::parse(address)?)),
                TransportKind::P2p => Ok(Self::P2p(address.to_string())),
                kind => Err(EndpointError::MissingScheme(kind)),
            };
        };

        let scheme_kind = TransportKind::from_scheme(scheme)
            .ok_or_else(|| EndpointError::UnknownScheme(scheme.to_string()))?;
        if scheme_kind != config.kind {
            return Err(EndpointError::SchemeMismatch {
                scheme: scheme.to_string(),
                kind: config.kind,
            });
        }

        match scheme_kind {
            TransportKind::WebSocket => {
                if rest.is_empty() || rest.starts_with('/') {
                    return Err(EndpointError::InvalidUrl(address.to_string()));
                }
                Ok(Self::WebSocket(address.to_string()))
            }
            TransportKind::P2p => {
                if rest.is_empty() {
                    return Err(EndpointError::EmptyAddress);
                }
                Ok(Self::P2p(rest.to_string()))
            }
            TransportKind::Tcp => Ok(Self::Tcp(HostPort::parse(rest)?)),
            TransportKind::Quic => Ok(Self::Quic(HostPort::parse(rest)?)),
            TransportKind::Unknown => Err(EndpointError::Unsupported(scheme_kind)),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Tcp(_) => TransportKind::Tcp,
            Self::WebSocket(_) => TransportKind::WebSocket,
            Self::Quic(_) => TransportKind::Quic,
            Self::P2p(_) => TransportKind::P2p,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::WebSocket(url) => f.write_str(url),
            Self::Quic(addr) => write!(f, "quic://{addr}"),
            Self::P2p(node) => write!(f, "iroh://{node}"),
        }
    }
}

/// Errors that can occur when resolving endpoints.
#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Empty address")]
    EmptyAddress,

    #[error("Unknown scheme: {0}:// (expected ws://, wss://, iroh://, tcp:// or quic://)")]
    UnknownScheme(String),

    #[error("Address scheme {scheme}:// conflicts with configured transport {kind}")]
    SchemeMismatch { scheme: String, kind: TransportKind },

    #[error("{0} transport requires an explicit scheme in the address")]
    MissingScheme(TransportKind),

    #[error("Invalid host:port address: {0}")]
    InvalidHostPort(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported transport: {0}")]
    Unsupported(TransportKind),
}

impl From<EndpointError> for Error {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Unsupported(kind) => Self::UnsupportedTransport(kind.to_string()),
            other => Self::Config(other.to_string()),
        }
    }
}
