//! Transports.
//!
//! A connected transport is split into the half the writer owns
//! ([`FrameSink`]) and the half the receive loop owns ([`FrameSource`]).
//! Both move whole encoded frames; length prefixing or message boundaries
//! are each transport's concern.

mod tcp;

#[cfg(any(feature = "quic", feature = "p2p"))]
mod stream;

#[cfg(feature = "websocket")]
mod websocket;

#[cfg(feature = "quic")]
mod quic;

#[cfg(feature = "p2p")]
mod p2p;

use async_trait::async_trait;
use bytes::Bytes;
use rsock_core::endpoint::Endpoint;
use rsock_core::options::ClientOptions;
use rsock_core::transport::{TransportFeatures, TransportKind};
use rsock_core::{Error, Result};

/// ALPN protocol id for QUIC and iroh connections.
pub const ALPN: &[u8] = b"rsocket";

/// Write side of a connected transport.
#[async_trait(?Send)]
pub trait FrameSink {
    /// Write one encoded frame.
    async fn send_frame(&mut self, frame: Bytes) -> Result<()>;

    /// Write several frames, in order. Stream transports coalesce them
    /// into a single write.
    async fn send_batch(&mut self, frames: Vec<Bytes>) -> Result<()> {
        for frame in frames {
            self.send_frame(frame).await?;
        }
        Ok(())
    }

    /// Flush and shut the transport down.
    async fn close(&mut self) -> Result<()>;
}

/// Read side of a connected transport.
#[async_trait(?Send)]
pub trait FrameSource {
    /// Next encoded frame, `None` once the peer has closed cleanly.
    async fn recv_frame(&mut self) -> Result<Option<Bytes>>;
}

/// A connected transport, ready for the driver.
pub struct FramedConnection {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
}

/// Open a transport to `endpoint`.
///
/// Must run on the runtime `IoRuntime::for_kind(endpoint.kind())` selects.
pub async fn connect(
    endpoint: &Endpoint,
    features: &TransportFeatures,
    options: &ClientOptions,
) -> Result<FramedConnection> {
    match endpoint {
        Endpoint::Tcp(addr) => tcp::connect(addr, features, options).await,
        #[cfg(feature = "websocket")]
        Endpoint::WebSocket(url) => websocket::connect(url, features, options).await,
        #[cfg(feature = "quic")]
        Endpoint::Quic(addr) => quic::connect(addr, features, options).await,
        #[cfg(feature = "p2p")]
        Endpoint::P2p(node) => p2p::connect(node, features, options).await,
        #[allow(unreachable_patterns)]
        other => Err(Error::UnsupportedTransport(other.kind().to_string())),
    }
}

/// Whether `kind` is compiled into this build.
pub fn is_transport_supported(kind: TransportKind) -> bool {
    match kind {
        TransportKind::Tcp => true,
        TransportKind::WebSocket => cfg!(feature = "websocket"),
        TransportKind::Quic => cfg!(feature = "quic"),
        TransportKind::P2p => cfg!(feature = "p2p"),
        TransportKind::Unknown => false,
    }
}

/// Comma-separated names of every compiled-in transport, e.g. `tcp,websocket`.
pub fn supported_transports() -> String {
    TransportKind::ALL
        .into_iter()
        .filter(|kind| is_transport_supported(*kind))
        .map(TransportKind::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
