//! # rsock
//!
//! A multi-transport RSocket request/response client.
//!
//! ## Architecture
//!
//! rsock is split into layers:
//!
//! - **`rsock-core`**: payloads, errors, transport configuration, options,
//!   metrics and connection events
//! - **`rsock-proto`**: RSocket framing, transports and the client engine
//! - **`rsock`**: Public API surface (this crate)
//!
//! ## Transports (opt-in via features)
//!
//! TCP is always available. The others are gated behind feature flags so
//! unused network stacks are never compiled:
//!
//! - **`websocket`** (default) - RSocket over WebSocket binary messages
//! - **`quic`** - RSocket over a QUIC bidirectional stream
//! - **`p2p`** - RSocket over an iroh peer-to-peer connection
//!
//! ```toml
//! [dependencies]
//! rsock = { version = "0.1", features = ["quic"] }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rsock::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let client = Client::new();
//! client.connect(TransportConfig::from_address("127.0.0.1:7878")).await?;
//!
//! // Asynchronous: a future resolving to the response
//! let response = client
//!     .request_response(Payload::with_metadata("Hello, RSocket!", "demo"))?
//!     .await?;
//! println!("{:?}", response.data_utf8());
//!
//! // Callback: invoked exactly once on the connection's driver thread
//! client.request_response_with(Payload::new("ping"), |result| {
//!     println!("{result:?}");
//! })?;
//!
//! // No response expected
//! client.fire_and_forget(Payload::new("audit"))?;
//!
//! if let Some(metrics) = client.metrics() {
//!     println!("{}", metrics.snapshot());
//! }
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Transport helpers
//!
//! ```rust
//! use rsock::prelude::*;
//!
//! assert_eq!(parse_transport_type("ws"), TransportKind::WebSocket);
//! assert_eq!(transport_type_to_string(TransportKind::P2p), "iroh-p2p");
//! assert!(is_transport_supported(TransportKind::Tcp));
//! assert!(supported_transports().starts_with("tcp"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Tracing setup for tests and demos.
pub mod dev_tracing;

// Re-export core types
pub use bytes::Bytes;
pub use rsock_core::endpoint::{Endpoint, EndpointError, HostPort};
pub use rsock_core::error::{Error, Result};
pub use rsock_core::metrics::{MetricsSnapshot, PerformanceMetrics};
pub use rsock_core::monitor::{ConnectionEvent, ConnectionMonitor};
pub use rsock_core::options::{ClientOptions, DEFAULT_MIME_TYPE, MAX_FRAME_SIZE};
pub use rsock_core::payload::{Payload, PayloadBuilder};
pub use rsock_core::transport::{
    parse_transport_type, transport_type_to_string, TransportConfig, TransportFeatures,
    TransportKind,
};
pub use rsock_proto::{
    is_transport_supported, supported_transports, Client, ClientState, ConnectionInfo,
    ConnectionState, ResponseCallback, ResponseHandle,
};

/// Wire-level frame model and codec, for tooling and test peers.
pub mod frame {
    pub use rsock_proto::codec::{encode_length_prefixed, LengthDecoder};
    pub use rsock_proto::frame::{error_code, Frame, FrameError, Setup};
}

/// Everything needed to build a client and issue requests.
pub mod prelude {
    pub use crate::{
        is_transport_supported, parse_transport_type, supported_transports,
        transport_type_to_string, Client, ClientOptions, ClientState, ConnectionEvent, Error,
        Payload, ResponseHandle, Result, TransportConfig, TransportFeatures, TransportKind,
    };
}
