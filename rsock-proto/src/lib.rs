//! # rsock Proto
//!
//! RSocket request/response client over pluggable transports.
//!
//! ## Overview
//!
//! - **Framing**: RSocket frame codec (`frame`) and 24-bit length prefixing
//!   for stream transports (`codec`)
//! - **Transports**: TCP on compio; WebSocket, QUIC and iroh P2P on a
//!   current-thread tokio runtime, each behind a feature flag
//! - **Client**: lifecycle state machine, pending-request table with
//!   strictly increasing stream ids, timeouts and keepalive
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rsock_proto::Client;
//! use rsock_core::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let client = Client::new();
//!     client.connect_blocking(TransportConfig::tcp("127.0.0.1:7878"))?;
//!
//!     let response = client.request_response_sync(Payload::new("ping"))?;
//!     println!("{:?}", response.data_utf8());
//!     Ok(())
//! }
//! ```
//!
//! ## Threading
//!
//! Each connection is driven by its own thread. Client methods take `&self`
//! and may be called from any thread; response callbacks run on the
//! driver thread.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

// Internal modules (not part of public API)
mod driver;
mod pending;
mod runtime;

// Public protocol types
pub mod client;
pub mod codec;
pub mod frame;
pub mod response;
pub mod state;
pub mod transport;

pub use client::Client;
pub use pending::ResponseCallback;
pub use response::ResponseHandle;
pub use state::{ClientState, ConnectionInfo, ConnectionState};
pub use transport::{is_transport_supported, supported_transports};

pub mod prelude {
    pub use crate::client::Client;
    pub use crate::response::ResponseHandle;
    pub use crate::state::{ClientState, ConnectionInfo, ConnectionState};
    pub use crate::transport::{is_transport_supported, supported_transports};
    pub use rsock_core::prelude::*;
}
