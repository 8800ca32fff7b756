//! rsock Core
//!
//! This crate contains the transport-agnostic building blocks:
//! - Request/response bodies (`payload`)
//! - Transport kinds and connection configuration (`transport`)
//! - Address validation and resolution (`endpoint`)
//! - Client options (`options`)
//! - Throughput and error counters (`metrics`)
//! - Connection lifecycle events (`monitor`)
//! - TCP socket tuning (`tcp`)
//! - Error types (`error`)

// The tcp module needs raw fd/socket access for socket configuration
#![cfg_attr(not(test), deny(unsafe_code))]
// Allow some pedantic lints that are intentional in this crate
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
pub mod endpoint;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod options;
pub mod payload;
pub mod tcp;
pub mod transport;

pub use error::{Error, Result};

// Keep it minimal to avoid API lock-in.
pub mod prelude {
    pub use crate::endpoint::{Endpoint, EndpointError, HostPort};
    pub use crate::error::{Error, Result};
    pub use crate::metrics::{MetricsSnapshot, PerformanceMetrics};
    pub use crate::monitor::{ConnectionEvent, ConnectionMonitor};
    pub use crate::options::ClientOptions;
    pub use crate::payload::{Payload, PayloadBuilder};
    pub use crate::tcp::tune_tcp_stream;
    pub use crate::transport::{
        parse_transport_type, transport_type_to_string, TransportConfig, TransportFeatures,
        TransportKind,
    };
}
