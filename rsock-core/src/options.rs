//! Client configuration options
//!
//! Timeouts, keepalive negotiation and buffer sizing for a client and the
//! connection it owns.

use crate::payload::Payload;
use std::time::Duration;

/// Largest frame a 24-bit length prefix can describe.
pub const MAX_FRAME_SIZE: usize = 0xFF_FFFF;

/// MIME type announced in the setup frame when none is configured.
pub const DEFAULT_MIME_TYPE: &str = "application/binary";

const MIN_READ_BUFFER_SIZE: usize = 64;

/// Client configuration options.
///
/// # Examples
///
/// ```
/// use rsock_core::options::ClientOptions;
/// use std::time::Duration;
///
/// let opts = ClientOptions::default()
///     .with_request_timeout(Duration::from_secs(5))
///     .with_keepalive(Duration::from_secs(10), Duration::from_secs(45));
/// assert_eq!(opts.request_timeout, Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Upper bound for transport connect plus setup write.
    ///
    /// - Default: 10 seconds
    pub connect_timeout: Duration,

    /// Deadline applied to every asynchronous request.
    ///
    /// - `None`: wait until the response or the connection ends (default)
    /// - `Some(duration)`: resolve with `Timeout` after `duration`
    pub request_timeout: Option<Duration>,

    /// Deadline for the blocking `request_response_sync` form.
    ///
    /// - Default: 30 seconds
    pub sync_request_timeout: Duration,

    /// Interval between outbound KEEPALIVE frames, announced in SETUP.
    ///
    /// - Default: 20 seconds
    pub keepalive_interval: Duration,

    /// Silence after which the peer is considered gone, announced in SETUP.
    ///
    /// - Default: 90 seconds
    pub max_lifetime: Duration,

    /// Granularity of the timeout sweep.
    ///
    /// - Default: 20ms
    pub timer_resolution: Duration,

    /// How long `close()` waits for the transport to shut down cleanly.
    ///
    /// - Default: 1 second
    pub linger: Duration,

    pub metadata_mime_type: String,
    pub data_mime_type: String,

    /// Payload carried by the SETUP frame.
    pub setup_payload: Option<Payload>,

    /// Read buffer size (bytes) for stream transports.
    ///
    /// - Default: 8192 (8KB)
    pub read_buffer_size: usize,

    /// Largest frame accepted from or sent to the peer.
    ///
    /// Clamped to [`MAX_FRAME_SIZE`].
    pub max_frame_size: usize,

    /// Keep throughput and error counters (default: on).
    pub enable_metrics: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            sync_request_timeout: Duration::from_secs(30),
            keepalive_interval: Duration::from_secs(20),
            max_lifetime: Duration::from_secs(90),
            timer_resolution: Duration::from_millis(20),
            linger: Duration::from_secs(1),
            metadata_mime_type: DEFAULT_MIME_TYPE.to_string(),
            data_mime_type: DEFAULT_MIME_TYPE.to_string(),
            setup_payload: None,
            read_buffer_size: 8192,
            max_frame_size: MAX_FRAME_SIZE,
            enable_metrics: true,
        }
    }
}

impl ClientOptions {
    /// Create new client options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the deadline for asynchronous requests.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_sync_request_timeout(mut self, timeout: Duration) -> Self {
        self.sync_request_timeout = timeout;
        self
    }

    /// Set keepalive interval and max lifetime.
    pub fn with_keepalive(mut self, interval: Duration, max_lifetime: Duration) -> Self {
        self.keepalive_interval = interval;
        self.max_lifetime = max_lifetime;
        self
    }

    pub fn with_timer_resolution(mut self, resolution: Duration) -> Self {
        self.timer_resolution = resolution;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Set metadata and data MIME types.
    pub fn with_mime_types(mut self, metadata: impl Into<String>, data: impl Into<String>) -> Self {
        self.metadata_mime_type = metadata.into();
        self.data_mime_type = data.into();
        self
    }

    pub fn with_setup_payload(mut self, payload: Payload) -> Self {
        self.setup_payload = Some(payload);
        self
    }

    /// Size of each transport read. Floored at 64 bytes.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(MIN_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size.min(MAX_FRAME_SIZE);
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Interval at which the driver wakes up for housekeeping.
    pub fn housekeeping_tick(&self) -> Duration {
        self.timer_resolution
            .min(self.keepalive_interval)
            .max(Duration::from_millis(1))
    }
}
