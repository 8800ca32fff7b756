//! Request/response client.
//!
//! A `Client` owns at most one connection. Requests may be issued from any
//! number of threads; the connection's driver thread writes them and
//! resolves them as responses arrive, in whatever order the peer answers.

use crate::driver::{self, DriverHandle};
use crate::frame::{Frame, FRAME_HEADER_LEN};
use crate::pending::{Completion, PendingTable, ResponseCallback};
use crate::response::ResponseHandle;
use crate::state::{ClientState, ConnectionInfo, ConnectionState};
use crate::transport::is_transport_supported;
use futures::channel::oneshot;
use parking_lot::Mutex;
use rsock_core::endpoint::Endpoint;
use rsock_core::metrics::PerformanceMetrics;
use rsock_core::monitor::{create_monitor, ConnectionEvent, ConnectionEventSender, ConnectionMonitor};
use rsock_core::options::ClientOptions;
use rsock_core::payload::Payload;
use rsock_core::transport::TransportConfig;
use rsock_core::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// State shared between the client and its driver thread.
pub(crate) struct Shared {
    pub(crate) options: ClientOptions,
    pub(crate) metrics: Option<Arc<PerformanceMetrics>>,
    pub(crate) inner: Mutex<Inner>,
    monitors: Mutex<Vec<ConnectionEventSender>>,
}

/// Everything guarded by the client lock: lifecycle state, the pending
/// table and the driver handle change together.
pub(crate) struct Inner {
    pub(crate) state: ClientState,
    pub(crate) connection: Option<ConnectionInfo>,
    pub(crate) pending: PendingTable,
    pub(crate) driver: Option<DriverHandle>,
}

impl Inner {
    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            ClientState::Connected => Ok(()),
            ClientState::Closed => Err(Error::Disconnected),
            ClientState::Unconnected | ClientState::Connecting => Err(Error::NotConnected),
        }
    }
}

impl Shared {
    pub(crate) fn record_error(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error();
        }
    }

    pub(crate) fn emit(&self, event: ConnectionEvent) {
        self.monitors
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// `Connecting → Connected`. False if the client was closed meanwhile.
    pub(crate) fn mark_connected(&self) -> bool {
        let endpoint = {
            let mut inner = self.inner.lock();
            if inner.state != ClientState::Connecting {
                return false;
            }
            inner.state = ClientState::Connected;
            match inner.connection.as_mut() {
                Some(conn) => {
                    conn.state = ConnectionState::Connected;
                    conn.connected_at = Some(Instant::now());
                    conn.endpoint.clone()
                }
                None => return false,
            }
        };
        self.emit(ConnectionEvent::Connected(endpoint));
        true
    }

    /// `Connecting → Unconnected` after a failed attempt.
    pub(crate) fn connect_failed(&self, endpoint: &Endpoint, err: &Error) {
        {
            let mut inner = self.inner.lock();
            if inner.state == ClientState::Connecting {
                inner.state = ClientState::Unconnected;
                // The thread is on its way out; detach it.
                inner.driver = None;
            }
            if let Some(conn) = inner.connection.as_mut() {
                conn.state = ConnectionState::Failed;
            }
        }
        self.record_error();
        self.emit(ConnectionEvent::ConnectFailed {
            endpoint: endpoint.clone(),
            reason: err.to_string(),
        });
    }

    /// Move to `Closed` and resolve every pending request with
    /// `Disconnected`. Returns the driver handle for the caller to stop;
    /// `None` if the client was already closed.
    pub(crate) fn shut_down(&self, failure: Option<&Error>) -> Option<DriverHandle> {
        let (drained, endpoint, driver) = {
            let mut inner = self.inner.lock();
            if inner.state == ClientState::Closed {
                return None;
            }
            inner.state = ClientState::Closed;
            let endpoint = inner.connection.as_mut().map(|conn| {
                conn.state = if failure.is_some() {
                    ConnectionState::Failed
                } else {
                    ConnectionState::Disconnected
                };
                conn.endpoint.clone()
            });
            (inner.pending.drain(), endpoint, inner.driver.take())
        };

        if failure.is_some() {
            self.record_error();
        }
        debug!(pending = drained.len(), "[client] closed");
        for request in drained {
            request.complete(Err(Error::Disconnected));
        }
        if let Some(endpoint) = endpoint {
            self.emit(ConnectionEvent::Disconnected {
                endpoint,
                reason: failure.map(ToString::to_string),
            });
        }
        driver
    }
}

/// A reactive request/response client.
///
/// # Examples
///
/// ```rust,no_run
/// use rsock_proto::Client;
/// use rsock_core::payload::Payload;
/// use rsock_core::transport::TransportConfig;
///
/// # async fn example() -> rsock_core::Result<()> {
/// let client = Client::new();
/// client.connect(TransportConfig::tcp("127.0.0.1:7878")).await?;
///
/// let response = client
///     .request_response(Payload::with_metadata("Hello, RSocket!", "demo"))?
///     .await?;
/// println!("{:?}", response.data_utf8());
///
/// client.fire_and_forget(Payload::new("fire"))?;
/// client.close();
/// # Ok(())
/// # }
/// ```
pub struct Client {
    shared: Arc<Shared>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_options(ClientOptions::default())
    }

    pub fn with_options(options: ClientOptions) -> Self {
        let metrics = options
            .enable_metrics
            .then(|| Arc::new(PerformanceMetrics::new()));
        Self {
            shared: Arc::new(Shared {
                options,
                metrics,
                inner: Mutex::new(Inner {
                    state: ClientState::Unconnected,
                    connection: None,
                    pending: PendingTable::new(),
                    driver: None,
                }),
                monitors: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Connect to the transport described by `config`.
    ///
    /// Valid only from `Unconnected`. Resolves once the transport is up and
    /// the SETUP frame is written, bounded by `connect_timeout`.
    ///
    /// # Errors
    ///
    /// - `Config` / `UnsupportedTransport` for a bad or uncompiled config
    /// - `AlreadyConnecting` / `AlreadyConnected` / `InvalidState` for the
    ///   wrong lifecycle state
    /// - `Connect` when the transport cannot be opened
    pub async fn connect(&self, config: TransportConfig) -> Result<()> {
        let endpoint = Endpoint::resolve(&config)?;
        if !is_transport_supported(endpoint.kind()) {
            return Err(Error::UnsupportedTransport(format!(
                "{} (not compiled into this build)",
                endpoint.kind()
            )));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                ClientState::Unconnected => {}
                ClientState::Connecting => return Err(Error::AlreadyConnecting),
                ClientState::Connected => return Err(Error::AlreadyConnected),
                ClientState::Closed => {
                    return Err(Error::InvalidState("client is closed".into()))
                }
            }
            let driver = driver::spawn(
                Arc::clone(&self.shared),
                endpoint.clone(),
                config.features.clone(),
                ready_tx,
            )?;
            inner.state = ClientState::Connecting;
            inner.connection = Some(ConnectionInfo::connecting(endpoint.clone()));
            inner.driver = Some(driver);
        }
        debug!(%endpoint, "[client] connecting");
        self.shared.emit(ConnectionEvent::Connecting(endpoint.clone()));

        match ready_rx.await {
            Ok(result) => result,
            Err(oneshot::Canceled) => Err(Error::connect(&endpoint, "connection driver exited")),
        }
    }

    /// Blocking form of [`connect`](Self::connect).
    pub fn connect_blocking(&self, config: TransportConfig) -> Result<()> {
        futures::executor::block_on(self.connect(config))
    }

    /// Send a request and get a handle that resolves to the response.
    ///
    /// Returns immediately. The request is bounded by `request_timeout`
    /// when one is configured.
    pub fn request_response(&self, payload: Payload) -> Result<ResponseHandle> {
        let (tx, rx) = oneshot::channel();
        let stream_id = self.issue(
            payload,
            Completion::Future(tx),
            self.shared.options.request_timeout,
        )?;
        Ok(ResponseHandle::new(stream_id, rx))
    }

    /// Send a request and invoke `callback` exactly once with its outcome.
    ///
    /// The callback runs on the connection's driver thread (or on the
    /// thread calling `close()`), so it should hand work off rather than
    /// block. Returns the stream id. If this returns an error the callback
    /// is never invoked.
    pub fn request_response_with<F>(&self, payload: Payload, callback: F) -> Result<u32>
    where
        F: FnOnce(Result<Payload>) + Send + 'static,
    {
        let callback: ResponseCallback = Box::new(callback);
        self.issue(
            payload,
            Completion::Callback(callback),
            self.shared.options.request_timeout,
        )
    }

    /// Send a request and block until it resolves, at most
    /// `sync_request_timeout`.
    ///
    /// Rejected with `InvalidState` when called from a response callback.
    pub fn request_response_sync(&self, payload: Payload) -> Result<Payload> {
        let on_driver = self
            .shared
            .inner
            .lock()
            .driver
            .as_ref()
            .is_some_and(DriverHandle::is_driver_thread);
        if on_driver {
            return Err(Error::InvalidState(
                "blocking request issued from the connection driver thread".into(),
            ));
        }

        let (tx, rx) = oneshot::channel();
        let stream_id = self.issue(
            payload,
            Completion::Future(tx),
            Some(self.shared.options.sync_request_timeout),
        )?;
        ResponseHandle::new(stream_id, rx).wait()
    }

    /// Send a payload that expects no response.
    ///
    /// Success means the frame was queued for writing, not that the peer
    /// received it.
    pub fn fire_and_forget(&self, payload: Payload) -> Result<()> {
        let size = self.checked_size(&payload)?;
        {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            inner.ensure_connected()?;
            let driver = inner.driver.as_ref().ok_or(Error::NotConnected)?;
            let stream_id = inner.pending.allocate_id()?;
            driver.send(Frame::RequestFnf { stream_id, payload }.to_bytes())?;
            trace!(stream_id, size, "[client] fire_and_forget");
        }
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_request(size);
        }
        Ok(())
    }

    /// Size-check, register and enqueue a request. Id allocation and
    /// enqueueing happen under one lock, so ids hit the wire in order.
    fn issue(
        &self,
        payload: Payload,
        completion: Completion,
        timeout: Option<Duration>,
    ) -> Result<u32> {
        let size = self.checked_size(&payload)?;
        let stream_id = {
            let mut guard = self.shared.inner.lock();
            let inner = &mut *guard;
            inner.ensure_connected()?;
            let driver = inner.driver.as_ref().ok_or(Error::NotConnected)?;
            let stream_id = inner.pending.register(completion, timeout)?;
            let frame = Frame::RequestResponse { stream_id, payload }.to_bytes();
            if let Err(e) = driver.send(frame) {
                // Never reached the writer; hand the error back instead.
                drop(inner.pending.take(stream_id));
                return Err(e);
            }
            stream_id
        };
        trace!(stream_id, size, "[client] request_response");
        if let Some(metrics) = &self.shared.metrics {
            metrics.record_request(size);
        }
        Ok(stream_id)
    }

    fn checked_size(&self, payload: &Payload) -> Result<usize> {
        let metadata = if payload.has_metadata() {
            3 + payload.metadata_len()
        } else {
            0
        };
        let size = FRAME_HEADER_LEN + metadata + payload.data_len();
        let max = self.shared.options.max_frame_size;
        if size > max {
            return Err(Error::FrameTooLarge { size, max });
        }
        Ok(size)
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    pub fn state(&self) -> ClientState {
        self.shared.inner.lock().state
    }

    /// Snapshot of the current (or last) connection.
    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.shared.inner.lock().connection.clone()
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.shared.inner.lock().pending.len()
    }

    /// Counters, when enabled in the options.
    pub fn metrics(&self) -> Option<Arc<PerformanceMetrics>> {
        self.shared.metrics.clone()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.shared.options
    }

    /// Subscribe to connection lifecycle events.
    pub fn monitor(&self) -> ConnectionMonitor {
        let (tx, rx) = create_monitor();
        self.shared.monitors.lock().push(tx);
        rx
    }

    /// Close the client.
    ///
    /// Idempotent. Every outstanding request resolves with `Disconnected`
    /// before this returns. Queued frames get up to `linger` to reach the
    /// peer; the driver thread is then joined, unless this is called from
    /// it or it fails to exit in time.
    pub fn close(&self) {
        if let Some(driver) = self.shared.shut_down(None) {
            driver.stop();
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.close();
    }
}
