//! Connection driver.
//!
//! Every connection gets a dedicated thread running the runtime its
//! transport needs. On that thread three loops run concurrently and the
//! connection ends when the first one exits:
//!
//! - receive: decode inbound frames and resolve pending requests
//! - writer: drain the command queue, batching whatever is ready
//! - housekeeping: request timeouts, keepalive, peer liveness
//!
//! `close()` raises a separate abort signal instead of queueing behind
//! pending writes, so a peer that stops reading cannot wedge shutdown.

use crate::client::Shared;
use crate::frame::{error_code, Frame, Setup, FRAME_HEADER_LEN, MAX_STREAM_ID};
use crate::runtime::IoRuntime;
use crate::transport::{self, FrameSink, FrameSource, FramedConnection};
use bytes::Bytes;
use futures::channel::oneshot;
use futures::future::{select, select_all, Either, FutureExt};
use rsock_core::endpoint::Endpoint;
use rsock_core::payload::Payload;
use rsock_core::transport::TransportFeatures;
use rsock_core::{Error, Result};
use std::cell::Cell;
use std::pin::pin;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Frames written per batch before the writer yields.
const MAX_BATCH: usize = 64;

/// Slack on top of `linger` for the driver thread to notice the abort and
/// tear its runtime down.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Owner-side handle to a driver thread.
pub(crate) struct DriverHandle {
    commands: flume::Sender<Bytes>,
    abort: flume::Sender<()>,
    /// Disconnects once the driver thread has finished, runtime included.
    exited: flume::Receiver<()>,
    stop_timeout: Duration,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl DriverHandle {
    /// Queue an encoded frame for the writer.
    pub(crate) fn send(&self, frame: Bytes) -> Result<()> {
        self.commands.send(frame).map_err(|_| Error::Disconnected)
    }

    pub(crate) fn is_driver_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Abort the driver and wait for its thread, unless called from that
    /// very thread. A driver that has not exited within `linger` plus a
    /// grace period is detached rather than joined.
    pub(crate) fn stop(mut self) {
        let _ = self.abort.try_send(());
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            return;
        }
        match self.exited.recv_timeout(self.stop_timeout) {
            Err(flume::RecvTimeoutError::Disconnected) => {
                if thread.join().is_err() {
                    warn!("[driver] thread panicked");
                }
            }
            Ok(()) | Err(flume::RecvTimeoutError::Timeout) => {
                warn!(timeout = ?self.stop_timeout, "[driver] did not stop in time, detaching");
            }
        }
    }
}

/// Spawn the driver for `endpoint`. The outcome of the connect attempt is
/// reported on `ready`.
pub(crate) fn spawn(
    shared: Arc<Shared>,
    endpoint: Endpoint,
    features: TransportFeatures,
    ready: oneshot::Sender<Result<()>>,
) -> Result<DriverHandle> {
    let (tx, rx) = flume::unbounded();
    let commands = tx.clone();
    let (abort, abort_rx) = flume::bounded(1);
    let (exited_tx, exited) = flume::bounded::<()>(0);
    let stop_timeout = shared.options.linger + STOP_GRACE;
    let runtime = IoRuntime::for_kind(endpoint.kind());

    let thread = thread::Builder::new()
        .name(format!("rsock-{}", endpoint.kind()))
        .spawn(move || {
            match runtime.build() {
                Ok(executor) => executor.block_on(run(
                    shared, endpoint, features, runtime, commands, rx, abort_rx, ready,
                )),
                Err(e) => {
                    let err = Error::connect(&endpoint, format!("runtime: {e}"));
                    shared.connect_failed(&endpoint, &err);
                    let _ = ready.send(Err(err));
                }
            }
            // The runtime is gone by now.
            drop(exited_tx);
        })?;

    Ok(DriverHandle {
        commands: tx,
        abort,
        exited,
        stop_timeout,
        thread_id: thread.thread().id(),
        thread: Some(thread),
    })
}

async fn run(
    shared: Arc<Shared>,
    endpoint: Endpoint,
    features: TransportFeatures,
    runtime: IoRuntime,
    commands: flume::Sender<Bytes>,
    rx: flume::Receiver<Bytes>,
    abort: flume::Receiver<()>,
    ready: oneshot::Sender<Result<()>>,
) {
    let opts = &shared.options;

    // Connect and write SETUP, unless close() gets there first.
    let connecting = async {
        let setup = Frame::Setup(Setup::from_options(opts));
        setup.check_size(opts.max_frame_size)?;
        let mut conn = runtime
            .timeout(opts.connect_timeout, transport::connect(&endpoint, &features, opts))
            .await
            .ok_or_else(|| {
                Error::connect(
                    &endpoint,
                    format!("timed out after {:?}", opts.connect_timeout),
                )
            })??;
        conn.sink
            .send_frame(setup.to_bytes())
            .await
            .map_err(|e| Error::connect(&endpoint, e))?;
        Ok::<_, Error>(conn)
    };
    let mut conn = match select(pin!(connecting), pin!(abort.recv_async())).await {
        Either::Left((Ok(conn), _)) => conn,
        Either::Left((Err(err), _)) => {
            debug!(%endpoint, error = %err, "[driver] connect failed");
            shared.connect_failed(&endpoint, &err);
            let _ = ready.send(Err(err));
            return;
        }
        Either::Right(_) => {
            debug!(%endpoint, "[driver] closed while connecting");
            let _ = ready.send(Err(Error::Disconnected));
            return;
        }
    };

    if !shared.mark_connected() {
        let _ = ready.send(Err(Error::Disconnected));
        let _ = runtime.timeout(opts.linger, conn.sink.close()).await;
        return;
    }
    debug!(%endpoint, "[driver] connected");
    let _ = ready.send(Ok(()));

    let loops = Loops {
        shared: &shared,
        commands: &commands,
        runtime,
        last_seen: Cell::new(Instant::now()),
        writing: Cell::new(false),
    };
    match loops.run(&mut conn, &rx, &abort).await {
        Exit::Closed => debug!(%endpoint, "[driver] closed"),
        Exit::Failed(err) => {
            warn!(%endpoint, error = %err, "[driver] connection failed");
            // Our own handle, if close() has not taken it: just detach.
            drop(shared.shut_down(Some(&err)));
        }
    }
}

enum Exit {
    /// `close()` was called, or the handle went away.
    Closed,
    /// Transport error, peer went away, or protocol-level failure.
    Failed(Error),
}

struct Loops<'a> {
    shared: &'a Shared,
    commands: &'a flume::Sender<Bytes>,
    runtime: IoRuntime,
    last_seen: Cell<Instant>,
    /// Set while a batch is in flight; an aborted write may have left a
    /// partial frame on the wire.
    writing: Cell<bool>,
}

impl Loops<'_> {
    async fn run(
        &self,
        conn: &mut FramedConnection,
        rx: &flume::Receiver<Bytes>,
        abort: &flume::Receiver<()>,
    ) -> Exit {
        let exit = {
            let loops = vec![
                self.read_loop(&mut *conn.source).boxed_local(),
                self.write_loop(&mut *conn.sink, rx).boxed_local(),
                self.housekeeping().boxed_local(),
            ];
            match select(select_all(loops), pin!(abort.recv_async())).await {
                Either::Left(((exit, _, _), _)) => exit,
                // Dropping the handle aborts as well.
                Either::Right(_) => Exit::Closed,
            }
        };
        if let Exit::Closed = exit {
            self.shutdown(&mut *conn.sink, rx).await;
        }
        exit
    }

    /// Flush whatever is still queued and close the transport, all within
    /// `linger`.
    async fn shutdown(&self, sink: &mut dyn FrameSink, rx: &flume::Receiver<Bytes>) {
        let linger = self.shared.options.linger;
        let queued: Vec<Bytes> = rx.drain().collect();
        let torn = self.writing.get();
        let flush = async {
            if !torn && !queued.is_empty() {
                sink.send_batch(queued).await?;
            }
            sink.close().await
        };
        match self.runtime.timeout(linger, flush).await {
            Some(Err(e)) => debug!(error = %e, "[driver] transport close failed"),
            None => debug!(?linger, "[driver] transport close timed out"),
            Some(Ok(())) => {}
        }
    }

    async fn read_loop(&self, source: &mut dyn FrameSource) -> Exit {
        loop {
            let body = match source.recv_frame().await {
                Ok(Some(body)) => body,
                Ok(None) => return Exit::Failed(Error::recv("connection closed by peer")),
                Err(e) => return Exit::Failed(e),
            };
            self.last_seen.set(Instant::now());

            let len = body.len();
            let stream_id = (len >= FRAME_HEADER_LEN)
                .then(|| u32::from_be_bytes([body[0], body[1], body[2], body[3]]) & MAX_STREAM_ID);
            match Frame::decode(body) {
                Ok(frame) => {
                    if let Some(exit) = self.dispatch(frame, len) {
                        return exit;
                    }
                }
                Err(e) => {
                    warn!(?stream_id, error = %e, "[driver] dropping malformed frame");
                    // Fail the request the frame was meant for, if any;
                    // either way the error is counted once.
                    match stream_id {
                        Some(id) if id != 0 => {
                            self.resolve(id, Err(Error::protocol(format!("malformed frame: {e}"))), len)
                        }
                        _ => self.shared.record_error(),
                    }
                }
            }
        }
    }

    fn dispatch(&self, frame: Frame, len: usize) -> Option<Exit> {
        match frame {
            Frame::Payload {
                stream_id,
                payload,
                next,
                ..
            } => {
                let result = if next {
                    Ok(payload)
                } else {
                    Err(Error::protocol("response completed without a payload"))
                };
                self.resolve(stream_id, result, len);
            }
            Frame::Error {
                stream_id: 0,
                code,
                message,
            } => {
                return Some(Exit::Failed(Error::recv(format!(
                    "peer closed connection ({code:#010x}): {message}"
                ))));
            }
            Frame::Error {
                stream_id,
                code,
                message,
            } => self.resolve(stream_id, Err(Error::Application { code, message }), len),
            Frame::Keepalive {
                respond: true,
                data,
                ..
            } => {
                trace!("[driver] answering keepalive");
                self.send(&Frame::keepalive(false, data));
            }
            Frame::RequestResponse { stream_id, .. } | Frame::UnsupportedRequest { stream_id, .. } => {
                debug!(stream_id, "[driver] rejecting peer-initiated request");
                self.send(&Frame::Error {
                    stream_id,
                    code: error_code::REJECTED,
                    message: "no responder".into(),
                });
            }
            Frame::Setup(_) => {
                warn!("[driver] unexpected SETUP from peer");
                self.shared.record_error();
            }
            Frame::Keepalive { .. }
            | Frame::RequestFnf { .. }
            | Frame::Cancel { .. }
            | Frame::Ignored { .. } => {
                trace!(frame_type = frame.frame_type(), "[driver] skipping frame");
            }
        }
        None
    }

    fn resolve(&self, stream_id: u32, result: Result<Payload>, len: usize) {
        let pending = self.shared.inner.lock().pending.take(stream_id);
        match pending {
            Some(request) => {
                match (&result, &self.shared.metrics) {
                    (Ok(_), Some(metrics)) => metrics.record_response(len),
                    (Err(_), _) => self.shared.record_error(),
                    (Ok(_), None) => {}
                }
                trace!(stream_id, ok = result.is_ok(), "[driver] request resolved");
                request.complete(result);
            }
            None => {
                debug!(stream_id, "[driver] discarding frame for unknown stream");
                self.shared.record_error();
            }
        }
    }

    async fn write_loop(&self, sink: &mut dyn FrameSink, rx: &flume::Receiver<Bytes>) -> Exit {
        loop {
            // `commands` is held by `self`, so the queue never disconnects.
            let Ok(first) = rx.recv_async().await else {
                return Exit::Closed;
            };
            let mut batch = vec![first];
            while batch.len() < MAX_BATCH {
                match rx.try_recv() {
                    Ok(frame) => batch.push(frame),
                    Err(_) => break,
                }
            }

            self.writing.set(true);
            let sent = sink.send_batch(batch).await;
            self.writing.set(false);
            if let Err(e) = sent {
                return Exit::Failed(e);
            }
        }
    }

    async fn housekeeping(&self) -> Exit {
        let opts = &self.shared.options;
        let tick = opts.housekeeping_tick();
        let mut next_keepalive = Instant::now() + opts.keepalive_interval;

        loop {
            self.runtime.sleep(tick).await;
            let now = Instant::now();
            self.expire(now);

            if now >= next_keepalive {
                trace!("[driver] sending keepalive");
                self.send(&Frame::keepalive(true, Bytes::new()));
                next_keepalive = now + opts.keepalive_interval;
            }

            let silent = now.saturating_duration_since(self.last_seen.get());
            if silent > opts.max_lifetime {
                return Exit::Failed(Error::recv(format!(
                    "nothing received from peer for {silent:?}"
                )));
            }
        }
    }

    fn expire(&self, now: Instant) {
        let expired = self.shared.inner.lock().pending.expire(now);
        for (stream_id, request) in expired {
            let waited = request.age(now);
            debug!(stream_id, ?waited, "[driver] request timed out");
            self.shared.record_error();
            self.send(&Frame::Cancel { stream_id });
            request.complete(Err(Error::Timeout(waited)));
        }
    }

    fn send(&self, frame: &Frame) {
        // Only fails once the writer is gone, and then the connection is
        // ending anyway.
        let _ = self.commands.send(frame.to_bytes());
    }
}
