//! Handle for an outstanding request/response exchange.

use futures::channel::oneshot;
use rsock_core::payload::Payload;
use rsock_core::{Error, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Resolves to the response payload, or to the error that ended the request.
///
/// Await it from any executor, or call [`wait`](Self::wait) to block.
/// Dropping the handle does not cancel the request; the response is
/// discarded when it arrives.
#[must_use = "dropping the handle discards the response"]
#[derive(Debug)]
pub struct ResponseHandle {
    stream_id: u32,
    rx: oneshot::Receiver<Result<Payload>>,
}

impl ResponseHandle {
    pub(crate) fn new(stream_id: u32, rx: oneshot::Receiver<Result<Payload>>) -> Self {
        Self { stream_id, rx }
    }

    /// Stream id the request was sent on.
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    /// Block the current thread until the request resolves.
    ///
    /// Do not call this from a response callback: callbacks run on the
    /// connection's driver thread, which is the thread that would have to
    /// deliver the response.
    pub fn wait(self) -> Result<Payload> {
        futures::executor::block_on(self)
    }

    /// The outcome, if it has already arrived.
    pub fn try_take(&mut self) -> Option<Result<Payload>> {
        match self.rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(Error::Disconnected)),
        }
    }
}

impl Future for ResponseHandle {
    type Output = Result<Payload>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // Completion dropped without resolving: the connection is gone.
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::Disconnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}
