//! Per-connection I/O runtime selection.
//!
//! TCP runs on compio. WebSocket, QUIC and iroh are built on tokio I/O
//! types and run on a current-thread tokio runtime. Either way the runtime
//! lives on the connection's own driver thread, and the driver logic only
//! sees `sleep` and `timeout`.

use futures::future::{select, Either, LocalBoxFuture};
use rsock_core::transport::TransportKind;
use std::future::Future;
use std::io;
use std::pin::pin;
use std::time::Duration;

/// Which runtime hosts a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IoRuntime {
    Compio,
    #[cfg(feature = "tokio-transports")]
    Tokio,
}

impl IoRuntime {
    pub(crate) fn for_kind(kind: TransportKind) -> Self {
        match kind {
            #[cfg(feature = "tokio-transports")]
            TransportKind::WebSocket | TransportKind::Quic | TransportKind::P2p => Self::Tokio,
            _ => Self::Compio,
        }
    }

    /// Build a runtime of this flavor for the current thread.
    pub(crate) fn build(self) -> io::Result<Executor> {
        match self {
            Self::Compio => Ok(Executor::Compio(compio::runtime::Runtime::new()?)),
            #[cfg(feature = "tokio-transports")]
            Self::Tokio => Ok(Executor::Tokio(
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()?,
            )),
        }
    }

    /// Sleep on this runtime's timer. Must be polled inside the runtime.
    pub(crate) fn sleep(self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        match self {
            Self::Compio => Box::pin(compio::time::sleep(duration)),
            #[cfg(feature = "tokio-transports")]
            Self::Tokio => Box::pin(tokio::time::sleep(duration)),
        }
    }

    /// Run `fut` for at most `duration`; `None` when the time ran out.
    pub(crate) async fn timeout<F: Future>(self, duration: Duration, fut: F) -> Option<F::Output> {
        match select(pin!(fut), self.sleep(duration)).await {
            Either::Left((output, _)) => Some(output),
            Either::Right(((), _)) => None,
        }
    }
}

/// An owned runtime, ready to drive one connection.
pub(crate) enum Executor {
    Compio(compio::runtime::Runtime),
    #[cfg(feature = "tokio-transports")]
    Tokio(tokio::runtime::Runtime),
}

impl Executor {
    pub(crate) fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match self {
            Self::Compio(rt) => rt.block_on(fut),
            #[cfg(feature = "tokio-transports")]
            Self::Tokio(rt) => rt.block_on(fut),
        }
    }
}
