//! TCP socket tuning.
//!
//! # Safety
//!
//! This module borrows the raw file descriptor/socket of a compio
//! `TcpStream` to apply socket options through `socket2`. The borrowed
//! `Socket` is never dropped, so the descriptor stays owned by the stream.

#![allow(unsafe_code)]

use crate::transport::TransportFeatures;
use std::io;
use std::mem::ManuallyDrop;
use tracing::trace;

/// Apply the TCP-level options requested in `features`.
///
/// A no-op when neither `tcp_nodelay` nor `tcp_keepalive` is set.
///
/// # Errors
///
/// Returns an error if a socket option cannot be set.
pub fn tune_tcp_stream(
    stream: &compio::net::TcpStream,
    features: &TransportFeatures,
) -> io::Result<()> {
    if !features.tcp_nodelay && features.tcp_keepalive.is_none() {
        return Ok(());
    }
    with_socket(stream, |sock| {
        if features.tcp_nodelay {
            sock.set_nodelay(true)?;
        }
        if let Some(idle) = features.tcp_keepalive {
            let keepalive = socket2::TcpKeepalive::new().with_time(idle);
            sock.set_tcp_keepalive(&keepalive)?;
        }
        trace!(
            nodelay = features.tcp_nodelay,
            keepalive = ?features.tcp_keepalive,
            "[tcp] socket tuned"
        );
        Ok(())
    })
}

#[cfg(unix)]
fn with_socket<T>(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    use std::os::unix::io::{AsRawFd, FromRawFd};
    let fd = stream.as_raw_fd();
    let sock = ManuallyDrop::new(unsafe { socket2::Socket::from_raw_fd(fd) });
    f(&sock)
}

#[cfg(windows)]
fn with_socket<T>(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    use std::os::windows::io::{AsRawSocket, FromRawSocket};
    let raw = stream.as_raw_socket();
    let sock = ManuallyDrop::new(unsafe { socket2::Socket::from_raw_socket(raw) });
    f(&sock)
}

#[cfg(not(any(unix, windows)))]
fn with_socket<T: Default>(
    _stream: &compio::net::TcpStream,
    _f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    Ok(T::default())
}
