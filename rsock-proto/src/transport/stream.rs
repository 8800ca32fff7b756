//! Length-prefixed framing over a tokio byte stream pair.
//!
//! Shared by the QUIC and iroh transports, which both hand out one
//! bidirectional stream per connection.

use super::{FrameSink, FrameSource, FramedConnection};
use crate::codec::{put_length_prefixed, LengthDecoder};
use async_trait::async_trait;
use bytes::Bytes;
use rsock_core::options::ClientOptions;
use rsock_core::{Error, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wrap a send/recv stream pair. `on_close` runs once after the send side
/// is shut down and is where the owning connection gets closed.
pub(super) fn framed<W, R>(
    writer: W,
    reader: R,
    options: &ClientOptions,
    on_close: impl FnOnce() + 'static,
) -> FramedConnection
where
    W: AsyncWrite + Unpin + 'static,
    R: AsyncRead + Unpin + 'static,
{
    FramedConnection {
        sink: Box::new(StreamSink {
            writer,
            write_buf: Vec::new(),
            on_close: Some(Box::new(on_close)),
        }),
        source: Box::new(StreamSource {
            reader,
            decoder: LengthDecoder::new(options.max_frame_size),
            read_buf: vec![0; options.read_buffer_size.max(64)],
        }),
    }
}

struct StreamSource<R> {
    reader: R,
    decoder: LengthDecoder,
    read_buf: Vec<u8>,
}

#[async_trait(?Send)]
impl<R: AsyncRead + Unpin> FrameSource for StreamSource<R> {
    async fn recv_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(Some(frame));
            }
            let n = self
                .reader
                .read(&mut self.read_buf)
                .await
                .map_err(Error::recv)?;
            if n == 0 {
                if self.decoder.buffered() > 0 {
                    return Err(Error::recv("stream finished mid-frame"));
                }
                return Ok(None);
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

struct StreamSink<W> {
    writer: W,
    write_buf: Vec<u8>,
    on_close: Option<Box<dyn FnOnce()>>,
}

#[async_trait(?Send)]
impl<W: AsyncWrite + Unpin> FrameSink for StreamSink<W> {
    async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
        self.send_batch(vec![frame]).await
    }

    async fn send_batch(&mut self, frames: Vec<Bytes>) -> Result<()> {
        self.write_buf.clear();
        for frame in &frames {
            put_length_prefixed(frame, &mut self.write_buf)?;
        }
        self.writer
            .write_all(&self.write_buf)
            .await
            .map_err(Error::send)?;
        self.writer.flush().await.map_err(Error::send)
    }

    async fn close(&mut self) -> Result<()> {
        let result = self.writer.shutdown().await.map_err(Error::send);
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
        result
    }
}
