//! TCP transport on compio.

use super::{FrameSink, FrameSource, FramedConnection};
use crate::codec::{put_length_prefixed, LengthDecoder};
use async_trait::async_trait;
use bytes::Bytes;
use compio::buf::BufResult;
use compio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use compio::net::{OwnedReadHalf, OwnedWriteHalf, TcpStream};
use rsock_core::endpoint::HostPort;
use rsock_core::options::ClientOptions;
use rsock_core::tcp::tune_tcp_stream;
use rsock_core::transport::TransportFeatures;
use rsock_core::{Error, Result};
use tracing::{debug, trace};

pub(super) async fn connect(
    addr: &HostPort,
    features: &TransportFeatures,
    options: &ClientOptions,
) -> Result<FramedConnection> {
    debug!(address = %addr, "[tcp] connecting");
    let stream = TcpStream::connect(addr.as_str())
        .await
        .map_err(|e| Error::connect(addr, e))?;
    tune_tcp_stream(&stream, features)?;
    debug!(address = %addr, "[tcp] connected");

    let (reader, writer) = stream.into_split();
    Ok(FramedConnection {
        sink: Box::new(TcpFrameSink {
            writer,
            write_buf: Vec::with_capacity(options.read_buffer_size),
        }),
        source: Box::new(TcpFrameSource {
            reader,
            decoder: LengthDecoder::new(options.max_frame_size),
            read_buf: Vec::with_capacity(options.read_buffer_size.max(64)),
        }),
    })
}

struct TcpFrameSource {
    reader: OwnedReadHalf<TcpStream>,
    decoder: LengthDecoder,
    read_buf: Vec<u8>,
}

#[async_trait(?Send)]
impl FrameSource for TcpFrameSource {
    async fn recv_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.decoder.decode()? {
                return Ok(Some(frame));
            }

            // compio takes the buffer by value; an empty Vec is filled from
            // index 0 up to its capacity.
            let mut buf = std::mem::take(&mut self.read_buf);
            buf.clear();
            let BufResult(res, buf) = self.reader.read(buf).await;
            self.read_buf = buf;
            let n = res.map_err(Error::recv)?;

            if n == 0 {
                if self.decoder.buffered() > 0 {
                    return Err(Error::recv("connection closed mid-frame"));
                }
                return Ok(None);
            }
            trace!(bytes = n, "[tcp] read");
            self.decoder.extend(&self.read_buf[..n]);
        }
    }
}

struct TcpFrameSink {
    writer: OwnedWriteHalf<TcpStream>,
    write_buf: Vec<u8>,
}

impl TcpFrameSink {
    async fn flush(&mut self) -> Result<()> {
        let buf = std::mem::take(&mut self.write_buf);
        let BufResult(res, mut buf) = self.writer.write_all(buf).await;
        buf.clear();
        self.write_buf = buf;
        res.map_err(Error::send)
    }
}

#[async_trait(?Send)]
impl FrameSink for TcpFrameSink {
    async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
        put_length_prefixed(&frame, &mut self.write_buf)?;
        self.flush().await
    }

    async fn send_batch(&mut self, frames: Vec<Bytes>) -> Result<()> {
        for frame in &frames {
            put_length_prefixed(frame, &mut self.write_buf)?;
        }
        trace!(frames = frames.len(), bytes = self.write_buf.len(), "[tcp] write");
        self.flush().await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await.map_err(Error::send)
    }
}
