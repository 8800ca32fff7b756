//! WebSocket transport on tokio-tungstenite.
//!
//! Each frame travels as exactly one binary message, with no length prefix.

use super::{FrameSink, FrameSource, FramedConnection};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use rsock_core::options::ClientOptions;
use rsock_core::transport::TransportFeatures;
use rsock_core::{Error, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(super) async fn connect(
    url: &str,
    features: &TransportFeatures,
    options: &ClientOptions,
) -> Result<FramedConnection> {
    debug!(url, "[ws] connecting");
    if features.accept_invalid_certs {
        warn!("[ws] accept_invalid_certs is not applied to wss:// connections");
    }
    let (ws, response) = connect_async_with_config(url, None, features.tcp_nodelay)
        .await
        .map_err(|e| Error::connect(url, e))?;
    debug!(url, status = %response.status(), "[ws] connected");

    let (sink, stream) = ws.split();
    Ok(FramedConnection {
        sink: Box::new(WsFrameSink { sink }),
        source: Box::new(WsFrameSource {
            stream,
            max_frame_size: options.max_frame_size,
        }),
    })
}

struct WsFrameSource {
    stream: SplitStream<Ws>,
    max_frame_size: usize,
}

#[async_trait(?Send)]
impl FrameSource for WsFrameSource {
    async fn recv_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    if data.len() > self.max_frame_size {
                        return Err(Error::FrameTooLarge {
                            size: data.len(),
                            max: self.max_frame_size,
                        });
                    }
                    return Ok(Some(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "[ws] close received");
                    return Ok(None);
                }
                // Pings are answered by tungstenite itself.
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    trace!("[ws] control message");
                }
                Some(Ok(Message::Text(_))) => {
                    return Err(Error::protocol("text message on a binary frame stream"));
                }
                Some(Err(e)) => return Err(Error::recv(e)),
                None => return Ok(None),
            }
        }
    }
}

struct WsFrameSink {
    sink: SplitSink<Ws, Message>,
}

#[async_trait(?Send)]
impl FrameSink for WsFrameSink {
    async fn send_frame(&mut self, frame: Bytes) -> Result<()> {
        self.sink
            .send(Message::Binary(frame))
            .await
            .map_err(Error::send)
    }

    async fn send_batch(&mut self, frames: Vec<Bytes>) -> Result<()> {
        for frame in frames {
            self.sink
                .feed(Message::Binary(frame))
                .await
                .map_err(Error::send)?;
        }
        self.sink.flush().await.map_err(Error::send)
    }

    async fn close(&mut self) -> Result<()> {
        self.sink.close().await.map_err(Error::send)
    }
}
