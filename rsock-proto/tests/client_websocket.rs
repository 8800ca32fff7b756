//! Client against an in-process WebSocket responder.
#![cfg(feature = "websocket")]

mod common;

use common::{expect_event, PeerEvent, Responder};
use futures::{SinkExt, StreamExt};
use rsock_core::prelude::*;
use rsock_proto::frame::Frame;
use rsock_proto::{Client, ConnectionState};
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

/// Serve RSocket-over-WebSocket on a background tokio runtime.
fn spawn_ws_peer() -> (SocketAddr, flume::Receiver<PeerEvent>) {
    let (events_tx, events_rx) = flume::unbounded();
    let (addr_tx, addr_rx) = std::sync::mpsc::channel();

    thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            addr_tx.send(listener.local_addr().unwrap()).unwrap();

            while let Ok((stream, _)) = listener.accept().await {
                let events = events_tx.clone();
                tokio::spawn(async move {
                    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                    let mut responder = Responder::default();
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Binary(body) = msg else { continue };
                        let frame = Frame::decode(body).expect("client sent a malformed frame");
                        let Some(replies) = responder.respond(frame, &events) else {
                            return;
                        };
                        for reply in replies {
                            if ws.send(Message::Binary(reply)).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
    });

    (addr_rx.recv().unwrap(), events_rx)
}

#[test]
fn test_websocket_request_response() {
    let (addr, events) = spawn_ws_peer();
    let client = Client::new();
    client
        .connect_blocking(TransportConfig::websocket(format!("ws://{addr}/")))
        .unwrap();
    assert_eq!(
        client.connection().map(|c| c.kind()),
        Some(TransportKind::WebSocket)
    );
    expect_event(&events, |e| matches!(e, PeerEvent::Setup(_)));

    let response = client
        .request_response_sync(Payload::with_metadata("over ws", "m"))
        .unwrap();
    assert_eq!(response.data_utf8(), Some("over ws"));
    assert_eq!(response.metadata_utf8(), Some("m"));

    client.fire_and_forget(Payload::new("ws fnf")).unwrap();
    expect_event(&events, |e| {
        matches!(e, PeerEvent::FireAndForget(p) if p.data_utf8() == Some("ws fnf"))
    });
}

#[test]
fn test_websocket_scheme_inferred() {
    let (addr, _events) = spawn_ws_peer();
    let config = TransportConfig::from_address(format!("ws://{addr}"));
    assert_eq!(config.kind, TransportKind::WebSocket);

    let client = Client::new();
    client.connect_blocking(config).unwrap();
    let err = client
        .request_response_sync(Payload::new("error:denied"))
        .unwrap_err();
    assert!(matches!(err, Error::Application { ref message, .. } if message == "denied"));
}

#[test]
fn test_websocket_peer_hangup() {
    let (addr, _events) = spawn_ws_peer();
    let client = Client::with_options(
        ClientOptions::new().with_request_timeout(Duration::from_secs(5)),
    );
    client
        .connect_blocking(TransportConfig::websocket(format!("ws://{addr}")))
        .unwrap();

    let err = client.request_response_sync(Payload::new("close")).unwrap_err();
    assert!(matches!(err, Error::Disconnected));
    assert!(common::wait_until(Duration::from_secs(1), || {
        client.connection().map(|c| c.state) == Some(ConnectionState::Failed)
    }));
}
