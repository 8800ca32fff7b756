//! Public API surface, end to end over TCP.

use bytes::BytesMut;
use rsock::frame::{encode_length_prefixed, Frame, LengthDecoder};
use rsock::prelude::*;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

/// Minimal echo responder: answers every REQUEST_RESPONSE with its payload.
fn spawn_echo() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut decoder = LengthDecoder::default();
        let mut buf = [0u8; 4096];
        loop {
            let n = match stream.read(&mut buf) {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            decoder.extend(&buf[..n]);
            while let Some(body) = decoder.decode().unwrap() {
                if let Frame::RequestResponse { stream_id, payload } = Frame::decode(body).unwrap()
                {
                    let mut out = BytesMut::new();
                    let reply = Frame::Payload {
                        stream_id,
                        payload,
                        next: true,
                        complete: true,
                    };
                    encode_length_prefixed(&reply, &mut out).unwrap();
                    stream.write_all(&out).unwrap();
                }
            }
        }
    });

    addr
}

#[test]
fn test_quick_start_flow() {
    rsock::dev_tracing::init_tracing();
    let addr = spawn_echo();

    let client = Client::new();
    let monitor = client.monitor();
    client
        .connect_blocking(TransportConfig::from_address(addr))
        .unwrap();
    assert!(client.is_connected());
    assert!(matches!(
        monitor.recv_timeout(Duration::from_secs(5)).unwrap(),
        ConnectionEvent::Connecting(_)
    ));
    assert!(matches!(
        monitor.recv_timeout(Duration::from_secs(5)).unwrap(),
        ConnectionEvent::Connected(_)
    ));

    let payload = Payload::with_metadata("Hello, RSocket!", "demo");
    assert_eq!(payload.data_len(), 15);
    assert_eq!(payload.metadata_len(), 4);
    let response = client.request_response_sync(payload.clone()).unwrap();
    assert_eq!(response, payload);

    let (tx, rx) = flume::bounded(1);
    client
        .request_response_with(Payload::new("cb"), move |result| {
            let _ = tx.send(result.map(|p| p.data_utf8().map(str::to_owned)));
        })
        .unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap(),
        Some("cb".to_owned())
    );

    let snapshot = client.metrics().unwrap().snapshot();
    assert_eq!(snapshot.requests, 2);
    assert_eq!(snapshot.responses, 2);

    client.close();
    assert_eq!(client.state(), ClientState::Closed);
    assert!(matches!(
        monitor.recv_timeout(Duration::from_secs(5)).unwrap(),
        ConnectionEvent::Disconnected { reason: None, .. }
    ));
}

#[test]
fn test_future_on_foreign_executor() {
    let addr = spawn_echo();
    let client = Client::new();
    futures::executor::block_on(async {
        client.connect(TransportConfig::tcp(addr)).await.unwrap();
        let response = client
            .request_response(Payload::new("async"))
            .unwrap()
            .await
            .unwrap();
        assert_eq!(response.data_utf8(), Some("async"));
    });
}

#[test]
fn test_connect_to_closed_port() {
    let port = portpicker::pick_unused_port().expect("no free port");
    let client = Client::new();
    let err = client
        .connect_blocking(TransportConfig::tcp(format!("localhost:{port}")))
        .unwrap_err();
    assert!(err.is_connection_error(), "{err}");
    assert!(!client.is_connected());
}

#[test]
fn test_transport_helpers() {
    assert_eq!(parse_transport_type("websocket"), TransportKind::WebSocket);
    assert_eq!(parse_transport_type("bogus"), TransportKind::Unknown);
    assert_eq!(transport_type_to_string(TransportKind::Tcp), "tcp");
    assert!(is_transport_supported(TransportKind::Tcp));
    assert!(!is_transport_supported(TransportKind::Unknown));

    let supported = supported_transports();
    assert!(supported.split(',').all(|name| {
        is_transport_supported(parse_transport_type(name))
    }));
    assert_eq!(
        supported.contains("websocket"),
        cfg!(feature = "websocket")
    );
}
