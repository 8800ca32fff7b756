//! In-process RSocket responder used by the integration tests.
//!
//! Behaviour is keyed on the request data:
//! - `silent` → never answered
//! - `close` → the peer drops the connection
//! - `error:<msg>` → ERROR frame with APPLICATION_ERROR and `<msg>`
//! - `empty` → PAYLOAD with COMPLETE but no NEXT
//! - `stray` → a PAYLOAD for a stream nobody opened, then the echo
//! - `hold*` → parked until a `flush` request arrives
//! - `flush` → parked requests answered newest first, then the flush itself
//! - `ping` → a KEEPALIVE asking for a reply, then the echo
//! - `push` → a peer-initiated REQUEST_RESPONSE and REQUEST_STREAM, then the echo
//! - `garbage` → an undecodable connection-level frame, then the echo
//! - `truncated` → a PAYLOAD whose metadata length overruns the frame
//! - `mute` → nothing is answered on this connection from now on
//! - `goodbye` → a connection-level ERROR; the socket stays open
//! - anything else → echoed back, metadata included

#![allow(dead_code)]

use bytes::{BufMut, Bytes, BytesMut};
use rsock_core::payload::Payload;
use rsock_proto::codec::{put_length_prefixed, LengthDecoder};
use rsock_proto::frame::{error_code, frame_type, Frame, Setup};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

pub const STRAY_STREAM_ID: u32 = 999_999;
/// Server-initiated streams are even.
pub const PUSHED_REQUEST_ID: u32 = 2;
pub const PUSHED_STREAM_ID: u32 = 4;
pub const PING_DATA: &str = "peer-ping";

#[derive(Debug, Clone)]
pub enum PeerEvent {
    Setup(Setup),
    Request(u32),
    FireAndForget(Payload),
    Cancel(u32),
    Keepalive { respond: bool, data: Bytes },
    /// An ERROR frame from the client.
    Error { stream_id: u32, code: u32 },
}

/// Per-connection responder state.
#[derive(Default)]
pub struct Responder {
    held: Vec<(u32, Payload)>,
    muted: bool,
}

impl Responder {
    /// Encoded frames to send back for `frame`, or `None` to drop the
    /// connection.
    pub fn respond(&mut self, frame: Frame, events: &flume::Sender<PeerEvent>) -> Option<Vec<Bytes>> {
        let replies = self.replies(frame, events)?;
        if self.muted {
            return Some(vec![]);
        }
        Some(replies)
    }

    fn replies(&mut self, frame: Frame, events: &flume::Sender<PeerEvent>) -> Option<Vec<Bytes>> {
        let replies = match frame {
            Frame::Setup(setup) => {
                let _ = events.send(PeerEvent::Setup(setup));
                vec![]
            }
            Frame::Keepalive { respond, data, .. } => {
                let _ = events.send(PeerEvent::Keepalive {
                    respond,
                    data: data.clone(),
                });
                if respond {
                    vec![Frame::keepalive(false, data).to_bytes()]
                } else {
                    vec![]
                }
            }
            Frame::Error {
                stream_id, code, ..
            } => {
                let _ = events.send(PeerEvent::Error { stream_id, code });
                vec![]
            }
            Frame::RequestFnf { payload, .. } => {
                let _ = events.send(PeerEvent::FireAndForget(payload));
                vec![]
            }
            Frame::Cancel { stream_id } => {
                let _ = events.send(PeerEvent::Cancel(stream_id));
                vec![]
            }
            Frame::RequestResponse { stream_id, payload } => {
                let _ = events.send(PeerEvent::Request(stream_id));
                let text = payload.data_utf8().unwrap_or_default().to_owned();
                match text.as_str() {
                    "silent" => vec![],
                    "close" => return None,
                    "empty" => vec![Frame::Payload {
                        stream_id,
                        payload: Payload::default(),
                        next: false,
                        complete: true,
                    }
                    .to_bytes()],
                    "stray" => vec![
                        echo(STRAY_STREAM_ID, Payload::new("stray")),
                        echo(stream_id, payload),
                    ],
                    "ping" => vec![
                        Frame::keepalive(true, Bytes::from_static(PING_DATA.as_bytes())).to_bytes(),
                        echo(stream_id, payload),
                    ],
                    "push" => vec![
                        Frame::RequestResponse {
                            stream_id: PUSHED_REQUEST_ID,
                            payload: Payload::new("from peer"),
                        }
                        .to_bytes(),
                        raw_frame(PUSHED_STREAM_ID, frame_type::REQUEST_STREAM, 0, &[0, 0, 0, 1]),
                        echo(stream_id, payload),
                    ],
                    // KEEPALIVE with RESPOND but no last-position field.
                    "garbage" => vec![
                        raw_frame(0, frame_type::KEEPALIVE, 0x080, &[]),
                        echo(stream_id, payload),
                    ],
                    // METADATA|COMPLETE|NEXT, metadata length 16, one byte present.
                    "truncated" => vec![raw_frame(
                        stream_id,
                        frame_type::PAYLOAD,
                        0x160,
                        &[0, 0, 16, b'x'],
                    )],
                    "mute" => {
                        self.muted = true;
                        vec![]
                    }
                    "goodbye" => vec![Frame::Error {
                        stream_id: 0,
                        code: error_code::CONNECTION_ERROR,
                        message: "going away".to_owned(),
                    }
                    .to_bytes()],
                    "flush" => {
                        let mut out: Vec<Bytes> = self
                            .held
                            .drain(..)
                            .rev()
                            .map(|(id, p)| echo(id, p))
                            .collect();
                        out.push(echo(stream_id, payload));
                        out
                    }
                    t if t.starts_with("hold") => {
                        self.held.push((stream_id, payload));
                        vec![]
                    }
                    t => match t.strip_prefix("error:") {
                        Some(message) => vec![Frame::Error {
                            stream_id,
                            code: error_code::APPLICATION_ERROR,
                            message: message.to_owned(),
                        }
                        .to_bytes()],
                        None => vec![echo(stream_id, payload)],
                    },
                }
            }
            _ => vec![],
        };
        Some(replies)
    }
}

fn echo(stream_id: u32, payload: Payload) -> Bytes {
    Frame::Payload {
        stream_id,
        payload,
        next: true,
        complete: true,
    }
    .to_bytes()
}

/// A frame body built by hand, for frames `Frame` cannot express.
pub fn raw_frame(stream_id: u32, ty: u8, flags: u16, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(6 + body.len());
    buf.put_u32(stream_id);
    buf.put_u16((u16::from(ty) << 10) | flags);
    buf.extend_from_slice(body);
    buf.freeze()
}

/// A TCP responder accepting any number of connections.
pub struct TcpPeer {
    pub addr: SocketAddr,
    pub events: flume::Receiver<PeerEvent>,
}

impl TcpPeer {
    pub fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = flume::unbounded();

        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                let events = tx.clone();
                thread::spawn(move || serve_tcp(stream, &events));
            }
        });

        Self { addr, events: rx }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Wait for the first event matching `pred`, skipping the rest.
    pub fn expect(&self, pred: impl Fn(&PeerEvent) -> bool) -> PeerEvent {
        expect_event(&self.events, pred)
    }
}

pub fn expect_event(
    events: &flume::Receiver<PeerEvent>,
    pred: impl Fn(&PeerEvent) -> bool,
) -> PeerEvent {
    loop {
        let event = events
            .recv_timeout(Duration::from_secs(5))
            .expect("peer event not seen within 5s");
        if pred(&event) {
            return event;
        }
    }
}

fn serve_tcp(mut stream: TcpStream, events: &flume::Sender<PeerEvent>) {
    let mut decoder = LengthDecoder::default();
    let mut responder = Responder::default();
    let mut buf = [0u8; 4096];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        decoder.extend(&buf[..n]);

        while let Some(body) = decoder.decode().unwrap() {
            let frame = Frame::decode(body).expect("client sent a malformed frame");
            let Some(replies) = responder.respond(frame, events) else {
                return;
            };
            let mut out = Vec::new();
            for reply in &replies {
                put_length_prefixed(reply, &mut out).unwrap();
            }
            if !out.is_empty() && stream.write_all(&out).is_err() {
                return;
            }
        }
    }
}

/// Accepts TCP connections and never reads from them, so the client's
/// writes back up once the socket buffers fill.
pub fn spawn_black_hole() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming() {
            let Ok(stream) = stream else { return };
            held.push(stream);
        }
    });
    addr
}

/// Poll `cond` until it holds or `within` elapses.
pub fn wait_until(within: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = std::time::Instant::now() + within;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
