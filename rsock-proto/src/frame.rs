//! RSocket frame model (sans-IO).
//!
//! Every frame starts with a 6-byte header:
//!
//! ```text
//! 0               4               6
//! +---------------+-------+-------+----
//! |R| stream id   | type  | flags | body...
//! +---------------+-------+-------+----
//!   31 bits         6 bits  10 bits
//! ```
//!
//! Bodies that carry a payload put optional metadata first, prefixed with a
//! 24-bit length when the METADATA flag is set; the data runs to the end of
//! the frame. Length prefixing of whole frames is the transport's business
//! (see `codec`).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rsock_core::options::{ClientOptions, MAX_FRAME_SIZE};
use rsock_core::payload::Payload;
use rsock_core::Error;
use std::time::Duration;

pub const FRAME_HEADER_LEN: usize = 6;

/// Stream ids are 31 bits; the top bit of the header word is reserved.
pub const MAX_STREAM_ID: u32 = 0x7FFF_FFFF;

pub const MAJOR_VERSION: u16 = 1;
pub const MINOR_VERSION: u16 = 0;

const METADATA_LEN_BYTES: usize = 3;

/// Frame type codes (upper 6 bits of the type/flags word).
pub mod frame_type {
    pub const SETUP: u8 = 0x01;
    pub const LEASE: u8 = 0x02;
    pub const KEEPALIVE: u8 = 0x03;
    pub const REQUEST_RESPONSE: u8 = 0x04;
    pub const REQUEST_FNF: u8 = 0x05;
    pub const REQUEST_STREAM: u8 = 0x06;
    pub const REQUEST_CHANNEL: u8 = 0x07;
    pub const REQUEST_N: u8 = 0x08;
    pub const CANCEL: u8 = 0x09;
    pub const PAYLOAD: u8 = 0x0A;
    pub const ERROR: u8 = 0x0B;
    pub const METADATA_PUSH: u8 = 0x0C;
    pub const RESUME: u8 = 0x0D;
    pub const RESUME_OK: u8 = 0x0E;
    pub const EXT: u8 = 0x3F;
}

/// Flag bits (lower 10 bits of the type/flags word).
pub mod flags {
    pub const IGNORE: u16 = 0x200;
    pub const METADATA: u16 = 0x100;
    pub const FOLLOWS: u16 = 0x080;
    pub const COMPLETE: u16 = 0x040;
    pub const NEXT: u16 = 0x020;
    /// KEEPALIVE: peer must answer
    pub const RESPOND: u16 = 0x080;
    /// SETUP: resume token present
    pub const RESUME_ENABLE: u16 = 0x080;
    /// SETUP: lease requested
    pub const LEASE: u16 = 0x040;
}

/// ERROR frame codes.
pub mod error_code {
    pub const INVALID_SETUP: u32 = 0x0000_0001;
    pub const UNSUPPORTED_SETUP: u32 = 0x0000_0002;
    pub const REJECTED_SETUP: u32 = 0x0000_0003;
    pub const REJECTED_RESUME: u32 = 0x0000_0004;
    pub const CONNECTION_ERROR: u32 = 0x0000_0101;
    pub const CONNECTION_CLOSE: u32 = 0x0000_0102;
    pub const APPLICATION_ERROR: u32 = 0x0000_0201;
    pub const REJECTED: u32 = 0x0000_0202;
    pub const CANCELED: u32 = 0x0000_0203;
    pub const INVALID: u32 = 0x0000_0204;
}

/// Frame decoding errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Truncated frame: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("Frame type {frame_type:#04x} not allowed on stream {stream_id}")]
    InvalidStreamId { frame_type: u8, stream_id: u32 },

    #[error("Unknown frame type {0:#04x}")]
    UnknownFrameType(u8),

    #[error("PAYLOAD frame without NEXT or COMPLETE")]
    EmptyPayloadFrame,

    #[error("Frame too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::TooLarge { size, max } => Self::FrameTooLarge { size, max },
            other => Self::Protocol(other.to_string()),
        }
    }
}

/// Connection setup parameters, sent once as the first frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setup {
    pub major_version: u16,
    pub minor_version: u16,
    pub keepalive_interval: Duration,
    pub max_lifetime: Duration,
    pub metadata_mime_type: String,
    pub data_mime_type: String,
    pub payload: Payload,
}

impl Setup {
    pub fn from_options(opts: &ClientOptions) -> Self {
        Self {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            keepalive_interval: opts.keepalive_interval,
            max_lifetime: opts.max_lifetime,
            metadata_mime_type: opts.metadata_mime_type.clone(),
            data_mime_type: opts.data_mime_type.clone(),
            payload: opts.setup_payload.clone().unwrap_or_default(),
        }
    }
}

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Setup(Setup),
    Keepalive {
        respond: bool,
        last_position: u64,
        data: Bytes,
    },
    RequestResponse {
        stream_id: u32,
        payload: Payload,
    },
    RequestFnf {
        stream_id: u32,
        payload: Payload,
    },
    Payload {
        stream_id: u32,
        payload: Payload,
        next: bool,
        complete: bool,
    },
    Cancel {
        stream_id: u32,
    },
    Error {
        stream_id: u32,
        code: u32,
        message: String,
    },
    /// A request this client has no responder for (stream, channel).
    UnsupportedRequest {
        stream_id: u32,
        frame_type: u8,
    },
    /// Frames the client skips: LEASE, REQUEST_N, METADATA_PUSH, resume
    /// frames and unknown types carrying the IGNORE flag.
    Ignored {
        stream_id: u32,
        frame_type: u8,
    },
}

impl Frame {
    pub fn keepalive(respond: bool, data: Bytes) -> Self {
        Self::Keepalive {
            respond,
            last_position: 0,
            data,
        }
    }

    pub fn stream_id(&self) -> u32 {
        match self {
            Self::Setup(_) | Self::Keepalive { .. } => 0,
            Self::RequestResponse { stream_id, .. }
            | Self::RequestFnf { stream_id, .. }
            | Self::Payload { stream_id, .. }
            | Self::Cancel { stream_id }
            | Self::Error { stream_id, .. }
            | Self::UnsupportedRequest { stream_id, .. }
            | Self::Ignored { stream_id, .. } => *stream_id,
        }
    }

    pub fn frame_type(&self) -> u8 {
        match self {
            Self::Setup(_) => frame_type::SETUP,
            Self::Keepalive { .. } => frame_type::KEEPALIVE,
            Self::RequestResponse { .. } => frame_type::REQUEST_RESPONSE,
            Self::RequestFnf { .. } => frame_type::REQUEST_FNF,
            Self::Payload { .. } => frame_type::PAYLOAD,
            Self::Cancel { .. } => frame_type::CANCEL,
            Self::Error { .. } => frame_type::ERROR,
            Self::UnsupportedRequest { frame_type, .. } | Self::Ignored { frame_type, .. } => {
                *frame_type
            }
        }
    }

    fn flags(&self) -> u16 {
        match self {
            Self::Setup(setup) => metadata_flag(&setup.payload),
            Self::Keepalive { respond, .. } => {
                if *respond {
                    flags::RESPOND
                } else {
                    0
                }
            }
            Self::RequestResponse { payload, .. } | Self::RequestFnf { payload, .. } => {
                metadata_flag(payload)
            }
            Self::Payload {
                payload,
                next,
                complete,
                ..
            } => {
                let mut f = metadata_flag(payload);
                if *next {
                    f |= flags::NEXT;
                }
                if *complete {
                    f |= flags::COMPLETE;
                }
                f
            }
            _ => 0,
        }
    }

    /// Encoded size in bytes, header included, length prefix excluded.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_LEN
            + match self {
                Self::Setup(setup) => {
                    12 + 2
                        + setup.metadata_mime_type.len()
                        + setup.data_mime_type.len()
                        + payload_len(&setup.payload)
                }
                Self::Keepalive { data, .. } => 8 + data.len(),
                Self::RequestResponse { payload, .. }
                | Self::RequestFnf { payload, .. }
                | Self::Payload { payload, .. } => payload_len(payload),
                Self::Error { message, .. } => 4 + message.len(),
                Self::Cancel { .. }
                | Self::UnsupportedRequest { .. }
                | Self::Ignored { .. } => 0,
            }
    }

    /// Fail with `TooLarge` if the frame would not fit in `max` bytes.
    pub fn check_size(&self, max: usize) -> Result<usize, FrameError> {
        let size = self.encoded_len();
        let max = max.min(MAX_FRAME_SIZE);
        if size > max {
            return Err(FrameError::TooLarge { size, max });
        }
        Ok(size)
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        dst.put_u32(self.stream_id() & MAX_STREAM_ID);
        dst.put_u16((u16::from(self.frame_type()) << 10) | self.flags());

        match self {
            Self::Setup(setup) => {
                dst.put_u16(setup.major_version);
                dst.put_u16(setup.minor_version);
                dst.put_u32(duration_millis_u32(setup.keepalive_interval));
                dst.put_u32(duration_millis_u32(setup.max_lifetime));
                put_mime(dst, &setup.metadata_mime_type);
                put_mime(dst, &setup.data_mime_type);
                put_payload(dst, &setup.payload);
            }
            Self::Keepalive {
                last_position,
                data,
                ..
            } => {
                dst.put_u64(*last_position);
                dst.extend_from_slice(data);
            }
            Self::RequestResponse { payload, .. }
            | Self::RequestFnf { payload, .. }
            | Self::Payload { payload, .. } => put_payload(dst, payload),
            Self::Error { code, message, .. } => {
                dst.put_u32(*code);
                dst.extend_from_slice(message.as_bytes());
            }
            Self::Cancel { .. } | Self::UnsupportedRequest { .. } | Self::Ignored { .. } => {}
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one complete frame (no length prefix).
    ///
    /// The payload buffers are zero-copy slices of `src`.
    pub fn decode(mut src: Bytes) -> Result<Self, FrameError> {
        need(&src, FRAME_HEADER_LEN)?;
        let stream_id = src.get_u32() & MAX_STREAM_ID;
        let word = src.get_u16();
        let ty = (word >> 10) as u8;
        let fl = word & 0x03FF;

        let connection_level = |frame: Self| {
            if stream_id == 0 {
                Ok(frame)
            } else {
                Err(FrameError::InvalidStreamId {
                    frame_type: ty,
                    stream_id,
                })
            }
        };
        let stream_level = |stream_id: u32| {
            if stream_id == 0 {
                Err(FrameError::InvalidStreamId {
                    frame_type: ty,
                    stream_id,
                })
            } else {
                Ok(stream_id)
            }
        };

        match ty {
            frame_type::SETUP => {
                let setup = decode_setup(fl, &mut src)?;
                connection_level(Self::Setup(setup))
            }
            frame_type::KEEPALIVE => {
                need(&src, 8)?;
                let last_position = src.get_u64();
                connection_level(Self::Keepalive {
                    respond: fl & flags::RESPOND != 0,
                    last_position,
                    data: src,
                })
            }
            frame_type::REQUEST_RESPONSE => Ok(Self::RequestResponse {
                stream_id: stream_level(stream_id)?,
                payload: decode_payload(fl, src)?,
            }),
            frame_type::REQUEST_FNF => Ok(Self::RequestFnf {
                stream_id: stream_level(stream_id)?,
                payload: decode_payload(fl, src)?,
            }),
            frame_type::PAYLOAD => {
                let next = fl & flags::NEXT != 0;
                let complete = fl & flags::COMPLETE != 0;
                if !next && !complete {
                    return Err(FrameError::EmptyPayloadFrame);
                }
                Ok(Self::Payload {
                    stream_id: stream_level(stream_id)?,
                    payload: decode_payload(fl, src)?,
                    next,
                    complete,
                })
            }
            frame_type::CANCEL => Ok(Self::Cancel {
                stream_id: stream_level(stream_id)?,
            }),
            frame_type::ERROR => {
                need(&src, 4)?;
                let code = src.get_u32();
                Ok(Self::Error {
                    stream_id,
                    code,
                    message: String::from_utf8_lossy(&src).into_owned(),
                })
            }
            frame_type::REQUEST_STREAM | frame_type::REQUEST_CHANNEL => {
                Ok(Self::UnsupportedRequest {
                    stream_id: stream_level(stream_id)?,
                    frame_type: ty,
                })
            }
            frame_type::LEASE
            | frame_type::REQUEST_N
            | frame_type::METADATA_PUSH
            | frame_type::RESUME
            | frame_type::RESUME_OK
            | frame_type::EXT => Ok(Self::Ignored {
                stream_id,
                frame_type: ty,
            }),
            _ if fl & flags::IGNORE != 0 => Ok(Self::Ignored {
                stream_id,
                frame_type: ty,
            }),
            _ => Err(FrameError::UnknownFrameType(ty)),
        }
    }
}

fn need(src: &Bytes, needed: usize) -> Result<(), FrameError> {
    if src.len() < needed {
        return Err(FrameError::Truncated {
            needed,
            available: src.len(),
        });
    }
    Ok(())
}

fn metadata_flag(payload: &Payload) -> u16 {
    if payload.has_metadata() {
        flags::METADATA
    } else {
        0
    }
}

fn payload_len(payload: &Payload) -> usize {
    let metadata = if payload.has_metadata() {
        METADATA_LEN_BYTES + payload.metadata_len()
    } else {
        0
    };
    metadata + payload.data_len()
}

fn put_payload(dst: &mut BytesMut, payload: &Payload) {
    if let Some(metadata) = payload.metadata() {
        dst.put_uint(metadata.len() as u64, METADATA_LEN_BYTES);
        dst.extend_from_slice(metadata);
    }
    dst.extend_from_slice(payload.data());
}

fn decode_payload(fl: u16, mut src: Bytes) -> Result<Payload, FrameError> {
    if fl & flags::METADATA == 0 {
        return Ok(Payload::new(src));
    }
    need(&src, METADATA_LEN_BYTES)?;
    let len = src.get_uint(METADATA_LEN_BYTES) as usize;
    need(&src, len)?;
    let metadata = src.split_to(len);
    Ok(Payload::with_metadata(src, metadata))
}

fn put_mime(dst: &mut BytesMut, mime: &str) {
    // Length is a single byte on the wire.
    let bytes = &mime.as_bytes()[..mime.len().min(usize::from(u8::MAX))];
    dst.put_u8(bytes.len() as u8);
    dst.extend_from_slice(bytes);
}

fn get_mime(src: &mut Bytes) -> Result<String, FrameError> {
    need(src, 1)?;
    let len = usize::from(src.get_u8());
    need(src, len)?;
    Ok(String::from_utf8_lossy(&src.split_to(len)).into_owned())
}

fn decode_setup(fl: u16, src: &mut Bytes) -> Result<Setup, FrameError> {
    need(src, 12)?;
    let major_version = src.get_u16();
    let minor_version = src.get_u16();
    let keepalive_interval = Duration::from_millis(u64::from(src.get_u32()));
    let max_lifetime = Duration::from_millis(u64::from(src.get_u32()));
    if fl & flags::RESUME_ENABLE != 0 {
        need(src, 2)?;
        let token_len = usize::from(src.get_u16());
        need(src, token_len)?;
        src.advance(token_len);
    }
    let metadata_mime_type = get_mime(src)?;
    let data_mime_type = get_mime(src)?;
    let payload = decode_payload(fl, std::mem::take(src))?;
    Ok(Setup {
        major_version,
        minor_version,
        keepalive_interval,
        max_lifetime,
        metadata_mime_type,
        data_mime_type,
        payload,
    })
}

fn duration_millis_u32(d: Duration) -> u32 {
    u32::try_from(d.as_millis()).unwrap_or(u32::MAX)
}
