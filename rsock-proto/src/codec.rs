//! Length-prefixed framing for stream transports (TCP, QUIC, iroh).
//!
//! Each frame is preceded by its length as a 24-bit big-endian integer.
//! WebSocket carries frames as whole binary messages and skips this layer.

use crate::frame::{Frame, FrameError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use rsock_core::options::MAX_FRAME_SIZE;

pub const LENGTH_PREFIX_LEN: usize = 3;

/// Stateful length-prefix decoder
///
/// Fast path:
/// - Whole frames already buffered → zero-copy `split_to`
///
/// Slow path:
/// - Partial frame → keep the bytes and wait for the next read
#[derive(Debug)]
pub struct LengthDecoder {
    buf: BytesMut,
    max_frame_size: usize,
}

impl Default for LengthDecoder {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl LengthDecoder {
    #[must_use]
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
        }
    }

    /// Append bytes read from the transport.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet returned as frames.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete frame body.
    ///
    /// Returns:
    /// - Ok(Some(frame)) → one frame body, prefix stripped
    /// - Ok(None) → need more data
    /// - Err → declared length exceeds the limit; the stream is unusable
    pub fn decode(&mut self) -> Result<Option<Bytes>, FrameError> {
        if self.buf.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let len = (&self.buf[..LENGTH_PREFIX_LEN]).get_uint(LENGTH_PREFIX_LEN) as usize;
        if len > self.max_frame_size {
            return Err(FrameError::TooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let total = LENGTH_PREFIX_LEN + len;
        if self.buf.len() < total {
            self.buf.reserve(total - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(LENGTH_PREFIX_LEN);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

/// Append `frame` to `dst` with its length prefix.
pub fn encode_length_prefixed(frame: &Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
    let len = frame.check_size(MAX_FRAME_SIZE)?;
    dst.reserve(LENGTH_PREFIX_LEN + len);
    dst.put_uint(len as u64, LENGTH_PREFIX_LEN);
    frame.encode(dst);
    Ok(())
}

/// Prefix an already encoded frame body.
pub fn put_length_prefixed(body: &[u8], dst: &mut Vec<u8>) -> Result<(), FrameError> {
    if body.len() > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge {
            size: body.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len = body.len() as u32;
    dst.reserve(LENGTH_PREFIX_LEN + body.len());
    dst.extend_from_slice(&len.to_be_bytes()[1..]);
    dst.extend_from_slice(body);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsock_core::payload::Payload;

    fn sample() -> Frame {
        Frame::RequestResponse {
            stream_id: 1,
            payload: Payload::new("Hello, RSocket!"),
        }
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        let mut out = BytesMut::new();
        encode_length_prefixed(frame, &mut out).unwrap();
        out.to_vec()
    }

    #[test]
    fn test_prefix() {
        let bytes = wire(&sample());
        assert_eq!(&bytes[..3], &[0, 0, 21]);
        assert_eq!(bytes.len(), 24);

        let mut vec = Vec::new();
        put_length_prefixed(&sample().to_bytes(), &mut vec).unwrap();
        assert_eq!(vec, bytes);
    }

    #[test]
    fn test_whole_frames() {
        let mut decoder = LengthDecoder::default();
        let mut bytes = wire(&sample());
        bytes.extend(wire(&Frame::Cancel { stream_id: 3 }));
        decoder.extend(&bytes);

        let first = decoder.decode().unwrap().unwrap();
        assert_eq!(Frame::decode(first).unwrap(), sample());
        let second = decoder.decode().unwrap().unwrap();
        assert_eq!(Frame::decode(second).unwrap(), Frame::Cancel { stream_id: 3 });
        assert!(decoder.decode().unwrap().is_none());
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_reads_reassemble() {
        let bytes = wire(&sample());
        let mut decoder = LengthDecoder::default();

        // Split inside the prefix, then inside the body.
        decoder.extend(&bytes[..2]);
        assert!(decoder.decode().unwrap().is_none());
        decoder.extend(&bytes[2..10]);
        assert!(decoder.decode().unwrap().is_none());
        decoder.extend(&bytes[10..]);

        let body = decoder.decode().unwrap().unwrap();
        assert_eq!(Frame::decode(body).unwrap(), sample());
    }

    #[test]
    fn test_byte_at_a_time() {
        let bytes = wire(&sample());
        let mut decoder = LengthDecoder::default();
        let mut frames = Vec::new();
        for b in &bytes {
            decoder.extend(std::slice::from_ref(b));
            if let Some(frame) = decoder.decode().unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_oversized_rejected() {
        let mut decoder = LengthDecoder::new(16);
        decoder.extend(&[0, 0, 17]);
        assert_eq!(
            decoder.decode(),
            Err(FrameError::TooLarge { size: 17, max: 16 })
        );
    }

    #[test]
    fn test_encode_too_large() {
        let frame = Frame::RequestFnf {
            stream_id: 1,
            payload: Payload::new(vec![0u8; MAX_FRAME_SIZE]),
        };
        let mut out = BytesMut::new();
        assert!(matches!(
            encode_length_prefixed(&frame, &mut out),
            Err(FrameError::TooLarge { .. })
        ));
        assert!(out.is_empty());
    }
}
