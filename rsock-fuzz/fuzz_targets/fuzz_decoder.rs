#![no_main]

use bytes::{Bytes, BytesMut};
use libfuzzer_sys::fuzz_target;
use rsock_proto::codec::{encode_length_prefixed, LengthDecoder};
use rsock_proto::frame::Frame;

fuzz_target!(|data: &[u8]| {
    // Whole input as one frame body
    if let Ok(frame) = Frame::decode(Bytes::copy_from_slice(data)) {
        // Skipped frames are not re-encoded faithfully (flags are dropped)
        if !matches!(frame, Frame::Ignored { .. }) {
            assert!(Frame::decode(frame.to_bytes()).is_ok());
        }
    }

    // Input as a length-prefixed stream, fed in uneven chunks
    let mut decoder = LengthDecoder::new(64 * 1024);
    for chunk in data.chunks(7) {
        decoder.extend(chunk);
        loop {
            match decoder.decode() {
                Ok(Some(body)) => {
                    if let Ok(frame) = Frame::decode(body) {
                        let mut out = BytesMut::new();
                        let _ = encode_length_prefixed(&frame, &mut out);
                    }
                }
                Ok(None) => break,
                // Oversized length: the stream is unusable from here on
                Err(_) => return,
            }
        }
    }
});
