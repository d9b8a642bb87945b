//! Fuzz target for FrameDecoder
//!
//! Feeds arbitrary bytes to the stream decoder in arbitrary slices.
//!
//! # Invariants
//!
//! - Never panics
//! - Never returns a frame whose payload exceeds the configured limit
//! - An oversized frame is skipped and decoding continues; any other error
//!   abandons the stream, like the read loop does

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_proto::FrameDecoder;

#[derive(Debug, Arbitrary)]
struct Input {
    limit: u16,
    slices: Vec<Vec<u8>>,
}

fuzz_target!(|input: Input| {
    let limit = u32::from(input.limit);
    let mut decoder = FrameDecoder::new(limit);

    for slice in input.slices {
        decoder.extend_from_slice(&slice);
        loop {
            match decoder.decode_next() {
                Ok(Some(frame)) => assert!(frame.payload.len() <= limit as usize),
                Ok(None) => break,
                Err(e) if e.is_fatal() => return,
                Err(_) => {},
            }
        }
    }

    let _ = decoder.finish();
});
