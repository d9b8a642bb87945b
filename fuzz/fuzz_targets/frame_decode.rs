//! Fuzz target for Frame::decode and Payload::from_frame
//!
//! Arbitrary bytes are decoded as one frame and, if that works, as the payload
//! its opcode names. Every payload decoder is also tried against the raw
//! bytes to cover type confusion between opcodes.
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tether_proto::{Frame, Opcode, Payload};

fuzz_target!(|data: &[u8]| {
    if let Ok(frame) = Frame::decode(data) {
        if let Ok(payload) = Payload::from_frame(&frame) {
            // A decoded payload must encode again
            let _ = payload.into_frame().expect("decoded payload must re-encode");
        }
    }

    for opcode in Opcode::ALL {
        let _ = Payload::decode(opcode, data);
    }
});
