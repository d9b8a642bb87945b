//! Fuzz target for Session::handle_frame
//!
//! Drives an incoming or outgoing session with arbitrary frames interleaved
//! with local operations.
//!
//! # Invariants
//!
//! - Never panics
//! - A failed operation leaves the connection state unchanged
//! - Established is only reached through an accept

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tether_core::{ConnectionState, Environment, LocalProfile, Peer, Session};
use tether_proto::Frame;

#[derive(Clone)]
struct FixedClock;

impl Environment for FixedClock {
    fn unix_nanos(&self) -> u128 {
        1_700_000_000_000_000_000
    }
}

#[derive(Debug, Arbitrary)]
enum Step {
    Frame { opcode: u8, payload: Vec<u8> },
    Accept,
    Reject,
    Withdraw,
    Disconnect,
    Send(String),
    Seen(String),
    Cancel,
    TransportClosed,
}

#[derive(Debug, Arbitrary)]
struct Input {
    incoming: bool,
    steps: Vec<Step>,
}

fuzz_target!(|input: Input| {
    let profile = LocalProfile::new("fuzz", 0);
    let mut session = if input.incoming {
        Session::incoming(FixedClock, profile, "peer")
    } else {
        let mut session = Session::outgoing(FixedClock, profile);
        let _ = session.begin_connect(Peer::new("peer", "peer", 0));
        let _ = session.channel_opened();
        session
    };

    for step in input.steps {
        let before = session.state();
        let result = match step {
            Step::Frame { opcode, payload } => {
                let mut wire = vec![opcode];
                wire.extend_from_slice(&(payload.len() as u32).to_be_bytes());
                wire.extend_from_slice(&payload);
                match Frame::decode(&wire) {
                    Ok(frame) => session.handle_frame(&frame),
                    Err(_) => continue,
                }
            },
            Step::Accept => session.accept(),
            Step::Reject => session.reject(),
            Step::Withdraw => session.withdraw(),
            Step::Disconnect => session.disconnect(),
            Step::Send(text) => session.send_message(&text),
            Step::Seen(id) => session.mark_seen(&id),
            Step::Cancel => session.cancel_file_transfer(),
            Step::TransportClosed => Ok(session.transport_closed("fuzz")),
        };

        if result.is_err() {
            assert_eq!(session.state(), before, "failed step changed state");
        }
        if before != ConnectionState::Established && session.state() == ConnectionState::Established {
            assert!(
                matches!(before, ConnectionState::PendingAccept | ConnectionState::PendingDecision),
                "established from {before:?}"
            );
        }
    }
});
