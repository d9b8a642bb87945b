//! Property-based tests for chunked file transfer.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use proptest::prelude::*;
use tether_core::{Environment, LocalProfile, Peer, Session, SessionAction};
use tether_proto::{MessageKind, PROTOCOL_VERSION, Payload, payloads::handshake::Handshake};

#[derive(Clone, Default)]
struct TestClock(Arc<AtomicU64>);

impl Environment for TestClock {
    fn unix_nanos(&self) -> u128 {
        u128::from(self.0.fetch_add(1, Ordering::Relaxed)) + 1_000_000
    }
}

fn established(env: TestClock) -> Session<TestClock> {
    let mut session = Session::outgoing(env, LocalProfile::default());
    session.begin_connect(Peer::new("remote", "partner", 0)).expect("connect");
    session.channel_opened().expect("open");
    let accept = Payload::HandshakeAccept(Handshake {
        version: PROTOCOL_VERSION,
        name: "partner".to_string(),
        color: 0,
    });
    session.handle_frame(&accept.into_frame().expect("encode")).expect("accept");
    session
}

fn frames(actions: Vec<SessionAction>) -> Vec<tether_proto::Frame> {
    actions
        .into_iter()
        .filter_map(|a| match a {
            SessionAction::Send(frame) => Some(frame),
            _ => None,
        })
        .collect()
}

proptest! {
    /// An N-byte file sent in C-byte slices becomes ceil(N/C) chunk frames
    /// whose data sums to N, and the receiver reassembles it byte for byte.
    #[test]
    fn prop_chunking_covers_file_exactly(
        content in prop::collection::vec(any::<u8>(), 0..20_000),
        chunk_size in 1usize..4096,
    ) {
        let mut sender = established(TestClock::default());
        let mut receiver = {
            let mut s = Session::incoming(TestClock::default(), LocalProfile::default(), "sender");
            let request = Payload::HandshakeRequest(Handshake {
                version: PROTOCOL_VERSION,
                name: "sender".to_string(),
                color: 0,
            });
            s.handle_frame(&request.into_frame().expect("encode")).expect("request");
            s.accept().expect("accept");
            s
        };

        let size = content.len() as u64;
        let (id, start) = sender
            .begin_file_send(Path::new("/tmp/f.bin"), "f.bin", size, MessageKind::Image)
            .expect("begin");

        let mut wire = frames(start);
        let mut chunk_frames = 0;
        for slice in content.chunks(chunk_size) {
            let chunk = frames(sender.send_file_chunk(id, Bytes::copy_from_slice(slice)).expect("chunk"));
            chunk_frames += chunk.len();
            wire.extend(chunk);
        }
        wire.extend(frames(sender.finish_file_send(id).expect("finish")));

        // PROPERTY: ceil(N / C) chunk frames
        prop_assert_eq!(chunk_frames, content.len().div_ceil(chunk_size));

        let mut received = Vec::new();
        let mut completed = false;
        for frame in &wire {
            for action in receiver.handle_frame(frame).expect("receive") {
                match action {
                    SessionAction::AppendIncomingFile { data, .. } => {
                        received.extend_from_slice(&data);
                    },
                    SessionAction::CompleteIncomingFile { .. } => completed = true,
                    SessionAction::DiscardIncomingFile => prop_assert!(false, "discarded"),
                    _ => {},
                }
            }
        }

        // PROPERTY: reassembled bytes are identical
        prop_assert!(completed);
        prop_assert_eq!(received, content);
    }
}
