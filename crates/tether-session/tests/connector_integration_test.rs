//! Integration tests for the connector over loopback TCP.
//!
//! Each node is a real `Connector` bound to an ephemeral port, with listeners
//! forwarding events into channels the test reads from.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tempfile::TempDir;
use tether_proto::{
    FrameHeader, MessageKind, Opcode, PROTOCOL_VERSION, Payload,
    payloads::{chat::TextMessage, handshake::Handshake},
};
use tether_session::{
    ConnectionEvent, ConnectionState, Connector, DeliveryStatus, ErrorKind, FileEvent,
    FrameReader, LocalProfile, MessageEvent, Peer, SessionConfig, SessionError, TcpTransport,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::mpsc::{self, UnboundedReceiver},
    time::timeout,
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

struct Node {
    connector: Connector<TcpTransport>,
    connection: UnboundedReceiver<ConnectionEvent>,
    messages: UnboundedReceiver<MessageEvent>,
    files: UnboundedReceiver<FileEvent>,
    downloads: TempDir,
}

impl Node {
    async fn start(name: &str, chunk_size: usize) -> Self {
        Self::start_with(name, |config| config.chunk_size = chunk_size).await
    }

    async fn start_with(name: &str, adjust: impl FnOnce(&mut SessionConfig)) -> Self {
        let downloads = tempfile::tempdir().unwrap();
        let mut config = SessionConfig {
            profile: LocalProfile::new(name, 0x3366CC),
            listen_address: "127.0.0.1:0".to_string(),
            download_dir: downloads.path().to_path_buf(),
            ..SessionConfig::default()
        };
        adjust(&mut config);
        let connector = Connector::new(TcpTransport, config);

        let (tx, connection) = mpsc::unbounded_channel();
        connector.set_connection_listener(Some(Arc::new(move |e: ConnectionEvent| {
            let _ = tx.send(e);
        })));
        let (tx, messages) = mpsc::unbounded_channel();
        connector.set_message_listener(Some(Arc::new(move |e: MessageEvent| {
            let _ = tx.send(e);
        })));
        let (tx, files) = mpsc::unbounded_channel();
        connector.set_file_listener(Some(Arc::new(move |e: FileEvent| {
            let _ = tx.send(e);
        })));

        connector.prepare().await.unwrap();
        Self { connector, connection, messages, files, downloads }
    }

    fn as_peer(&self, name: &str) -> Peer {
        Peer::new(self.connector.local_address().unwrap(), name, 0x3366CC)
    }
}

async fn next<T>(rx: &mut UnboundedReceiver<T>) -> T {
    timeout(EVENT_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("listener dropped")
}

/// Skip events until one matches.
async fn next_matching<T: std::fmt::Debug>(
    rx: &mut UnboundedReceiver<T>,
    mut wanted: impl FnMut(&T) -> bool,
) -> T {
    loop {
        let event = next(rx).await;
        if wanted(&event) {
            return event;
        }
    }
}

async fn establish(alice: &mut Node, bob: &mut Node) {
    alice.connector.connect(bob.as_peer("bob")).await.unwrap();
    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::Connecting { .. }));

    match next(&mut bob.connection).await {
        ConnectionEvent::IncomingRequest(peer) => assert_eq!(peer.name, "alice"),
        other => panic!("expected incoming request, got {other:?}"),
    }
    assert!(bob.connector.is_pending());
    bob.connector.accept_connection().unwrap();

    match next(&mut bob.connection).await {
        ConnectionEvent::ConnectedIn(conversation) => assert_eq!(conversation.display_name, "alice"),
        other => panic!("expected connected-in, got {other:?}"),
    }
    assert_eq!(next(&mut alice.connection).await, ConnectionEvent::ConnectionAccepted);
    match next(&mut alice.connection).await {
        ConnectionEvent::ConnectedOut(conversation) => assert_eq!(conversation.display_name, "bob"),
        other => panic!("expected connected-out, got {other:?}"),
    }

    assert!(alice.connector.is_connected());
    assert!(bob.connector.is_connected());
}

async fn write_file(dir: &Path, name: &str, len: usize, salt: u8) -> (PathBuf, Vec<u8>) {
    let path = dir.join(name);
    let content: Vec<u8> = (0..len).map(|i| (i % 251) as u8 ^ salt).collect();
    tokio::fs::write(&path, &content).await.unwrap();
    (path, content)
}

/// Plays the remote side by hand: accepts alice's call and completes the
/// handshake, returning both halves of the raw stream.
async fn raw_partner(alice: &mut Node) -> (FrameReader<OwnedReadHalf>, OwnedWriteHalf) {
    let raw = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = raw.local_addr().unwrap().to_string();

    alice.connector.connect(Peer::new(address, "raw", 0)).await.unwrap();
    let (stream, _) = raw.accept().await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FrameReader::new(read_half, 1024 * 1024);

    let request = frames.next_frame().await.unwrap().unwrap();
    assert_eq!(request.opcode(), Some(Opcode::HandshakeRequest));

    send_payload(
        &mut write_half,
        Payload::HandshakeAccept(Handshake {
            version: PROTOCOL_VERSION,
            name: "raw".to_string(),
            color: 0,
        }),
    )
    .await;

    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::Connecting { .. }));
    assert_eq!(next(&mut alice.connection).await, ConnectionEvent::ConnectionAccepted);
    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::ConnectedOut(_)));
    (frames, write_half)
}

async fn send_payload(writer: &mut OwnedWriteHalf, payload: Payload) {
    let mut wire = Vec::new();
    payload.into_frame().unwrap().encode(&mut wire).unwrap();
    writer.write_all(&wire).await.unwrap();
}

async fn wait_until_empty(dir: &Path) {
    timeout(EVENT_TIMEOUT, async {
        loop {
            let mut entries = tokio::fs::read_dir(dir).await.unwrap();
            if entries.next_entry().await.unwrap().is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("partial file was not removed");
}

#[tokio::test]
async fn rejected_request_returns_both_sides_to_idle() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;

    alice.connector.connect(bob.as_peer("bob")).await.unwrap();
    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::Connecting { .. }));
    assert!(matches!(next(&mut bob.connection).await, ConnectionEvent::IncomingRequest(_)));

    bob.connector.reject_connection().unwrap();
    assert_eq!(next(&mut bob.connection).await, ConnectionEvent::ConnectionRejected);
    assert_eq!(next(&mut alice.connection).await, ConnectionEvent::ConnectionRejected);

    assert_eq!(alice.connector.state(), ConnectionState::Idle);
    assert_eq!(bob.connector.state(), ConnectionState::Idle);
    assert!(!alice.connector.is_connected_or_pending());
    assert!(alice.connector.current_conversation().is_none());
}

#[tokio::test]
async fn message_is_delivered_before_seen() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    alice.connector.send_message("hello bob").unwrap();
    let sent = match next(&mut alice.messages).await {
        MessageEvent::Sent(message) => message,
        other => panic!("expected sent, got {other:?}"),
    };
    assert!(sent.own);
    assert_eq!(sent.status, DeliveryStatus::Sent);

    match next(&mut bob.messages).await {
        MessageEvent::Received(message) => {
            assert_eq!(message.id, sent.id);
            assert_eq!(message.text, "hello bob");
            assert!(!message.own);
        },
        other => panic!("expected received, got {other:?}"),
    }
    assert_eq!(next(&mut alice.messages).await, MessageEvent::Delivered(sent.id.clone()));

    bob.connector.mark_seen(&sent.id).unwrap();
    assert_eq!(next(&mut alice.messages).await, MessageEvent::Seen(sent.id.clone()));

    let again = bob.connector.mark_seen(&sent.id).unwrap_err();
    assert_eq!(again.kind(), ErrorKind::State);
}

#[tokio::test]
async fn file_arrives_in_chunks_byte_identical() {
    let mut alice = Node::start("alice", 2000).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("picture.png");
    let content: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    tokio::fs::write(&source, &content).await.unwrap();

    alice.connector.send_file(&source).await.unwrap();

    assert_eq!(next(&mut alice.files).await, FileEvent::SendingStarted {
        path: source.clone(),
        total: 5000
    });
    for sent in [2000, 4000, 5000] {
        assert_eq!(next(&mut alice.files).await, FileEvent::SendingProgress { sent, total: 5000 });
    }
    assert_eq!(next(&mut alice.files).await, FileEvent::SendingFinished);
    match next(&mut alice.messages).await {
        MessageEvent::Sent(message) => {
            assert_eq!(message.kind, tether_proto::MessageKind::Image);
            assert_eq!(message.file.as_deref(), Some(source.as_path()));
        },
        other => panic!("expected sent image, got {other:?}"),
    }

    assert_eq!(next(&mut bob.files).await, FileEvent::ReceivingStarted {
        name: "picture.png".to_string(),
        total: 5000
    });
    let partial = bob.downloads.path().join("picture.png.part");
    for received in [2000, 4000, 5000] {
        assert_eq!(next(&mut bob.files).await, FileEvent::ReceivingProgress {
            received,
            total: 5000
        });
        // Progress never runs ahead of the partial file
        if received < 5000 {
            let on_disk = tokio::fs::metadata(&partial).await.unwrap().len();
            assert!(on_disk >= received, "{on_disk} bytes on disk at {received}");
        }
    }
    let stored = match next(&mut bob.files).await {
        FileEvent::ReceivingFinished { path } => path,
        other => panic!("expected finished, got {other:?}"),
    };
    assert_eq!(stored, bob.downloads.path().join("picture.png"));
    assert_eq!(tokio::fs::read(&stored).await.unwrap(), content);

    match next(&mut bob.messages).await {
        MessageEvent::Received(message) => {
            assert_eq!(message.kind, tether_proto::MessageKind::Image);
            assert_eq!(message.file.as_deref(), Some(stored.as_path()));
        },
        other => panic!("expected received image, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_mid_transfer_discards_partial_file() {
    let mut alice = Node::start("alice", 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    let source_dir = tempfile::tempdir().unwrap();
    let source = source_dir.path().join("large.bin");
    tokio::fs::write(&source, vec![0x5Au8; 32 * 1024 * 1024]).await.unwrap();

    alice.connector.send_file(&source).await.unwrap();
    assert!(matches!(next(&mut alice.files).await, FileEvent::SendingStarted { .. }));
    assert!(matches!(next(&mut alice.files).await, FileEvent::SendingProgress { .. }));

    alice.connector.cancel_file_transfer().unwrap();

    next_matching(&mut alice.files, |e| {
        assert!(!matches!(e, FileEvent::SendingFinished), "transfer finished despite cancel");
        matches!(e, FileEvent::TransferCanceled { .. })
    })
    .await;
    let canceled = next_matching(&mut bob.files, |e| {
        assert!(!matches!(e, FileEvent::ReceivingFinished { .. }), "file stored despite cancel");
        matches!(e, FileEvent::TransferCanceled { .. })
    })
    .await;
    assert_eq!(canceled, FileEvent::TransferCanceled { by_partner: true });

    wait_until_empty(bob.downloads.path()).await;
    assert!(alice.connector.is_connected());
}

#[tokio::test]
async fn repeated_disconnect_and_idle_cancel_are_state_errors() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    let cancel = alice.connector.cancel_file_transfer().unwrap_err();
    assert_eq!(cancel.kind(), ErrorKind::State);

    alice.connector.disconnect().unwrap();
    assert_eq!(next(&mut alice.connection).await, ConnectionEvent::Disconnected);
    let again = alice.connector.disconnect().unwrap_err();
    assert_eq!(again.kind(), ErrorKind::State);

    assert!(matches!(next(&mut bob.connection).await, ConnectionEvent::ConnectionLost { .. }));
    assert_eq!(bob.connector.state(), ConnectionState::Lost);
}

#[tokio::test]
async fn stop_tears_down_and_partner_sees_loss() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    bob.connector.stop();
    assert_eq!(next(&mut bob.connection).await, ConnectionEvent::ConnectionDestroyed);
    bob.connector.stop();
    assert_eq!(bob.connector.state(), ConnectionState::Destroyed);

    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::ConnectionLost { .. }));
    assert!(!alice.connector.is_connected());
}

#[tokio::test]
async fn busy_peer_drops_second_caller() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    let mut carol = Node::start("carol", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    carol.connector.connect(bob.as_peer("bob")).await.unwrap();
    assert!(matches!(next(&mut carol.connection).await, ConnectionEvent::Connecting { .. }));
    assert!(matches!(
        next(&mut carol.connection).await,
        ConnectionEvent::ConnectionFailed { .. }
    ));

    assert!(bob.connector.is_connected());
    assert_eq!(bob.connector.current_conversation().unwrap().display_name, "alice");
}

#[tokio::test]
async fn lost_channel_fails_undelivered_messages() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let (mut frames, write_half) = raw_partner(&mut alice).await;
    assert_eq!(alice.connector.current_conversation().unwrap().display_name, "raw");

    alice.connector.send_message("anyone there?").unwrap();
    let id = match next(&mut alice.messages).await {
        MessageEvent::Sent(message) => message.id,
        other => panic!("expected sent, got {other:?}"),
    };

    let text = frames.next_frame().await.unwrap().unwrap();
    match Payload::from_frame(&text).unwrap() {
        Payload::TextMessage(message) => assert_eq!(message.id, id),
        other => panic!("expected text message, got {other:?}"),
    }

    // Vanish without a disconnect frame or a delivery receipt
    drop(frames);
    drop(write_half);

    assert_eq!(next(&mut alice.messages).await, MessageEvent::NotDelivered(id));
    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::ConnectionLost { .. }));
    assert_eq!(alice.connector.state(), ConnectionState::Lost);
}

#[tokio::test]
async fn silent_incoming_channel_does_not_block_connect() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;

    // Opens a channel to alice and never sends a request
    let mut silent = TcpStream::connect(alice.connector.local_address().unwrap()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alice.connector.state(), ConnectionState::Idle);
    assert!(!alice.connector.is_pending());

    establish(&mut alice, &mut bob).await;

    // The silent channel was closed to make way
    let mut byte = [0u8; 1];
    let read = timeout(EVENT_TIMEOUT, silent.read(&mut byte)).await.expect("silent channel left open");
    assert!(matches!(read, Ok(0) | Err(_)));
}

#[tokio::test]
async fn silent_incoming_channel_expires_quietly() {
    let mut alice = Node::start_with("alice", |config| {
        config.handshake_timeout = Duration::from_millis(200);
    })
    .await;
    let mut bob = Node::start("bob", 16 * 1024).await;

    let mut silent = TcpStream::connect(alice.connector.local_address().unwrap()).await.unwrap();
    let mut byte = [0u8; 1];
    let read = timeout(EVENT_TIMEOUT, silent.read(&mut byte)).await.expect("silent channel left open");
    assert!(matches!(read, Ok(0) | Err(_)));
    assert_eq!(alice.connector.state(), ConnectionState::Idle);

    // Later callers get through, and the silent channel was never announced
    bob.connector.connect(alice.as_peer("alice")).await.unwrap();
    match next(&mut alice.connection).await {
        ConnectionEvent::IncomingRequest(peer) => assert_eq!(peer.name, "bob"),
        other => panic!("expected incoming request, got {other:?}"),
    }
}

#[tokio::test]
async fn unanswered_request_expires_as_failure() {
    let mut alice = Node::start_with("alice", |config| {
        config.handshake_timeout = Duration::from_millis(300);
    })
    .await;
    let mut bob = Node::start("bob", 16 * 1024).await;

    alice.connector.connect(bob.as_peer("bob")).await.unwrap();
    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::Connecting { .. }));
    assert!(matches!(next(&mut bob.connection).await, ConnectionEvent::IncomingRequest(_)));

    match next(&mut alice.connection).await {
        ConnectionEvent::ConnectionFailed { reason } => assert!(reason.contains("timeout")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(next(&mut bob.connection).await, ConnectionEvent::ConnectionWithdrawn);
    assert_eq!(alice.connector.state(), ConnectionState::Idle);
    assert!(!bob.connector.is_pending());
}

#[tokio::test]
async fn undecided_request_expires_as_withdrawn() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start_with("bob", |config| {
        config.handshake_timeout = Duration::from_millis(300);
    })
    .await;

    alice.connector.connect(bob.as_peer("bob")).await.unwrap();
    assert!(matches!(next(&mut alice.connection).await, ConnectionEvent::Connecting { .. }));
    assert!(matches!(next(&mut bob.connection).await, ConnectionEvent::IncomingRequest(_)));

    assert_eq!(next(&mut bob.connection).await, ConnectionEvent::ConnectionWithdrawn);
    assert_eq!(next(&mut alice.connection).await, ConnectionEvent::ConnectionRejected);
    assert_eq!(bob.connector.state(), ConnectionState::Idle);
    assert_eq!(alice.connector.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn oversized_frame_is_skipped_and_session_survives() {
    let mut alice = Node::start_with("alice", |config| config.max_frame_payload = 64 * 1024).await;
    let (mut frames, mut write_half) = raw_partner(&mut alice).await;

    // Fully sent, but twice the limit
    let mut header = FrameHeader::new(Opcode::TextMessage);
    header.set_payload_size(128 * 1024);
    write_half.write_all(&header.to_bytes()).await.unwrap();
    write_half.write_all(&vec![0xEE; 128 * 1024]).await.unwrap();

    let text = TextMessage {
        id: "42".to_string(),
        kind: MessageKind::Text,
        text: "after the big one".to_string(),
        timestamp: 0,
    };
    send_payload(&mut write_half, Payload::TextMessage(text)).await;

    match next(&mut alice.messages).await {
        MessageEvent::Received(message) => assert_eq!(message.text, "after the big one"),
        other => panic!("expected received, got {other:?}"),
    }
    let receipt = frames.next_frame().await.unwrap().unwrap();
    assert_eq!(receipt.opcode(), Some(Opcode::DeliveredAck));

    assert_eq!(alice.connector.state(), ConnectionState::Established);
    assert!(alice.connection.try_recv().is_err());
}

#[tokio::test]
async fn chunk_above_receiver_limit_fails_only_the_transfer() {
    let mut alice = Node::start("alice", 32 * 1024).await;
    let mut bob = Node::start_with("bob", |config| config.max_frame_payload = 8 * 1024).await;
    establish(&mut alice, &mut bob).await;

    let source_dir = tempfile::tempdir().unwrap();
    let (source, _) = write_file(source_dir.path(), "wide.bin", 4 * 1024 * 1024, 0).await;
    alice.connector.send_file(&source).await.unwrap();

    assert!(matches!(next(&mut bob.files).await, FileEvent::ReceivingStarted { .. }));
    match next(&mut bob.files).await {
        FileEvent::ReceivingFailed { reason } => assert!(reason.contains("too large")),
        other => panic!("expected receive failure, got {other:?}"),
    }
    wait_until_empty(bob.downloads.path()).await;

    // Chat still flows both ways
    bob.connector.send_message("still connected").unwrap();
    let received = next_matching(&mut alice.messages, |e| matches!(e, MessageEvent::Received(_))).await;
    assert!(matches!(received, MessageEvent::Received(m) if m.text == "still connected"));
    assert!(alice.connector.is_connected());
    assert!(bob.connector.is_connected());
}

#[tokio::test]
async fn chat_flows_during_transfer_and_second_send_is_busy() {
    let mut alice = Node::start("alice", 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    let source_dir = tempfile::tempdir().unwrap();
    let (source, _) = write_file(source_dir.path(), "long.bin", 32 * 1024 * 1024, 0).await;
    alice.connector.send_file(&source).await.unwrap();
    assert!(matches!(next(&mut alice.files).await, FileEvent::SendingStarted { .. }));
    assert!(matches!(next(&mut alice.files).await, FileEvent::SendingProgress { .. }));

    let busy = alice.connector.send_file(&source).await.unwrap_err();
    assert_eq!(busy, SessionError::TransferBusy);

    alice.connector.send_message("while sending").unwrap();
    let id = match next(&mut alice.messages).await {
        MessageEvent::Sent(message) => message.id,
        other => panic!("expected sent, got {other:?}"),
    };
    assert_eq!(next(&mut alice.messages).await, MessageEvent::Delivered(id));

    // Events are dispatched in order, so a finished transfer would already be queued
    while let Ok(event) = alice.files.try_recv() {
        assert!(!matches!(event, FileEvent::SendingFinished), "transfer finished before delivery");
    }
    assert!(alice.connector.is_connected());
    alice.connector.cancel_file_transfer().unwrap();
}

#[tokio::test]
async fn opposite_transfers_run_at_once() {
    let mut alice = Node::start("alice", 16 * 1024).await;
    let mut bob = Node::start("bob", 16 * 1024).await;
    establish(&mut alice, &mut bob).await;

    let source_dir = tempfile::tempdir().unwrap();
    let (to_bob, to_bob_content) =
        write_file(source_dir.path(), "to-bob.bin", 4 * 1024 * 1024, 0x11).await;
    let (to_alice, to_alice_content) =
        write_file(source_dir.path(), "to-alice.bin", 3 * 1024 * 1024, 0x22).await;

    alice.connector.send_file(&to_bob).await.unwrap();
    bob.connector.send_file(&to_alice).await.unwrap();

    for (node, expected_name, expected) in [
        (&mut alice, "to-alice.bin", &to_alice_content),
        (&mut bob, "to-bob.bin", &to_bob_content),
    ] {
        let mut sent = false;
        let mut stored = None;
        while !sent || stored.is_none() {
            match next(&mut node.files).await {
                FileEvent::SendingFinished => sent = true,
                FileEvent::ReceivingFinished { path } => stored = Some(path),
                event @ (FileEvent::SendingFailed { .. }
                | FileEvent::ReceivingFailed { .. }
                | FileEvent::TransferCanceled { .. }) => panic!("transfer broke: {event:?}"),
                _ => {},
            }
        }

        let stored = stored.unwrap();
        assert_eq!(stored, node.downloads.path().join(expected_name));
        assert_eq!(&tokio::fs::read(&stored).await.unwrap(), expected);
    }
}
