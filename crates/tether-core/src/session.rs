//! Session: the three state machines of one channel behind a single API.
//!
//! Routes decoded frames to the connection, message or transfer machine,
//! enforces that chat and file frames only flow while established, and fails
//! outstanding work exactly once when the session leaves that state.

use std::{path::Path, time::Duration};

use bytes::Bytes;
use tether_proto::{Frame, MessageKind, Opcode, Payload};

use crate::{
    action::SessionAction,
    connection::{Connection, ConnectionState, Direction},
    env::Environment,
    error::SessionError,
    event::{FileEvent, MessageEvent, SessionEvent},
    message::{ChatMessage, DeliveryStatus, MessageExchange},
    peer::{Conversation, LocalProfile, Peer},
    transfer::{FileTransfer, TransferId, Transfers},
};

/// How long a handshake may wait on the partner or the user.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// One connection attempt or established session with one peer.
///
/// Pure state machine: no I/O. The environment is stored only to read the
/// clock for message ids, timestamps and the handshake deadline.
#[derive(Debug, Clone)]
pub struct Session<E: Environment> {
    env: E,
    connection: Connection,
    messages: MessageExchange,
    transfers: Transfers,
    handshake_timeout: Duration,
    /// Unix millis of the last connection state change
    state_since: u64,
}

impl<E: Environment> Session<E> {
    /// Session for a connection we initiate.
    pub fn outgoing(env: E, profile: LocalProfile) -> Self {
        Self::with_connection(env, Connection::outgoing(profile))
    }

    /// Session for a channel the partner opened from `remote_address`.
    pub fn incoming(env: E, profile: LocalProfile, remote_address: impl Into<String>) -> Self {
        Self::with_connection(env, Connection::incoming(profile, remote_address))
    }

    fn with_connection(env: E, connection: Connection) -> Self {
        let state_since = env.unix_millis();
        Self {
            env,
            connection,
            messages: MessageExchange::new(),
            transfers: Transfers::new(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            state_since,
        }
    }

    /// Use `timeout` instead of [`DEFAULT_HANDSHAKE_TIMEOUT`].
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Which side initiated
    pub fn direction(&self) -> Direction {
        self.connection.direction()
    }

    /// Partner, once known
    pub fn peer(&self) -> Option<&Peer> {
        self.connection.peer()
    }

    /// Unix millis at which the handshake completed
    pub fn established_at(&self) -> Option<u64> {
        self.connection.established_at()
    }

    /// Incoming channel on which the partner has not sent a request yet.
    ///
    /// Such a session has not announced anything to the application.
    pub fn awaits_request(&self) -> bool {
        self.connection.awaits_request()
    }

    /// Unix millis at which the waiting handshake expires, or `None` if no
    /// handshake is waiting.
    pub fn handshake_deadline(&self) -> Option<u64> {
        let timeout = self.handshake_timeout.as_millis() as u64;
        self.connection.awaits_handshake().then(|| self.state_since.saturating_add(timeout))
    }

    /// Handshake completed and not yet ended.
    pub fn is_established(&self) -> bool {
        self.state() == ConnectionState::Established
    }

    /// Conversation record for the established partner.
    pub fn conversation(&self) -> Option<Conversation> {
        if !self.is_established() {
            return None;
        }
        let peer = self.peer()?;
        Some(Conversation::with_peer(peer, self.established_at().unwrap_or_default()))
    }

    /// Delivery status of an own message still being tracked.
    pub fn message_status(&self, id: &str) -> Option<DeliveryStatus> {
        self.messages.status(id)
    }

    /// Outgoing transfer in progress
    pub fn outgoing_transfer(&self) -> Option<&FileTransfer> {
        self.transfers.outgoing()
    }

    /// Incoming transfer in progress
    pub fn incoming_transfer(&self) -> Option<&FileTransfer> {
        self.transfers.incoming()
    }

    fn require_established(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.is_established() {
            Ok(())
        } else {
            Err(SessionError::InvalidState { state: self.state(), operation })
        }
    }

    /// Run a connection transition; if it ends the established session,
    /// append the failures for outstanding messages and transfers.
    fn transition(
        &mut self,
        step: impl FnOnce(&mut Connection) -> Result<Vec<SessionAction>, SessionError>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let before = self.state();
        let was_established = self.is_established();
        let mut actions = step(&mut self.connection)?;
        if self.state() != before {
            self.state_since = self.env.unix_millis();
        }

        if was_established && !self.is_established() {
            let reason = format!("session ended ({:?})", self.state());
            actions.extend(self.messages.fail_pending());
            actions.extend(self.transfers.abort_all(&reason));
        }
        Ok(actions)
    }

    /// Start an outgoing attempt to `peer`.
    pub fn begin_connect(&mut self, peer: Peer) -> Result<Vec<SessionAction>, SessionError> {
        self.transition(|conn| conn.begin_connect(peer))
    }

    /// Outgoing channel is open; sends the request.
    pub fn channel_opened(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.transition(Connection::channel_opened)
    }

    /// Outgoing channel could not be opened.
    pub fn connect_failed(&mut self, reason: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.transition(|conn| conn.connect_failed(reason))
    }

    /// Accept the pending incoming request.
    pub fn accept(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        let now = self.env.unix_millis();
        self.transition(|conn| conn.accept(now))
    }

    /// Reject the pending incoming request.
    pub fn reject(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.transition(Connection::reject)
    }

    /// Withdraw our pending outgoing request.
    pub fn withdraw(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.transition(Connection::withdraw)
    }

    /// Expire a handshake that has waited longer than the handshake timeout.
    /// Does nothing before the deadline or once the handshake is settled.
    pub fn tick(&mut self) -> Vec<SessionAction> {
        let waited = self.env.unix_millis().saturating_sub(self.state_since);
        let timeout = self.handshake_timeout;
        self.transition(|conn| Ok(conn.tick(Duration::from_millis(waited), timeout)))
            .unwrap_or_default()
    }

    /// Disconnect the established session.
    ///
    /// # Errors
    ///
    /// - `SessionError::InvalidState` if not established (including a second
    ///   call)
    pub fn disconnect(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.transition(Connection::disconnect)
    }

    /// Tear down from any state.
    pub fn destroy(&mut self) -> Vec<SessionAction> {
        self.transition(|conn| Ok(conn.destroy())).unwrap_or_default()
    }

    /// The channel closed or failed.
    pub fn transport_closed(&mut self, reason: &str) -> Vec<SessionAction> {
        self.transition(|conn| Ok(conn.transport_closed(reason))).unwrap_or_default()
    }

    /// Process one frame read from the channel.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedFrame` for chat or file frames outside
    ///   Established, and handshake frames in the wrong state or direction
    /// - `SessionError::Protocol` for unknown opcodes or undecodable payloads
    pub fn handle_frame(&mut self, frame: &Frame) -> Result<Vec<SessionAction>, SessionError> {
        let opcode = frame
            .opcode()
            .ok_or(tether_proto::ProtocolError::UnknownOpcode(frame.header.opcode()))?;

        if !opcode.is_handshake() && opcode != Opcode::Disconnect && !self.is_established() {
            return Err(SessionError::UnexpectedFrame {
                state: self.state(),
                opcode: opcode.to_u8(),
            });
        }

        let payload = Payload::from_frame(frame)?;
        match payload {
            Payload::HandshakeRequest(_)
            | Payload::HandshakeAccept(_)
            | Payload::HandshakeReject(_)
            | Payload::HandshakeWithdraw
            | Payload::Disconnect => {
                let now = self.env.unix_millis();
                self.transition(|conn| conn.handle_frame(payload, now))
            },

            Payload::TextMessage(msg) => self.messages.on_message(msg),
            Payload::DeliveredAck(receipt) => Ok(self.messages.on_delivered(receipt.id)),
            Payload::SeenAck(receipt) => Ok(self.messages.on_seen(receipt.id)),

            Payload::FileStart(start) => self.transfers.on_start(start),
            Payload::FileChunk(chunk) => self.transfers.on_chunk(chunk),
            Payload::FileEnd(end) => {
                let (completed, mut actions) = self.transfers.on_end(&end)?;
                if let Some(done) = completed {
                    let message = ChatMessage {
                        id: self.messages.next_id(&self.env),
                        kind: done.kind,
                        text: done.name,
                        file: None,
                        timestamp: self.env.unix_millis(),
                        own: false,
                        status: DeliveryStatus::Delivered,
                    };
                    actions.push(SessionAction::CompleteIncomingFile { message });
                }
                Ok(actions)
            },
            Payload::FileCancel(cancel) => Ok(self.transfers.on_cancel(&cancel)),
        }
    }

    /// Send a chat message.
    pub fn send_message(&mut self, text: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.require_established("send message")?;
        self.messages.send(&self.env, text.to_string())
    }

    /// Tell the partner the user read message `id`.
    pub fn mark_seen(&mut self, id: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.require_established("mark seen")?;
        self.messages.mark_seen(id)
    }

    /// Announce an outgoing file of `size` bytes.
    ///
    /// The caller then feeds the content through
    /// [`Session::send_file_chunk`] and closes with
    /// [`Session::finish_file_send`] or [`Session::fail_file_send`].
    pub fn begin_file_send(
        &mut self,
        path: &Path,
        name: &str,
        size: u64,
        kind: MessageKind,
    ) -> Result<(TransferId, Vec<SessionAction>), SessionError> {
        self.require_established("send file")?;
        self.transfers.begin_send(path, name, size, kind)
    }

    /// Send the next chunk of transfer `id`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveTransfer` once the transfer was canceled (by
    ///   either side) or the session ended; stop reading
    pub fn send_file_chunk(
        &mut self,
        id: TransferId,
        data: Bytes,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.transfers.send_chunk(id, data)
    }

    /// All content of transfer `id` was sent.
    pub fn finish_file_send(&mut self, id: TransferId) -> Result<Vec<SessionAction>, SessionError> {
        let (done, mut actions) = self.transfers.finish_send(id)?;

        let message = ChatMessage {
            id: self.messages.next_id(&self.env),
            kind: done.kind,
            text: done.name,
            file: Some(done.path),
            timestamp: self.env.unix_millis(),
            own: true,
            status: DeliveryStatus::Sent,
        };
        actions.push(SessionAction::emit(MessageEvent::Sent(message)));
        Ok(actions)
    }

    /// Reading the source of transfer `id` failed.
    pub fn fail_file_send(
        &mut self,
        id: TransferId,
        reason: &str,
    ) -> Result<Vec<SessionAction>, SessionError> {
        self.transfers.fail_send(id, reason)
    }

    /// Cancel the outgoing transfer, or the incoming one if nothing is being
    /// sent.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoActiveTransfer` if neither slot is busy
    pub fn cancel_file_transfer(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        self.transfers.cancel()
    }

    /// The partial file of the incoming transfer could not be written.
    pub fn fail_incoming(&mut self, reason: &str) -> Result<Vec<SessionAction>, SessionError> {
        self.transfers.fail_incoming(reason)
    }

    /// A frame with raw opcode `opcode` was skipped unread because it
    /// exceeded the frame limit.
    ///
    /// A lost chunk leaves a gap in the incoming file, so that transfer
    /// fails. Any other skipped frame leaves the session untouched.
    pub fn frame_dropped(&mut self, opcode: u8, reason: &str) -> Vec<SessionAction> {
        if Opcode::from_u8(opcode) != Some(Opcode::FileChunk) || !self.is_established() {
            return Vec::new();
        }
        self.transfers.fail_incoming(reason).unwrap_or_default()
    }

    /// Events announcing a received file once it sits at `path`.
    ///
    /// `message` is the one carried by
    /// [`SessionAction::CompleteIncomingFile`].
    pub fn completed_file_events(message: ChatMessage, path: &Path) -> Vec<SessionEvent> {
        let message = ChatMessage { file: Some(path.to_path_buf()), ..message };
        vec![
            FileEvent::ReceivingFinished { path: path.to_path_buf() }.into(),
            MessageEvent::Received(message).into(),
        ]
    }
}
