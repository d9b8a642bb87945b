//! Connection state machine.
//!
//! Drives the handshake that must complete before a channel carries chat or
//! file traffic, and tracks how the session ends. Uses the action pattern:
//! methods return actions for the driver to execute and never touch the
//! channel themselves.
//!
//! # State Machine
//!
//! ```text
//!  outgoing:
//!  ┌──────┐ connect ┌────────────┐ opened ┌───────────────┐  ACCEPT  ┌─────────────┐
//!  │ Idle │────────>│ Connecting │───────>│ PendingAccept │─────────>│ Established │
//!  └──────┘         └────────────┘        └───────────────┘          └─────────────┘
//!                                                                      │   │   │
//!  incoming:                                                 disconnect│   │   │stop
//!  ┌──────┐ REQUEST ┌─────────────────┐ accept                         ↓   │   ↓
//!  │ Idle │────────>│ PendingDecision │───────> Established   Disconnecting│ Destroyed
//!  └──────┘         └─────────────────┘                                    ↓
//!                                                     DISCONNECT / channel error: Lost
//! ```
//!
//! Reject, withdraw and channel failure before Established return to Idle and
//! close the channel. So does a handshake that waits too long (see
//! [`Connection::tick`]).

use std::time::Duration;

use tether_proto::{Opcode, Payload, payloads::handshake::Handshake};

use crate::{
    action::SessionAction,
    error::SessionError,
    event::ConnectionEvent,
    peer::{Conversation, LocalProfile, Peer},
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No handshake in progress
    Idle,
    /// Outgoing: opening the channel
    Connecting,
    /// Outgoing: request sent, waiting for the partner's decision
    PendingAccept,
    /// Incoming: request received, waiting for the local decision
    PendingDecision,
    /// Handshake complete; chat and file frames allowed
    Established,
    /// Local disconnect in progress
    Disconnecting,
    /// Partner disconnected or the channel failed
    Lost,
    /// Torn down by `stop`
    Destroyed,
}

impl ConnectionState {
    /// Handshake started but not decided.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Connecting | Self::PendingAccept | Self::PendingDecision)
    }

    /// Session ended; the channel is gone or going.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Disconnecting | Self::Lost | Self::Destroyed)
    }
}

/// Which side initiated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// We sent the request
    Outgoing,
    /// The partner sent the request
    Incoming,
}

/// Handshake and lifecycle state machine for one channel.
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    direction: Direction,
    profile: LocalProfile,
    /// Known up front for outgoing; filled from the request for incoming
    peer: Option<Peer>,
    /// Transport address of an incoming channel
    remote_address: Option<String>,
    established_at: Option<u64>,
}

impl Connection {
    /// Outgoing connection, waiting for [`Connection::begin_connect`].
    pub fn outgoing(profile: LocalProfile) -> Self {
        Self::new(Direction::Outgoing, profile, None)
    }

    /// Incoming connection on a channel from `remote_address`, waiting for
    /// the partner's request.
    pub fn incoming(profile: LocalProfile, remote_address: impl Into<String>) -> Self {
        Self::new(Direction::Incoming, profile, Some(remote_address.into()))
    }

    fn new(direction: Direction, profile: LocalProfile, remote_address: Option<String>) -> Self {
        Self {
            state: ConnectionState::Idle,
            direction,
            profile,
            peer: None,
            remote_address,
            established_at: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Which side initiated
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Partner, once known
    pub fn peer(&self) -> Option<&Peer> {
        self.peer.as_ref()
    }

    /// Unix millis at which the handshake completed
    pub fn established_at(&self) -> Option<u64> {
        self.established_at
    }

    /// Local profile announced in handshake frames
    pub fn profile(&self) -> &LocalProfile {
        &self.profile
    }

    /// Incoming channel on which the partner has not sent a request yet.
    pub fn awaits_request(&self) -> bool {
        self.state == ConnectionState::Idle
            && self.direction == Direction::Incoming
            && self.peer.is_none()
    }

    /// Waiting on the partner or the local user to move the handshake on.
    pub fn awaits_handshake(&self) -> bool {
        match self.state {
            ConnectionState::Idle => self.awaits_request(),
            ConnectionState::PendingAccept | ConnectionState::PendingDecision => true,
            _ => false,
        }
    }

    fn invalid(&self, operation: &'static str) -> SessionError {
        SessionError::InvalidState { state: self.state, operation }
    }

    /// Start an outgoing attempt.
    ///
    /// # Errors
    ///
    /// - `SessionError::AlreadyPending` if an attempt or session exists
    /// - `SessionError::InvalidState` on an incoming connection
    pub fn begin_connect(&mut self, peer: Peer) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::Idle || self.peer.is_some() {
            return Err(SessionError::AlreadyPending { state: self.state });
        }
        if self.direction != Direction::Outgoing {
            return Err(self.invalid("connect"));
        }

        self.state = ConnectionState::Connecting;
        self.peer = Some(peer.clone());
        Ok(vec![SessionAction::emit(ConnectionEvent::Connecting { peer })])
    }

    /// Channel is open; send the request.
    pub fn channel_opened(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::Connecting {
            return Err(self.invalid("open channel"));
        }

        let request = SessionAction::send(Payload::HandshakeRequest(self.profile.handshake()))?;
        self.state = ConnectionState::PendingAccept;
        Ok(vec![request])
    }

    /// Channel could not be opened.
    pub fn connect_failed(&mut self, reason: &str) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::Connecting {
            return Err(self.invalid("fail connect"));
        }

        self.state = ConnectionState::Idle;
        Ok(vec![SessionAction::emit(ConnectionEvent::ConnectionFailed {
            reason: reason.to_string(),
        })])
    }

    /// Accept the pending incoming request.
    pub fn accept(&mut self, now_millis: u64) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::PendingDecision {
            return Err(self.invalid("accept"));
        }
        let Some(peer) = self.peer.as_ref() else {
            return Err(self.invalid("accept"));
        };

        let conversation = Conversation::with_peer(peer, now_millis);
        let reply = SessionAction::send(Payload::HandshakeAccept(self.profile.handshake()))?;
        self.state = ConnectionState::Established;
        self.established_at = Some(now_millis);

        Ok(vec![reply, SessionAction::emit(ConnectionEvent::ConnectedIn(conversation))])
    }

    /// Reject the pending incoming request.
    pub fn reject(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::PendingDecision {
            return Err(self.invalid("reject"));
        }

        let reply = SessionAction::send(Payload::HandshakeReject(self.profile.handshake()))?;
        self.state = ConnectionState::Idle;

        Ok(vec![
            reply,
            SessionAction::close("connection rejected"),
            SessionAction::emit(ConnectionEvent::ConnectionRejected),
        ])
    }

    /// Take back our outgoing request before the partner decides.
    pub fn withdraw(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::PendingAccept {
            return Err(self.invalid("withdraw"));
        }

        let notice = SessionAction::send(Payload::HandshakeWithdraw)?;
        self.state = ConnectionState::Idle;

        Ok(vec![
            notice,
            SessionAction::close("connection withdrawn"),
            SessionAction::emit(ConnectionEvent::ConnectionWithdrawn),
        ])
    }

    /// End the established session.
    pub fn disconnect(&mut self) -> Result<Vec<SessionAction>, SessionError> {
        if self.state != ConnectionState::Established {
            return Err(self.invalid("disconnect"));
        }

        let notice = SessionAction::send(Payload::Disconnect)?;
        self.state = ConnectionState::Disconnecting;

        Ok(vec![
            notice,
            SessionAction::close("disconnected"),
            SessionAction::emit(ConnectionEvent::Disconnected),
        ])
    }

    /// Tear down from any state. Repeated calls are no-ops.
    pub fn destroy(&mut self) -> Vec<SessionAction> {
        if self.state == ConnectionState::Destroyed {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.state == ConnectionState::Established {
            // Best effort: the partner sees a clean disconnect if the frame
            // makes it out before the channel closes.
            if let Ok(notice) = SessionAction::send(Payload::Disconnect) {
                actions.push(notice);
            }
        }

        self.state = ConnectionState::Destroyed;
        actions.push(SessionAction::close("session destroyed"));
        actions.push(SessionAction::emit(ConnectionEvent::ConnectionDestroyed));
        actions
    }

    /// The channel closed or failed underneath us.
    pub fn transport_closed(&mut self, reason: &str) -> Vec<SessionAction> {
        let event = match self.state {
            ConnectionState::Connecting | ConnectionState::PendingAccept => {
                self.state = ConnectionState::Idle;
                ConnectionEvent::ConnectionFailed { reason: reason.to_string() }
            },
            ConnectionState::PendingDecision => {
                self.state = ConnectionState::Idle;
                ConnectionEvent::ConnectionWithdrawn
            },
            ConnectionState::Established => {
                self.state = ConnectionState::Lost;
                ConnectionEvent::ConnectionLost { reason: reason.to_string() }
            },
            ConnectionState::Idle
            | ConnectionState::Disconnecting
            | ConnectionState::Lost
            | ConnectionState::Destroyed => return Vec::new(),
        };

        vec![SessionAction::emit(event)]
    }

    /// Give up a handshake that has been waiting `elapsed`, once that exceeds
    /// `timeout`.
    ///
    /// - incoming channel without a request: closed, nothing reported
    /// - our request unanswered: withdrawn, `ConnectionFailed`
    /// - partner's request undecided: rejected, `ConnectionWithdrawn`
    pub fn tick(&mut self, elapsed: Duration, timeout: Duration) -> Vec<SessionAction> {
        if !self.awaits_handshake() || elapsed <= timeout {
            return Vec::new();
        }

        let reason = format!("handshake timeout after {elapsed:?}");
        let (notice, event) = match self.state {
            ConnectionState::PendingAccept => (
                Some(Payload::HandshakeWithdraw),
                Some(ConnectionEvent::ConnectionFailed { reason: reason.clone() }),
            ),
            ConnectionState::PendingDecision => (
                Some(Payload::HandshakeReject(self.profile.handshake())),
                Some(ConnectionEvent::ConnectionWithdrawn),
            ),
            _ => (None, None),
        };
        tracing::info!(state = ?self.state, "{reason}");
        self.state = ConnectionState::Idle;

        let mut actions = Vec::new();
        if let Some(notice) = notice.and_then(|payload| SessionAction::send(payload).ok()) {
            actions.push(notice);
        }
        actions.push(SessionAction::close(reason));
        if let Some(event) = event {
            actions.push(SessionAction::emit(event));
        }
        actions
    }

    /// Process a handshake or disconnect frame.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnexpectedFrame` if the frame is not valid in this
    ///   state or direction
    /// - `SessionError::Protocol` if `payload` does not match `opcode`
    pub fn handle_frame(
        &mut self,
        payload: Payload,
        now_millis: u64,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let opcode = payload.opcode();

        match (self.state, payload) {
            (ConnectionState::Idle, Payload::HandshakeRequest(hello))
                if self.direction == Direction::Incoming && self.peer.is_none() =>
            {
                self.handle_request(&hello)
            },

            (ConnectionState::PendingAccept, Payload::HandshakeAccept(reply)) => {
                if reply.version != tether_proto::PROTOCOL_VERSION {
                    self.state = ConnectionState::Idle;
                    return Ok(vec![
                        SessionAction::close("unsupported protocol version"),
                        SessionAction::emit(ConnectionEvent::ConnectionFailed {
                            reason: SessionError::UnsupportedVersion(reply.version).to_string(),
                        }),
                    ]);
                }

                let Some(peer) = self.peer.as_ref() else {
                    return Err(self.unexpected(opcode));
                };
                let conversation = Conversation::with_peer(peer, now_millis);
                self.state = ConnectionState::Established;
                self.established_at = Some(now_millis);

                Ok(vec![
                    SessionAction::emit(ConnectionEvent::ConnectionAccepted),
                    SessionAction::emit(ConnectionEvent::ConnectedOut(conversation)),
                ])
            },

            (ConnectionState::PendingAccept, Payload::HandshakeReject(_)) => {
                self.state = ConnectionState::Idle;
                Ok(vec![
                    SessionAction::close("connection rejected by partner"),
                    SessionAction::emit(ConnectionEvent::ConnectionRejected),
                ])
            },

            (
                ConnectionState::PendingAccept | ConnectionState::PendingDecision,
                Payload::HandshakeWithdraw,
            ) => {
                self.state = ConnectionState::Idle;
                Ok(vec![
                    SessionAction::close("connection withdrawn by partner"),
                    SessionAction::emit(ConnectionEvent::ConnectionWithdrawn),
                ])
            },

            (ConnectionState::Established, Payload::Disconnect) => {
                self.state = ConnectionState::Lost;
                Ok(vec![
                    SessionAction::close("partner disconnected"),
                    SessionAction::emit(ConnectionEvent::ConnectionLost {
                        reason: "partner disconnected".to_string(),
                    }),
                ])
            },

            // Both sides disconnected at once; ours already closes the channel
            (ConnectionState::Disconnecting, Payload::Disconnect) => Ok(Vec::new()),

            _ => Err(self.unexpected(opcode)),
        }
    }

    fn handle_request(&mut self, hello: &Handshake) -> Result<Vec<SessionAction>, SessionError> {
        if hello.version != tether_proto::PROTOCOL_VERSION {
            // Refuse without bothering the user
            let reply = SessionAction::send(Payload::HandshakeReject(self.profile.handshake()))?;
            return Ok(vec![reply, SessionAction::close("unsupported protocol version")]);
        }

        let address = self.remote_address.clone().unwrap_or_default();
        let peer = Peer::new(address, hello.name.clone(), hello.color & 0x00FF_FFFF);
        self.peer = Some(peer.clone());
        self.state = ConnectionState::PendingDecision;

        Ok(vec![SessionAction::emit(ConnectionEvent::IncomingRequest(peer))])
    }

    fn unexpected(&self, opcode: Opcode) -> SessionError {
        SessionError::UnexpectedFrame { state: self.state, opcode: opcode.to_u8() }
    }
}
