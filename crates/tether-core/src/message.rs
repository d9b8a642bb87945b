//! Chat message exchange.
//!
//! Tracks our own messages until the partner acknowledges them and the
//! partner's messages until the user has seen them. Message frames are only
//! produced and consumed while the session is established; the gate lives in
//! [`crate::Session`].
//!
//! ```text
//! own message:   Sent ──DELIVERED_ACK──> Delivered ──SEEN_ACK──> Seen
//!                  │
//!                  └── session leaves Established ──> Failed (reported once)
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
};

use tether_proto::{
    MessageKind, Payload,
    payloads::chat::{Receipt, TextMessage},
};

use crate::{
    action::SessionAction, env::Environment, error::SessionError, event::MessageEvent,
};

/// Delivery status of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    /// Written to the channel, no receipt yet
    Sent,
    /// Partner acknowledged receipt
    Delivered,
    /// Partner read it
    Seen,
    /// Session ended before the partner acknowledged it
    Failed,
}

/// A chat message as seen by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Unique id generated by the sender
    pub id: String,
    /// Content kind
    pub kind: MessageKind,
    /// Text, or file name for image messages
    pub text: String,
    /// Local file for image messages
    pub file: Option<PathBuf>,
    /// Send time in Unix milliseconds
    pub timestamp: u64,
    /// True for messages we wrote
    pub own: bool,
    /// Delivery status
    pub status: DeliveryStatus,
}

/// Generates strictly increasing message ids from the wall clock.
///
/// Ids are the decimal nanosecond timestamp. Two messages in the same
/// nanosecond (or a clock that steps backwards) bump the previous id by one.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    last: u128,
}

impl IdGenerator {
    /// Next id, strictly greater than every id returned before.
    pub fn next_id<E: Environment>(&mut self, env: &E) -> String {
        let id = env.unix_nanos().max(self.last + 1);
        self.last = id;
        id.to_string()
    }
}

/// Per-session message bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct MessageExchange {
    ids: IdGenerator,
    /// Own messages not yet seen by the partner
    outstanding: HashMap<String, DeliveryStatus>,
    /// Partner messages not yet marked seen locally
    unseen: HashSet<String>,
}

impl MessageExchange {
    /// Create an empty exchange.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh message id.
    pub fn next_id<E: Environment>(&mut self, env: &E) -> String {
        self.ids.next_id(env)
    }

    /// Status of an own message still being tracked.
    pub fn status(&self, id: &str) -> Option<DeliveryStatus> {
        self.outstanding.get(id).copied()
    }

    /// Own messages still waiting for a delivery receipt.
    pub fn pending_count(&self) -> usize {
        self.outstanding.values().filter(|s| **s == DeliveryStatus::Sent).count()
    }

    /// Write a text message and start waiting for its receipt.
    pub fn send<E: Environment>(
        &mut self,
        env: &E,
        text: String,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let message = ChatMessage {
            id: self.next_id(env),
            kind: MessageKind::Text,
            text,
            file: None,
            timestamp: env.unix_millis(),
            own: true,
            status: DeliveryStatus::Sent,
        };

        let frame = SessionAction::send(Payload::TextMessage(TextMessage {
            id: message.id.clone(),
            kind: message.kind,
            text: message.text.clone(),
            timestamp: message.timestamp,
        }))?;

        self.outstanding.insert(message.id.clone(), DeliveryStatus::Sent);
        Ok(vec![frame, SessionAction::emit(MessageEvent::Sent(message))])
    }

    /// Partner message arrived: acknowledge it, then surface it.
    pub fn on_message(&mut self, msg: TextMessage) -> Result<Vec<SessionAction>, SessionError> {
        if msg.kind == MessageKind::Control {
            tracing::debug!(id = %msg.id, text = %msg.text, "control message");
            return Ok(Vec::new());
        }

        let ack = SessionAction::send(Payload::DeliveredAck(Receipt { id: msg.id.clone() }))?;
        self.unseen.insert(msg.id.clone());

        let message = ChatMessage {
            id: msg.id,
            kind: msg.kind,
            text: msg.text,
            file: None,
            timestamp: msg.timestamp,
            own: false,
            status: DeliveryStatus::Delivered,
        };

        Ok(vec![ack, SessionAction::emit(MessageEvent::Received(message))])
    }

    /// Partner acknowledged receipt of one of our messages.
    pub fn on_delivered(&mut self, id: String) -> Vec<SessionAction> {
        match self.outstanding.get_mut(&id) {
            Some(status) if *status == DeliveryStatus::Sent => {
                *status = DeliveryStatus::Delivered;
                vec![SessionAction::emit(MessageEvent::Delivered(id))]
            },
            _ => {
                tracing::debug!(%id, "receipt for unknown or already delivered message");
                Vec::new()
            },
        }
    }

    /// Partner read one of our messages.
    ///
    /// A seen receipt implies delivery; if the delivery receipt never
    /// arrived, both transitions are reported.
    pub fn on_seen(&mut self, id: String) -> Vec<SessionAction> {
        match self.outstanding.remove(&id) {
            Some(DeliveryStatus::Delivered) => vec![SessionAction::emit(MessageEvent::Seen(id))],
            Some(DeliveryStatus::Sent) => vec![
                SessionAction::emit(MessageEvent::Delivered(id.clone())),
                SessionAction::emit(MessageEvent::Seen(id)),
            ],
            _ => {
                tracing::debug!(%id, "seen receipt for unknown message");
                Vec::new()
            },
        }
    }

    /// The user read a partner message; tell the partner.
    ///
    /// # Errors
    ///
    /// - `SessionError::UnknownMessage` if `id` was not received in this
    ///   session or was already marked seen
    pub fn mark_seen(&mut self, id: &str) -> Result<Vec<SessionAction>, SessionError> {
        if !self.unseen.remove(id) {
            return Err(SessionError::UnknownMessage(id.to_string()));
        }
        Ok(vec![SessionAction::send(Payload::SeenAck(Receipt { id: id.to_string() }))?])
    }

    /// Session left Established: every message still waiting for a delivery
    /// receipt fails, reported once in send order.
    pub fn fail_pending(&mut self) -> Vec<SessionAction> {
        let mut failed: Vec<String> = self
            .outstanding
            .drain()
            .filter(|(_, status)| *status == DeliveryStatus::Sent)
            .map(|(id, _)| id)
            .collect();
        self.unseen.clear();

        // Ids are decimal timestamps: shorter means older
        failed.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        failed
            .into_iter()
            .map(|id| SessionAction::emit(MessageEvent::NotDelivered(id)))
            .collect()
    }
}
