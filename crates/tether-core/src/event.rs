//! Events surfaced to the application.
//!
//! Events are grouped the way listeners subscribe to them: connection
//! lifecycle, chat messages, and file transfer. The facade routes each group to
//! its own listener slot.

use std::path::PathBuf;

use crate::{
    message::ChatMessage,
    peer::{Conversation, Peer},
};

/// Connection lifecycle notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Outgoing attempt started
    Connecting {
        /// Peer being contacted
        peer: Peer,
    },
    /// A peer asked to connect; answer with accept or reject
    IncomingRequest(Peer),
    /// The requesting side withdrew before a decision was made
    ConnectionWithdrawn,
    /// The partner accepted our request
    ConnectionAccepted,
    /// The request was rejected (by either side)
    ConnectionRejected,
    /// Session established from an incoming request
    ConnectedIn(Conversation),
    /// Session established from an outgoing request
    ConnectedOut(Conversation),
    /// Established session ended without a local disconnect
    ConnectionLost {
        /// What ended it
        reason: String,
    },
    /// Outgoing attempt did not reach a decision
    ConnectionFailed {
        /// What went wrong
        reason: String,
    },
    /// Local disconnect completed
    Disconnected,
    /// Session torn down by `stop`
    ConnectionDestroyed,
}

/// Chat message notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageEvent {
    /// Partner message arrived (already acknowledged)
    Received(ChatMessage),
    /// Own message written to the channel
    Sent(ChatMessage),
    /// Partner confirmed receipt
    Delivered(String),
    /// Session ended before the partner confirmed receipt
    NotDelivered(String),
    /// Partner read the message
    Seen(String),
}

/// File transfer notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// Outgoing transfer announced
    SendingStarted {
        /// Local file being sent
        path: PathBuf,
        /// Total size in bytes
        total: u64,
    },
    /// Outgoing chunk written
    SendingProgress {
        /// Bytes written so far
        sent: u64,
        /// Total size in bytes
        total: u64,
    },
    /// Outgoing transfer completed
    SendingFinished,
    /// Outgoing transfer aborted by a local error or lost session
    SendingFailed {
        /// What went wrong
        reason: String,
    },
    /// Incoming transfer announced
    ReceivingStarted {
        /// Sanitized file name
        name: String,
        /// Total size in bytes
        total: u64,
    },
    /// Incoming chunk written to the partial file
    ReceivingProgress {
        /// Bytes received so far
        received: u64,
        /// Total size in bytes
        total: u64,
    },
    /// Incoming file complete and moved into place
    ReceivingFinished {
        /// Final location on disk
        path: PathBuf,
    },
    /// Incoming transfer aborted (bad data, disk error, lost session)
    ReceivingFailed {
        /// What went wrong
        reason: String,
    },
    /// A transfer was canceled on request
    TransferCanceled {
        /// True when the partner canceled, false when we did
        by_partner: bool,
    },
}

/// Any event, tagged with its listener category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection lifecycle
    Connection(ConnectionEvent),
    /// Chat messages
    Message(MessageEvent),
    /// File transfer
    File(FileEvent),
}

impl From<ConnectionEvent> for SessionEvent {
    fn from(event: ConnectionEvent) -> Self {
        Self::Connection(event)
    }
}

impl From<MessageEvent> for SessionEvent {
    fn from(event: MessageEvent) -> Self {
        Self::Message(event)
    }
}

impl From<FileEvent> for SessionEvent {
    fn from(event: FileEvent) -> Self {
        Self::File(event)
    }
}
