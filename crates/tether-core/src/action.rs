//! Actions produced by the session engine.

use bytes::Bytes;
use tether_proto::{Frame, Payload};

use crate::{error::SessionError, event::SessionEvent, message::ChatMessage};

/// Work the caller must perform, in order.
///
/// - `Send`: write the frame to the channel
/// - `Close`: flush queued frames, then close the channel
/// - `Emit`: deliver the event to the matching listener
/// - `*IncomingFile`: operate on the partial file of the incoming transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this frame to the peer
    Send(Frame),

    /// Close the channel after pending frames are written
    Close {
        /// Reason for closing the channel
        reason: String,
    },

    /// Notify the application
    Emit(SessionEvent),

    /// Create the partial file for an incoming transfer
    OpenIncomingFile {
        /// Sanitized file name (no directory components)
        name: String,
        /// Announced size in bytes
        size: u64,
    },

    /// Append data to the partial file, then report `ReceivingProgress`
    /// with these counters once it is written
    AppendIncomingFile {
        /// Chunk payload
        data: Bytes,
        /// Bytes received including this chunk
        received: u64,
        /// Announced size in bytes
        total: u64,
    },

    /// Move the partial file into place, then report the finished transfer
    /// and the resulting chat message (with `file` set to the final path)
    CompleteIncomingFile {
        /// Message describing the received file
        message: ChatMessage,
    },

    /// Delete the partial file
    DiscardIncomingFile,
}

impl SessionAction {
    pub(crate) fn send(payload: Payload) -> Result<Self, SessionError> {
        Ok(Self::Send(payload.into_frame()?))
    }

    pub(crate) fn emit(event: impl Into<SessionEvent>) -> Self {
        Self::Emit(event.into())
    }

    pub(crate) fn close(reason: impl Into<String>) -> Self {
        Self::Close { reason: reason.into() }
    }
}
