//! Error types for the session engine.
//!
//! One flat enum covers every layer above the codec so the facade can hand the
//! same type to the application. [`SessionError::kind`] tells the caller how
//! the failure affects the session.

use thiserror::Error;

use crate::connection::ConnectionState;

/// How an error affects the session it occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The channel is unusable; the session ends up LOST or never starts
    Transport,
    /// A frame or transfer was malformed; it is dropped, the session survives
    Protocol,
    /// The operation is not valid right now; nothing changed
    State,
    /// A local file could not be read or written
    Io,
}

/// Errors that can occur during session operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation not valid in the current connection state
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// Another connection is already being set up or is active
    #[error("a connection is already pending or established ({state:?})")]
    AlreadyPending {
        /// State of the existing connection
        state: ConnectionState,
    },

    /// An outgoing file transfer is already running
    #[error("a file is already being sent")]
    TransferBusy,

    /// Cancel or chunk requested with no matching transfer
    #[error("no file transfer is active")]
    NoActiveTransfer,

    /// `mark_seen` for a message that was not received or was already seen
    #[error("no unseen received message with id {0}")]
    UnknownMessage(String),

    /// Received frame not valid in the current state
    #[error("unexpected frame: received opcode {opcode:#04x} in state {state:?}")]
    UnexpectedFrame {
        /// Current state when frame was received
        state: ConnectionState,
        /// Opcode of the unexpected frame
        opcode: u8,
    },

    /// Peer speaks a different protocol version
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Frame parsing or transfer validation failed
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),

    /// Local file error
    #[error("file error: {0}")]
    Io(String),
}

impl SessionError {
    /// Classify this error by its effect on the session.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. }
            | Self::AlreadyPending { .. }
            | Self::TransferBusy
            | Self::NoActiveTransfer
            | Self::UnknownMessage(_) => ErrorKind::State,
            Self::UnexpectedFrame { .. } | Self::UnsupportedVersion(_) | Self::Protocol(_) => {
                ErrorKind::Protocol
            },
            Self::Transport(_) => ErrorKind::Transport,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Convert codec errors to `SessionError`
impl From<tether_proto::ProtocolError> for SessionError {
    fn from(err: tether_proto::ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}
