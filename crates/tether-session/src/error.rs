//! Transport error types.

use std::io;

use tether_core::SessionError;
use tether_proto::ProtocolError;
use thiserror::Error;

/// Errors raised by a [`crate::Transport`] or while moving frames over it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Address could not be parsed or resolved
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress {
        /// Address as given
        address: String,
        /// Why it was rejected
        reason: String,
    },

    /// Socket operation failed
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// Byte stream could not be decoded; the channel is out of sync
    #[error("stream error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Transport failures surface to the application as session transport errors
impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use tether_core::ErrorKind;

    use super::*;

    #[test]
    fn converts_to_transport_kind() {
        let err: SessionError =
            TransportError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")).into();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.to_string().contains("reset"));
    }

    #[test]
    fn stream_errors_wrap_protocol_errors() {
        let err = TransportError::from(ProtocolError::PayloadTooLarge { size: 10, max: 5 });
        assert!(matches!(err, TransportError::Protocol(_)));
    }
}
