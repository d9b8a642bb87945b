//! Protocol error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while framing or parsing protocol data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer shorter than a frame header
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Declared or actual payload exceeds the allowed maximum
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Payload size in bytes
        size: usize,
        /// Maximum permitted size
        max: usize,
    },

    /// Frame header declares a payload above the reader's limit; the payload
    /// is skipped
    #[error("frame too large: opcode {opcode:#04x} declares {size} bytes, limit is {max}")]
    OversizedFrame {
        /// Raw opcode of the dropped frame
        opcode: u8,
        /// Declared payload size in bytes
        size: usize,
        /// Limit of the reader
        max: usize,
    },

    /// Stream ended before the declared payload arrived
    #[error("frame truncated: expected {expected} payload bytes, got {actual}")]
    FrameTruncated {
        /// Declared payload size
        expected: usize,
        /// Bytes received before the stream ended
        actual: usize,
    },

    /// Opcode byte does not name a known frame type
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// CBOR serialization failed
    #[error("CBOR encode failed: {0}")]
    CborEncode(String),

    /// CBOR deserialization failed
    #[error("CBOR decode failed: {0}")]
    CborDecode(String),

    /// Raw (non-CBOR) payload has the wrong shape
    #[error("malformed payload: {0}")]
    MalformedPayload(&'static str),
}

impl ProtocolError {
    /// Returns true if the byte stream can no longer be trusted after this
    /// error.
    ///
    /// A truncated stream, or an oversized header met outside the stream
    /// decoder, leaves no reliable frame boundary, so the channel must be
    /// closed. All other errors affect a single frame, which is dropped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PayloadTooLarge { .. } | Self::FrameTruncated { .. })
    }
}
