//! Typed frame payloads.
//!
//! Frame headers are raw binary; structured payloads use CBOR for type safety
//! and forward compatibility. File chunks are the exception and travel as raw
//! bytes (see [`file::FileChunk`]).
//!
//! # Invariants
//!
//! Each payload variant maps to exactly one opcode (enforced by match
//! exhaustiveness). Round-trip encoding must produce identical values.

pub mod chat;
pub mod file;
pub mod handshake;

use bytes::BufMut;
pub use chat::MessageKind;
use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Frame, FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// All possible frame payloads
///
/// The payload type is determined by the `Opcode` in the frame header, so only
/// the inner struct content is serialized (no variant tag in CBOR).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    // Handshake
    /// Ask the peer to open a session
    HandshakeRequest(handshake::Handshake),
    /// Accept a pending request
    HandshakeAccept(handshake::Handshake),
    /// Reject a pending request
    HandshakeReject(handshake::Handshake),
    /// Withdraw a pending request
    HandshakeWithdraw,
    /// End an established session
    Disconnect,

    // Chat
    /// Chat message
    TextMessage(chat::TextMessage),
    /// Message delivered to the peer
    DeliveredAck(chat::Receipt),
    /// Message read by the peer
    SeenAck(chat::Receipt),

    // File transfer
    /// Transfer metadata
    FileStart(file::FileStart),
    /// Transfer data
    FileChunk(file::FileChunk),
    /// Transfer complete
    FileEnd(file::FileEnd),
    /// Transfer aborted
    FileCancel(file::FileCancel),
}

fn to_cbor<T: Serialize>(value: &T, dst: &mut impl BufMut) -> Result<()> {
    ciborium::ser::into_writer(value, dst.writer())
        .map_err(|e| ProtocolError::CborEncode(e.to_string()))
}

fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
}

impl Payload {
    /// Opcode corresponding to this payload type.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::HandshakeRequest(_) => Opcode::HandshakeRequest,
            Self::HandshakeAccept(_) => Opcode::HandshakeAccept,
            Self::HandshakeReject(_) => Opcode::HandshakeReject,
            Self::HandshakeWithdraw => Opcode::HandshakeWithdraw,
            Self::Disconnect => Opcode::Disconnect,
            Self::TextMessage(_) => Opcode::TextMessage,
            Self::DeliveredAck(_) => Opcode::DeliveredAck,
            Self::SeenAck(_) => Opcode::SeenAck,
            Self::FileStart(_) => Opcode::FileStart,
            Self::FileChunk(_) => Opcode::FileChunk,
            Self::FileEnd(_) => Opcode::FileEnd,
            Self::FileCancel(_) => Opcode::FileCancel,
        }
    }

    /// Encode payload to buffer
    ///
    /// Size limits are NOT checked here; [`Frame::encode`] enforces them.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::HandshakeRequest(inner)
            | Self::HandshakeAccept(inner)
            | Self::HandshakeReject(inner) => to_cbor(inner, dst),
            Self::HandshakeWithdraw | Self::Disconnect => Ok(()), // Zero-byte payloads
            Self::TextMessage(inner) => to_cbor(inner, dst),
            Self::DeliveredAck(inner) | Self::SeenAck(inner) => to_cbor(inner, dst),
            Self::FileStart(inner) => to_cbor(inner, dst),
            Self::FileChunk(inner) => {
                inner.encode(dst);
                Ok(())
            },
            Self::FileEnd(inner) => to_cbor(inner, dst),
            Self::FileCancel(inner) => to_cbor(inner, dst),
        }
    }

    /// Decode payload from bytes based on opcode
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if bytes exceed `MAX_PAYLOAD_SIZE`
    /// - `ProtocolError::CborDecode` if CBOR deserialization fails
    /// - `ProtocolError::MalformedPayload` if a raw payload is too short
    pub fn decode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match opcode {
            Opcode::HandshakeRequest => Self::HandshakeRequest(from_cbor(bytes)?),
            Opcode::HandshakeAccept => Self::HandshakeAccept(from_cbor(bytes)?),
            Opcode::HandshakeReject => Self::HandshakeReject(from_cbor(bytes)?),
            Opcode::HandshakeWithdraw => Self::HandshakeWithdraw,
            Opcode::Disconnect => Self::Disconnect,
            Opcode::TextMessage => Self::TextMessage(from_cbor(bytes)?),
            Opcode::DeliveredAck => Self::DeliveredAck(from_cbor(bytes)?),
            Opcode::SeenAck => Self::SeenAck(from_cbor(bytes)?),
            Opcode::FileStart => Self::FileStart(from_cbor(bytes)?),
            Opcode::FileChunk => Self::FileChunk(file::FileChunk::decode(bytes)?),
            Opcode::FileEnd => Self::FileEnd(from_cbor(bytes)?),
            Opcode::FileCancel => Self::FileCancel(from_cbor(bytes)?),
        };

        Ok(payload)
    }

    /// Convert payload into a transport frame
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    pub fn into_frame(self) -> Result<Frame> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Frame::new(FrameHeader::new(self.opcode()), buf))
    }

    /// Parse payload from a raw transport frame
    ///
    /// # Errors
    ///
    /// - `ProtocolError::UnknownOpcode` if the opcode is not recognized
    /// - Any error from [`Payload::decode`]
    pub fn from_frame(frame: &Frame) -> Result<Self> {
        let opcode = frame
            .header
            .opcode_enum()
            .ok_or(ProtocolError::UnknownOpcode(frame.header.opcode()))?;
        Self::decode(opcode, &frame.payload)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn empty_payloads_round_trip() {
        for payload in [Payload::HandshakeWithdraw, Payload::Disconnect] {
            let frame = payload.clone().into_frame().expect("should create frame");
            assert!(frame.payload.is_empty());
            let decoded = Payload::from_frame(&frame).expect("should parse payload");
            assert_eq!(payload, decoded);
        }
    }

    #[test]
    fn text_message_round_trip() {
        let payload = Payload::TextMessage(chat::TextMessage {
            id: "1700000000000000001".to_string(),
            kind: MessageKind::Text,
            text: "hi".to_string(),
            timestamp: 1_700_000_000_000,
        });

        let frame = payload.clone().into_frame().expect("should create frame");
        assert_eq!(frame.opcode(), Some(Opcode::TextMessage));
        let decoded = Payload::from_frame(&frame).expect("should parse payload");
        assert_eq!(payload, decoded);
    }

    #[test]
    fn file_chunk_wire_layout() {
        let payload = Payload::FileChunk(file::FileChunk {
            seq: 2,
            data: Bytes::from_static(&[0xAB, 0xCD]),
        });

        let frame = payload.clone().into_frame().expect("should create frame");
        assert_eq!(frame.payload.as_ref(), &[0, 0, 0, 2, 0xAB, 0xCD]);
        assert_eq!(Payload::from_frame(&frame).expect("should parse"), payload);
    }

    #[test]
    fn short_file_chunk_rejected() {
        let result = Payload::decode(Opcode::FileChunk, &[0, 1]);
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn unknown_opcode_rejected() {
        let frame = Frame::new(FrameHeader { opcode: 0x7f, payload_size: [0; 4] }, Bytes::new());
        assert_eq!(Payload::from_frame(&frame), Err(ProtocolError::UnknownOpcode(0x7f)));
    }

    #[test]
    fn garbage_cbor_rejected() {
        let result = Payload::decode(Opcode::HandshakeRequest, &[0xff, 0x00, 0x13]);
        assert!(matches!(result, Err(ProtocolError::CborDecode(_))));
    }
}
