//! Frame type combining header and payload.
//!
//! A `Frame` is the transport-layer unit: the 5-byte [`FrameHeader`] followed
//! by the raw payload bytes. This is a pure data holder; see
//! [`Payload::into_frame`](crate::Payload::into_frame) and
//! [`Payload::from_frame`](crate::Payload::from_frame) for typed access.

use bytes::{BufMut, Bytes};

use crate::{
    FrameHeader, Opcode,
    errors::{ProtocolError, Result},
};

/// Complete protocol frame
///
/// Layout on the wire: `[FrameHeader: 5 bytes] + [payload: variable bytes]`
///
/// # Invariants
///
/// - Size Consistency: `payload.len()` matches `header.payload_size()`. This
///   is enforced by [`Frame::new`] and verified by [`Frame::decode`].
/// - Size Limit: frames whose payload exceeds
///   [`FrameHeader::MAX_PAYLOAD_SIZE`] can be constructed but never encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header (5 bytes)
    pub header: FrameHeader,

    /// Raw payload bytes
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame with automatic `payload_size` calculation
    ///
    /// Payloads longer than `u32::MAX` saturate the size field; such frames
    /// are rejected by [`Frame::encode`].
    #[must_use]
    pub fn new(mut header: FrameHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        header.set_payload_size(u32::try_from(payload.len()).unwrap_or(u32::MAX));
        Self { header, payload }
    }

    /// Frame with no payload.
    #[must_use]
    pub fn empty(opcode: Opcode) -> Self {
        Self::new(FrameHeader::new(opcode), Bytes::new())
    }

    /// Opcode as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.header.opcode_enum()
    }

    /// Bytes this frame occupies on the wire.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Encode frame into buffer
    ///
    /// Writes: `[header (5 bytes)] + [payload (variable)]`
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if payload exceeds
    ///   `MAX_PAYLOAD_SIZE` (16 MB)
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > FrameHeader::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: FrameHeader::MAX_PAYLOAD_SIZE as usize,
            });
        }

        debug_assert_eq!(self.payload.len(), self.header.payload_size() as usize);

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode a single frame from the front of `bytes`
    ///
    /// Trailing data after the frame is ignored. For a continuous stream use
    /// [`FrameDecoder`](crate::FrameDecoder), which tracks how many bytes each
    /// frame consumed.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` / `PayloadTooLarge` from header parsing
    /// - `ProtocolError::FrameTruncated` if fewer payload bytes are present
    ///   than the header claims
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = FrameHeader::from_bytes(bytes)?;

        let payload_size = header.payload_size() as usize;
        let total_size = FrameHeader::SIZE + payload_size;

        let Some(payload) = bytes.get(FrameHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: payload_size,
                actual: bytes.len().saturating_sub(FrameHeader::SIZE),
            });
        };

        Ok(Self { header: *header, payload: Bytes::copy_from_slice(payload) })
    }
}
