//! Frame header with zero-copy parsing.
//!
//! The header is a fixed 5-byte structure: one opcode byte followed by the
//! payload length as a big-endian `u32`.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 5-byte frame header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so the packed layout has no alignment
/// requirements and every 5-byte pattern is a valid header.
///
/// # Invariants
///
/// - `payload_size()` never exceeds [`FrameHeader::MAX_PAYLOAD_SIZE`] for a
///   header returned by [`FrameHeader::from_bytes`].
/// - The opcode byte is NOT validated here. Unknown opcodes survive framing so
///   the stream stays in sync; they are rejected when the payload is parsed.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameHeader {
    pub(crate) opcode: u8,
    pub(crate) payload_size: [u8; 4],
}

impl FrameHeader {
    /// Size of the serialized header (5 bytes)
    pub const SIZE: usize = 5;

    /// Hard upper bound on payload size (16 MB).
    ///
    /// Decoders may be configured with a lower limit, never a higher one.
    pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

    /// Create a header for `opcode` with an empty payload.
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode: opcode.to_u8(), payload_size: [0; 4] }
    }

    /// Parse header from network bytes (zero-copy)
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 5 bytes are available
    /// - `ProtocolError::PayloadTooLarge` if the declared size exceeds
    ///   [`Self::MAX_PAYLOAD_SIZE`]
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort {
                expected: Self::SIZE,
                actual: bytes.len(),
            })?
            .0;

        let payload_size = header.payload_size();
        if payload_size > Self::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_size as usize,
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Operation code as raw byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> u32 {
        u32::from_be_bytes(self.payload_size)
    }

    /// Set payload size.
    pub fn set_payload_size(&mut self, size: u32) {
        self.payload_size = size.to_be_bytes();
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let opcode = self.opcode;
        let mut debug = f.debug_struct("FrameHeader");
        match self.opcode_enum() {
            Some(known) => debug.field("opcode", &known),
            None => debug.field("opcode", &format!("{opcode:#04x}")),
        };
        debug.field("payload_size", &self.payload_size()).finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for FrameHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for FrameHeader {}
