//! Frame type discriminator.

/// Operation code identifying the payload type of a frame.
///
/// Values are grouped by concern: `0x0_` handshake and session control,
/// `0x1_` chat messages, `0x2_` file transfer.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Ask the peer to open a session
    HandshakeRequest = 0x01,
    /// Peer accepted the session
    HandshakeAccept = 0x02,
    /// Peer rejected the session
    HandshakeReject = 0x03,
    /// Pending request withdrawn
    HandshakeWithdraw = 0x04,
    /// Graceful end of an established session
    Disconnect = 0x05,
    /// Chat message
    TextMessage = 0x10,
    /// Message reached the peer
    DeliveredAck = 0x11,
    /// Message was read by the peer
    SeenAck = 0x12,
    /// File transfer metadata
    FileStart = 0x20,
    /// One slice of file data
    FileChunk = 0x21,
    /// File transfer complete
    FileEnd = 0x22,
    /// File transfer aborted
    FileCancel = 0x23,
}

impl Opcode {
    /// Every opcode, in discriminator order.
    pub const ALL: [Self; 12] = [
        Self::HandshakeRequest,
        Self::HandshakeAccept,
        Self::HandshakeReject,
        Self::HandshakeWithdraw,
        Self::Disconnect,
        Self::TextMessage,
        Self::DeliveredAck,
        Self::SeenAck,
        Self::FileStart,
        Self::FileChunk,
        Self::FileEnd,
        Self::FileCancel,
    ];

    /// Raw discriminator byte.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a discriminator byte. `None` if unrecognized.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::HandshakeRequest),
            0x02 => Some(Self::HandshakeAccept),
            0x03 => Some(Self::HandshakeReject),
            0x04 => Some(Self::HandshakeWithdraw),
            0x05 => Some(Self::Disconnect),
            0x10 => Some(Self::TextMessage),
            0x11 => Some(Self::DeliveredAck),
            0x12 => Some(Self::SeenAck),
            0x20 => Some(Self::FileStart),
            0x21 => Some(Self::FileChunk),
            0x22 => Some(Self::FileEnd),
            0x23 => Some(Self::FileCancel),
            _ => None,
        }
    }

    /// Handshake frames are the only ones allowed before the session is
    /// established.
    #[must_use]
    pub const fn is_handshake(self) -> bool {
        matches!(
            self,
            Self::HandshakeRequest
                | Self::HandshakeAccept
                | Self::HandshakeReject
                | Self::HandshakeWithdraw
        )
    }

    /// File transfer frames.
    #[must_use]
    pub const fn is_file_transfer(self) -> bool {
        matches!(self, Self::FileStart | Self::FileChunk | Self::FileEnd | Self::FileCancel)
    }
}
