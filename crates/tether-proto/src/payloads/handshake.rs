//! Handshake payload types.

use serde::{Deserialize, Serialize};

/// Identity exchanged in handshake request, accept and reject frames.
///
/// The receiver learns the partner's display name and color from this payload;
/// the address comes from the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version spoken by the sender
    pub version: u8,

    /// Sender's display name
    pub name: String,

    /// Sender's display color (24-bit RGB)
    pub color: u32,
}
