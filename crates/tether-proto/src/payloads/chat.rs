//! Chat message payload types.

use serde::{Deserialize, Serialize};

/// What a chat message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Plain text typed by the user
    Text,
    /// Reference to a transferred image file
    Image,
    /// Signaling that is never shown as chat content
    Control,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// Sender-generated unique id, echoed in receipts
    pub id: String,

    /// Payload kind
    pub kind: MessageKind,

    /// Message body
    pub text: String,

    /// Send time in Unix milliseconds (UTC)
    pub timestamp: u64,
}

/// Delivery or seen receipt for a message id.
///
/// The receipt type is given by the opcode (`DeliveredAck` or `SeenAck`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Id of the acknowledged message
    pub id: String,
}
