//! Tether wire protocol.
//!
//! Every unit on the wire is a [`Frame`]: a 5-byte [`FrameHeader`] (opcode and
//! big-endian payload length) followed by the payload bytes. Structured
//! payloads are CBOR-encoded; file chunks travel as raw bytes.
//!
//! # Components
//!
//! - [`Frame`] / [`FrameHeader`]: transport-level framing
//! - [`Opcode`]: the frame type discriminator
//! - [`Payload`]: typed view of a frame's contents
//! - [`FrameDecoder`]: incremental decoder for a continuous byte stream

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod decoder;
pub mod errors;
mod frame;
mod header;
mod opcode;
pub mod payloads;

pub use decoder::FrameDecoder;
pub use errors::{ProtocolError, Result};
pub use frame::Frame;
pub use header::FrameHeader;
pub use opcode::Opcode;
pub use payloads::{MessageKind, Payload};

/// Handshake protocol version carried in handshake payloads.
pub const PROTOCOL_VERSION: u8 = 1;
