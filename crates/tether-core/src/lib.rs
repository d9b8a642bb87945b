//! Core
//!
//! Sans-IO session engine for Tether peer chat. One [`Session`] drives a
//! single channel to a single peer: the connection handshake, chat messages
//! with delivery and seen receipts, and chunked file transfer.
//!
//! # Architecture
//!
//! Every operation takes its inputs (a decoded frame, a user intent, a chunk
//! of file data) and returns a list of [`SessionAction`]s. The caller owns
//! the socket, the disk and the listener callbacks and executes those actions
//! in order. Nothing in this crate blocks or performs I/O, so every state
//! transition is reproducible in a plain unit test.
//!
//! # Components
//!
//! - [`connection`]: handshake and lifecycle states
//! - [`message`]: message ids, pending receipts, seen tracking
//! - [`transfer`]: outgoing and incoming file transfer slots
//! - [`Session`]: composition of the three for one channel

#![forbid(unsafe_code)]

pub mod action;
pub mod connection;
pub mod env;
pub mod error;
pub mod event;
pub mod message;
pub mod peer;
pub mod session;
pub mod transfer;

pub use action::SessionAction;
pub use connection::{ConnectionState, Direction};
pub use env::Environment;
pub use error::{ErrorKind, SessionError};
pub use event::{ConnectionEvent, FileEvent, MessageEvent, SessionEvent};
pub use message::{ChatMessage, DeliveryStatus};
pub use peer::{Conversation, LocalProfile, Peer};
pub use session::{DEFAULT_HANDSHAKE_TIMEOUT, Session};
pub use tether_proto::MessageKind;
pub use transfer::{TransferDirection, TransferId, TransferState};
