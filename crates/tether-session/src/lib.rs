//! Session
//!
//! Async facade over [`tether_core`]. A [`Connector`] owns the transport, the
//! listener slots and at most one peer session, and turns the session's
//! actions into real I/O with Tokio.
//!
//! # Architecture
//!
//! [`tether_core::Session`] decides; this crate executes. Each open channel
//! gets three tasks:
//!
//! - a reader that decodes frames and feeds them to the session
//! - a writer that drains the channel's outbound queue
//! - a file worker that writes incoming files to disk
//!
//! Events flow to a dispatcher task that calls the registered listeners on
//! an [`Executor`].
//!
//! # Components
//!
//! - [`Connector`]: control operations and queries
//! - [`Transport`]: channel boundary; [`TcpTransport`] is bundled
//! - [`SessionConfig`]: profile, addresses, chunking and limits
//! - [`SystemEnv`]: production clock

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connector;
mod error;
mod files;
mod listener;
mod reader;
mod system_env;
mod transport;
mod writer;

pub use config::SessionConfig;
pub use connector::Connector;
pub use error::TransportError;
pub use files::PARTIAL_SUFFIX;
pub use listener::{
    ConnectionListener, Executor, FileListener, InlineExecutor, MessageListener,
};
pub use reader::FrameReader;
pub use system_env::SystemEnv;
pub use tether_core::{
    ChatMessage, ConnectionEvent, ConnectionState, Conversation, DeliveryStatus, ErrorKind,
    FileEvent, LocalProfile, MessageEvent, MessageKind, Peer, SessionError,
};
pub use transport::{Channel, Listener, TcpChannelListener, TcpTransport, Transport};
