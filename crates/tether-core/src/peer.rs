//! Peer identity types.

use tether_proto::payloads::handshake::Handshake;

/// Remote device taking part in a session.
///
/// Supplied by discovery for outgoing sessions and assembled from the
/// handshake request (plus the channel's remote address) for incoming ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer {
    /// Stable transport address
    pub address: String,
    /// Display name
    pub name: String,
    /// Display color (24-bit RGB)
    pub color: u32,
}

impl Peer {
    /// Create a peer record.
    pub fn new(address: impl Into<String>, name: impl Into<String>, color: u32) -> Self {
        Self { address: address.into(), name: name.into(), color }
    }
}

/// The local user's identity, announced in every handshake frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalProfile {
    /// Display name
    pub name: String,
    /// Display color (24-bit RGB)
    pub color: u32,
}

impl LocalProfile {
    /// Create a profile.
    pub fn new(name: impl Into<String>, color: u32) -> Self {
        Self { name: name.into(), color: color & 0x00FF_FFFF }
    }

    pub(crate) fn handshake(&self) -> Handshake {
        Handshake {
            version: tether_proto::PROTOCOL_VERSION,
            name: self.name.clone(),
            color: self.color,
        }
    }
}

impl Default for LocalProfile {
    fn default() -> Self {
        Self::new("tether", 0x00_7F_FF)
    }
}

/// Conversation record handed to the persistence layer when a session opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Partner address, the conversation key
    pub address: String,
    /// Partner display name
    pub display_name: String,
    /// Partner display color
    pub color: u32,
    /// Preview of the most recent message, if any
    pub last_message: Option<String>,
    /// Last activity time in Unix milliseconds
    pub last_activity: u64,
    /// Whether the partner has messages the user has not seen
    pub not_seen: bool,
}

impl Conversation {
    /// Fresh conversation with `peer`, active as of `now_millis`.
    pub fn with_peer(peer: &Peer, now_millis: u64) -> Self {
        Self {
            address: peer.address.clone(),
            display_name: peer.name.clone(),
            color: peer.color,
            last_message: None,
            last_activity: now_millis,
            not_seen: false,
        }
    }
}
