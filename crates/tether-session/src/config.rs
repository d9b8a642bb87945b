//! Connector configuration.

use std::{path::PathBuf, time::Duration};

use tether_core::{DEFAULT_HANDSHAKE_TIMEOUT, LocalProfile};
use tether_proto::FrameHeader;

/// Bytes of a `FileChunk` payload that are not file data (the sequence number).
const CHUNK_OVERHEAD: usize = 4;

/// Connector configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Name and color announced in the handshake
    pub profile: LocalProfile,
    /// Address `prepare` binds to
    pub listen_address: String,
    /// Give up opening an outgoing channel after this long
    pub connect_timeout: Duration,
    /// Give up a handshake the partner or the user leaves waiting this long
    pub handshake_timeout: Duration,
    /// File bytes per `FileChunk` frame
    pub chunk_size: usize,
    /// Largest accepted frame payload; larger frames are skipped
    pub max_frame_payload: u32,
    /// Where received files are stored
    pub download_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            profile: LocalProfile::default(),
            listen_address: "0.0.0.0:7878".to_string(),
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            chunk_size: 16 * 1024,
            max_frame_payload: 1024 * 1024,
            download_dir: PathBuf::from("downloads"),
        }
    }
}

impl SessionConfig {
    /// Frame payload limit, capped at the protocol maximum.
    pub fn frame_limit(&self) -> u32 {
        self.max_frame_payload.min(FrameHeader::MAX_PAYLOAD_SIZE)
    }

    /// Chunk size actually used: at least one byte, and small enough that a
    /// chunk frame fits under [`SessionConfig::frame_limit`].
    pub fn effective_chunk_size(&self) -> usize {
        let limit = (self.frame_limit() as usize).saturating_sub(CHUNK_OVERHEAD);
        self.chunk_size.min(limit).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.chunk_size, 16 * 1024);
        assert_eq!(config.effective_chunk_size(), 16 * 1024);
        assert_eq!(config.frame_limit(), 1024 * 1024);
    }

    #[test]
    fn chunk_size_clamped_to_frame_limit() {
        let config =
            SessionConfig { chunk_size: 4096, max_frame_payload: 1024, ..SessionConfig::default() };
        assert_eq!(config.effective_chunk_size(), 1024 - CHUNK_OVERHEAD);

        let config = SessionConfig { chunk_size: 0, ..SessionConfig::default() };
        assert_eq!(config.effective_chunk_size(), 1);
    }

    #[test]
    fn frame_limit_capped_at_protocol_maximum() {
        let config = SessionConfig { max_frame_payload: u32::MAX, ..SessionConfig::default() };
        assert_eq!(config.frame_limit(), FrameHeader::MAX_PAYLOAD_SIZE);
    }
}
