//! File transfer payload types.

use bytes::{Buf, BufMut, Bytes};
use serde::{Deserialize, Serialize};

use crate::{
    MessageKind,
    errors::{ProtocolError, Result},
};

/// Metadata announcing an outgoing file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStart {
    /// File name without directories
    pub name: String,

    /// Total size in bytes
    pub size: u64,

    /// Chat message kind the file becomes once received
    pub kind: MessageKind,
}

/// One slice of file data.
///
/// Unlike the other payloads this is not CBOR: the wire form is
/// `[seq: u32 BE][data]` to avoid re-encoding bulk bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunk {
    /// Zero-based chunk sequence number
    pub seq: u32,

    /// Chunk bytes
    pub data: Bytes,
}

impl FileChunk {
    const SEQ_SIZE: usize = 4;

    pub(crate) fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u32(self.seq);
        dst.put_slice(&self.data);
    }

    pub(crate) fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::SEQ_SIZE {
            return Err(ProtocolError::MalformedPayload("file chunk shorter than sequence number"));
        }

        let mut cursor = bytes;
        let seq = cursor.get_u32();
        Ok(Self { seq, data: Bytes::copy_from_slice(cursor) })
    }
}

/// Marks the end of a file transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEnd {
    /// Bytes sent, must equal the size announced in [`FileStart`]
    pub size: u64,

    /// Number of chunks sent
    pub chunks: u32,
}

/// Aborts a file transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCancel {
    /// True when the sending side aborted, false when the receiving side did.
    ///
    /// Both directions may be active at once, so the flag tells the peer which
    /// of its transfers ended.
    pub by_sender: bool,
}
