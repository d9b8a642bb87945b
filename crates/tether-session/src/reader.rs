//! Frame reader over an async byte stream.

use tether_proto::{Frame, FrameDecoder};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::TransportError;

/// Bytes requested from the stream per read.
const READ_CHUNK: usize = 16 * 1024;

/// Reads whole frames from one channel.
///
/// Partial reads are buffered in a [`FrameDecoder`]; a frame is returned only
/// once all of its bytes have arrived.
pub struct FrameReader<R> {
    reader: R,
    decoder: FrameDecoder,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Reader rejecting payloads larger than `max_payload_size`.
    pub fn new(reader: R, max_payload_size: u32) -> Self {
        Self { reader, decoder: FrameDecoder::new(max_payload_size) }
    }

    /// Next frame, or `None` when the partner closed the stream cleanly.
    ///
    /// # Errors
    ///
    /// - `TransportError::Io` if the read fails
    /// - `TransportError::Protocol` with `ProtocolError::OversizedFrame` if a
    ///   frame exceeds the limit; its payload is skipped and the reader stays
    ///   usable
    /// - `TransportError::Protocol` with a fatal error if the stream ends
    ///   inside a frame
    pub async fn next_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        loop {
            if let Some(frame) = self.decoder.decode_next()? {
                return Ok(Some(frame));
            }

            let buffer = self.decoder.buffer_mut();
            buffer.reserve(READ_CHUNK);
            if self.reader.read_buf(buffer).await? == 0 {
                self.decoder.finish()?;
                return Ok(None);
            }
        }
    }
}
