//! Incremental frame decoder for a continuous byte stream.
//!
//! Transports deliver bytes in arbitrary slices. [`FrameDecoder`] buffers
//! them and yields each frame once it is fully available. It performs no I/O:
//! the reader appends bytes via [`FrameDecoder::buffer_mut`] or
//! [`FrameDecoder::extend_from_slice`] and then drains frames with
//! [`FrameDecoder::decode_next`].

use bytes::{Buf, BytesMut};

use crate::{
    Frame, FrameHeader,
    errors::{ProtocolError, Result},
};

const INITIAL_CAPACITY: usize = 8 * 1024;

/// Buffers partial reads and splits them into frames.
///
/// # Invariants
///
/// - The buffer always starts at a frame boundary.
/// - A frame is only returned once its full payload is buffered.
/// - Declared payload sizes above `max_payload_size` are rejected before any
///   payload bytes are buffered for them. The declared bytes are then skipped
///   as they arrive, so the next frame still starts on a boundary.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_payload_size: u32,
    /// Payload bytes of a rejected frame not yet skipped
    discarding: usize,
}

impl FrameDecoder {
    /// Create a decoder accepting payloads up to `max_payload_size` bytes.
    ///
    /// The limit is clamped to [`FrameHeader::MAX_PAYLOAD_SIZE`].
    #[must_use]
    pub fn new(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
            max_payload_size: max_payload_size.min(FrameHeader::MAX_PAYLOAD_SIZE),
            discarding: 0,
        }
    }

    /// Configured payload limit.
    #[must_use]
    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    /// True while the payload of a rejected frame is being skipped.
    #[must_use]
    pub fn is_discarding(&self) -> bool {
        self.discarding > 0
    }

    /// Number of bytes buffered but not yet returned as frames.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Append bytes received from the transport.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Buffer for readers that fill it directly (e.g. `AsyncReadExt::read_buf`).
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Next fully buffered frame, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::OversizedFrame` if the next header declares a payload
    ///   above the configured limit. Only that frame is lost: its payload is
    ///   skipped and decoding continues with the frame after it.
    pub fn decode_next(&mut self) -> Result<Option<Frame>> {
        self.skip_discarded();
        if self.discarding > 0 || self.buffer.len() < FrameHeader::SIZE {
            return Ok(None);
        }

        let declared =
            u32::from_be_bytes([self.buffer[1], self.buffer[2], self.buffer[3], self.buffer[4]]);
        if declared > self.max_payload_size {
            let opcode = self.buffer[0];
            self.buffer.advance(FrameHeader::SIZE);
            self.discarding = declared as usize;
            self.skip_discarded();
            return Err(ProtocolError::OversizedFrame {
                opcode,
                size: declared as usize,
                max: self.max_payload_size as usize,
            });
        }

        let header = *FrameHeader::from_bytes(&self.buffer)?;
        let payload_size = header.payload_size();

        let total_size = FrameHeader::SIZE + payload_size as usize;
        if self.buffer.len() < total_size {
            self.buffer.reserve(total_size - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(FrameHeader::SIZE);
        let payload = self.buffer.split_to(payload_size as usize).freeze();

        Ok(Some(Frame { header, payload }))
    }

    fn skip_discarded(&mut self) {
        let skip = self.discarding.min(self.buffer.len());
        self.buffer.advance(skip);
        self.discarding -= skip;
    }

    /// Check the buffer at end of stream.
    ///
    /// A clean close happens on a frame boundary.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTruncated` if the stream ended mid-frame
    pub fn finish(&self) -> Result<()> {
        if self.discarding > 0 {
            return Err(ProtocolError::FrameTruncated { expected: self.discarding, actual: 0 });
        }
        if self.buffer.is_empty() {
            return Ok(());
        }

        let expected = match FrameHeader::from_bytes(&self.buffer) {
            Ok(header) => header.payload_size() as usize,
            Err(_) => 0,
        };

        Err(ProtocolError::FrameTruncated {
            expected,
            actual: self.buffer.len().saturating_sub(FrameHeader::SIZE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Opcode;

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut out = Vec::new();
        for frame in frames {
            frame.encode(&mut out).expect("should encode");
        }
        out
    }

    #[test]
    fn waits_for_complete_header() {
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&[0x10, 0x00]);
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.buffered_len(), 2);
    }

    #[test]
    fn waits_for_complete_payload() {
        let frame = Frame::new(FrameHeader::new(Opcode::TextMessage), vec![7u8; 32]);
        let bytes = wire(&[frame.clone()]);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&bytes[..20]);
        assert_eq!(decoder.decode_next(), Ok(None));

        decoder.extend_from_slice(&bytes[20..]);
        assert_eq!(decoder.decode_next(), Ok(Some(frame)));
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn yields_back_to_back_frames_in_order() {
        let first = Frame::empty(Opcode::HandshakeWithdraw);
        let second = Frame::new(FrameHeader::new(Opcode::FileChunk), vec![1, 2, 3]);
        let third = Frame::empty(Opcode::Disconnect);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&wire(&[first.clone(), second.clone(), third.clone()]));

        assert_eq!(decoder.decode_next(), Ok(Some(first)));
        assert_eq!(decoder.decode_next(), Ok(Some(second)));
        assert_eq!(decoder.decode_next(), Ok(Some(third)));
        assert_eq!(decoder.decode_next(), Ok(None));
    }

    #[test]
    fn byte_at_a_time_feeding() {
        let frame = Frame::new(FrameHeader::new(Opcode::SeenAck), b"1234567890".to_vec());
        let bytes = wire(&[frame.clone()]);

        let mut decoder = FrameDecoder::new(1024);
        let mut decoded = Vec::new();
        for byte in bytes {
            decoder.extend_from_slice(&[byte]);
            if let Some(frame) = decoder.decode_next().expect("valid stream") {
                decoded.push(frame);
            }
        }

        assert_eq!(decoded, vec![frame]);
    }

    #[test]
    fn rejects_declared_length_above_limit() {
        let mut header = FrameHeader::new(Opcode::FileChunk);
        header.set_payload_size(2048);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&header.to_bytes());

        assert_eq!(
            decoder.decode_next(),
            Err(ProtocolError::OversizedFrame {
                opcode: Opcode::FileChunk.to_u8(),
                size: 2048,
                max: 1024,
            })
        );
        assert!(decoder.is_discarding());
    }

    #[test]
    fn oversized_payload_is_skipped_across_reads() {
        let mut header = FrameHeader::new(Opcode::TextMessage);
        header.set_payload_size(3000);
        let next = Frame::new(FrameHeader::new(Opcode::SeenAck), b"42".to_vec());

        let mut bytes = header.to_bytes().to_vec();
        bytes.extend(vec![0xAB; 3000]);
        bytes.extend(wire(&[next.clone()]));

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&bytes[..1000]);
        assert!(matches!(
            decoder.decode_next(),
            Err(ProtocolError::OversizedFrame { size: 3000, .. })
        ));
        assert_eq!(decoder.buffered_len(), 0);

        decoder.extend_from_slice(&bytes[1000..2500]);
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.buffered_len(), 0);

        decoder.extend_from_slice(&bytes[2500..]);
        assert_eq!(decoder.decode_next(), Ok(Some(next)));
        assert!(!decoder.is_discarding());
        assert_eq!(decoder.finish(), Ok(()));
    }

    #[test]
    fn declaration_above_hard_cap_is_skipped_too() {
        let mut bytes = vec![Opcode::FileChunk.to_u8()];
        bytes.extend((FrameHeader::MAX_PAYLOAD_SIZE + 1).to_be_bytes());

        let mut decoder = FrameDecoder::new(u32::MAX);
        decoder.extend_from_slice(&bytes);
        assert!(matches!(decoder.decode_next(), Err(ProtocolError::OversizedFrame { .. })));
        assert!(matches!(decoder.finish(), Err(ProtocolError::FrameTruncated { .. })));
    }

    #[test]
    fn limit_clamped_to_hard_cap() {
        let decoder = FrameDecoder::new(u32::MAX);
        assert_eq!(decoder.max_payload_size(), FrameHeader::MAX_PAYLOAD_SIZE);
    }

    #[test]
    fn clean_close_on_frame_boundary() {
        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&wire(&[Frame::empty(Opcode::Disconnect)]));
        assert!(decoder.decode_next().expect("valid").is_some());
        assert_eq!(decoder.finish(), Ok(()));
    }

    #[test]
    fn close_mid_frame_is_truncation() {
        let frame = Frame::new(FrameHeader::new(Opcode::TextMessage), vec![0u8; 16]);
        let bytes = wire(&[frame]);

        let mut decoder = FrameDecoder::new(1024);
        decoder.extend_from_slice(&bytes[..9]);
        assert_eq!(decoder.decode_next(), Ok(None));
        assert_eq!(decoder.finish(), Err(ProtocolError::FrameTruncated { expected: 16, actual: 4 }));
    }
}
