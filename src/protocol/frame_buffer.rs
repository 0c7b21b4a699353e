//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management and a two-state
//! machine for fragmented frames:
//! - `WaitingForHeader`: need at least 9 bytes
//! - `WaitingForPayload`: header parsed, need N more payload bytes
//!
//! Ordered delivery falls out of construction: frames are extracted in the
//! exact order their bytes arrived, and the byte stream below is reliable
//! and ordered.

use bytes::{Bytes, BytesMut};

use super::frame::Frame;
use super::wire::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for a complete header.
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with a custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns the frames completed by this chunk, in arrival order; partial
    /// data is buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns an error on a malformed header or an oversized payload. The
    /// buffer is poisoned after an error; the connection must be torn down.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    if self.buffer.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let header = Header::decode(&self.buffer[..HEADER_SIZE])?;
                    header.validate(self.max_payload_size)?;

                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if header.payload_length == 0 {
                        return Ok(Some(Frame::new(header, Bytes::new())));
                    }

                    self.state = State::WaitingForPayload { header };
                }

                State::WaitingForPayload { header } => {
                    let needed = header.payload_length as usize;
                    if self.buffer.len() < needed {
                        return Ok(None);
                    }

                    // Zero-copy freeze of exactly the payload bytes.
                    let payload = self.buffer.split_to(needed).freeze();
                    let header = *header;
                    self.state = State::WaitingForHeader;

                    return Ok(Some(Frame::new(header, payload)));
                }
            }
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, FrameKind};

    fn frame_bytes(call_id: u32, kind: FrameKind, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(call_id, kind, payload.len() as u32);
        build_frame(&header, payload)
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer
            .push(&frame_bytes(1, FrameKind::Data, b"hello"))
            .unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].call_id(), 1);
        assert_eq!(frames[0].payload(), b"hello");
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer
            .push(&frame_bytes(7, FrameKind::EndStream, b""))
            .unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_end_stream());
        assert!(frames[0].payload().is_empty());
    }

    #[test]
    fn test_multiple_frames_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = Vec::new();
        for i in 1u32..=5 {
            bytes.extend(frame_bytes(i, FrameKind::Data, format!("m{}", i).as_bytes()));
        }

        let frames = buffer.push(&bytes).unwrap();
        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.call_id(), (i + 1) as u32);
            assert_eq!(frame.payload(), format!("m{}", i + 1).as_bytes());
        }
    }

    #[test]
    fn test_fragmented_frame() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes(1, FrameKind::Data, b"fragmented payload");

        // Header in two parts
        assert!(buffer.push(&bytes[..4]).unwrap().is_empty());
        assert!(buffer.push(&bytes[4..HEADER_SIZE]).unwrap().is_empty());

        // Payload in two parts
        let mid = HEADER_SIZE + 8;
        assert!(buffer.push(&bytes[HEADER_SIZE..mid]).unwrap().is_empty());
        let frames = buffer.push(&bytes[mid..]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"fragmented payload");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes(9, FrameKind::Data, b"slow");

        let mut got = Vec::new();
        for b in &bytes {
            got.extend(buffer.push(std::slice::from_ref(b)).unwrap());
        }

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].call_id(), 9);
        assert_eq!(got[0].payload(), b"slow");
    }

    #[test]
    fn test_frame_boundary_straddling_push() {
        let mut buffer = FrameBuffer::new();
        let mut bytes = frame_bytes(1, FrameKind::Data, b"first");
        bytes.extend(frame_bytes(2, FrameKind::Data, b"second"));

        // Split in the middle of the second frame's header.
        let cut = HEADER_SIZE + 5 + 3;
        let first = buffer.push(&bytes[..cut]).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].payload(), b"first");

        let second = buffer.push(&bytes[cut..]).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].payload(), b"second");
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut buffer = FrameBuffer::with_max_payload(4);
        let bytes = frame_bytes(1, FrameKind::Data, b"too large");
        assert!(buffer.push(&bytes).is_err());
    }

    #[test]
    fn test_reserved_call_id_rejected() {
        let mut buffer = FrameBuffer::new();
        let bytes = frame_bytes(0, FrameKind::Data, b"x");
        assert!(buffer.push(&bytes).is_err());
    }
}
