//! Frame struct with typed accessors.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.

use bytes::Bytes;

use super::wire::{FrameKind, Header, HEADER_SIZE};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the call ID.
    #[inline]
    pub fn call_id(&self) -> u32 {
        self.header.call_id
    }

    /// Get the frame kind.
    #[inline]
    pub fn kind(&self) -> FrameKind {
        self.header.kind
    }

    /// Check if this frame opens a call.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.header.kind == FrameKind::Open
    }

    /// Check if this frame carries a message.
    #[inline]
    pub fn is_data(&self) -> bool {
        self.header.kind == FrameKind::Data
    }

    /// Check if this frame half-closes the sender's direction.
    #[inline]
    pub fn is_end_stream(&self) -> bool {
        self.header.kind == FrameKind::EndStream
    }

    /// Check if this frame fails the call.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.header.kind == FrameKind::Error
    }
}

/// Build a complete frame as a single byte vector.
///
/// Encodes header and appends payload into a contiguous buffer. Used by
/// tests and tooling; live connections go through the writer task instead.
///
/// # Example
///
/// ```
/// use wirecall::protocol::{build_frame, FrameKind, Header};
///
/// let header = Header::new(42, FrameKind::Data, 5);
/// let bytes = build_frame(&header, b"hello");
/// assert_eq!(bytes.len(), 9 + 5); // header + payload
/// ```
pub fn build_frame(header: &Header, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    buf
}
