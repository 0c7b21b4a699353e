//! Wire format encoding and decoding.
//!
//! Implements the 9-byte header format:
//! ```text
//! ┌──────────┬───────┬──────────┐
//! │ Call ID  │ Kind  │ Length   │
//! │ 4 bytes  │ 1 byte│ 4 bytes  │
//! │ uint32 BE│       │ uint32 BE│
//! └──────────┴───────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use crate::error::{Result, WirecallError};

/// Header size in bytes (fixed, exactly 9).
pub const HEADER_SIZE: usize = 9;

/// Default maximum payload size (16 MB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Reserved call ID (never assigned to a call).
pub const RESERVED_CALL_ID: u32 = 0;

/// What a frame means for its call.
///
/// The four signals are mutually exclusive, so they are a closed enum rather
/// than flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// First frame of a call; payload is the method name.
    Open = 1,
    /// A message in either direction; payload is the encoded message.
    Data = 2,
    /// Half-close of the sender's direction; payload is empty.
    EndStream = 3,
    /// Terminates the call with an error; payload is the encoded error text.
    Error = 4,
}

impl FrameKind {
    /// Decode a kind byte.
    ///
    /// Returns `None` for unknown values; the caller turns that into a
    /// protocol error rather than guessing.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FrameKind::Open),
            2 => Some(FrameKind::Data),
            3 => Some(FrameKind::EndStream),
            4 => Some(FrameKind::Error),
            _ => None,
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Call identifier (non-zero; 0 is reserved).
    pub call_id: u32,
    /// What this frame means for the call.
    pub kind: FrameKind,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(call_id: u32, kind: FrameKind, payload_length: u32) -> Self {
        Self {
            call_id,
            kind,
            payload_length,
        }
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use wirecall::protocol::{FrameKind, Header};
    ///
    /// let header = Header::new(42, FrameKind::Data, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes.len(), 9);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.call_id.to_be_bytes());
        buf[4] = self.kind as u8;
        buf[5..9].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode a header from bytes (Big Endian).
    ///
    /// # Errors
    ///
    /// Fails on a short buffer or an unknown kind byte.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(WirecallError::Protocol(format!(
                "header needs {} bytes, got {}",
                HEADER_SIZE,
                buf.len()
            )));
        }
        let kind = FrameKind::from_u8(buf[4])
            .ok_or_else(|| WirecallError::Protocol(format!("unknown frame kind {}", buf[4])))?;
        Ok(Self {
            call_id: u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
            kind,
            payload_length: u32::from_be_bytes([buf[5], buf[6], buf[7], buf[8]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Call ID is not 0 (reserved)
    /// - Payload length doesn't exceed max
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.call_id == RESERVED_CALL_ID {
            return Err(WirecallError::Protocol("call ID 0 is reserved".to_string()));
        }

        if self.payload_length > max_payload_size {
            return Err(WirecallError::Protocol(format!(
                "payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }

        Ok(())
    }
}
