//! Protocol module - wire format, framing, and frame types.
//!
//! This is the built-in transport collaborator's framing layer:
//! - 9-byte header encoding/decoding
//! - Frame buffer for accumulating partial reads
//! - Frame struct with typed accessors
//!
//! The call layer consumes only the signals these frames carry (open a call,
//! deliver a message, half-close, fail the call); nothing above this module
//! depends on the byte layout.

mod frame;
mod frame_buffer;
mod wire;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire::{
    FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, RESERVED_CALL_ID,
};
