//! Error types for wirecall.
//!
//! End-of-stream is deliberately not represented here: a cleanly half-closed
//! stream surfaces as `Ok(None)` from [`RecvStream::recv`], never as an error.
//!
//! [`RecvStream::recv`]: crate::endpoint::RecvStream::recv

use thiserror::Error;

/// Main error type for all wirecall operations.
#[derive(Debug, Error)]
pub enum WirecallError {
    /// I/O error on the underlying byte stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// Protocol error (malformed frame, unknown frame kind, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Misuse of a call object, e.g. sending on a closed stream.
    ///
    /// This indicates a bug in caller code, not a peer or network failure.
    #[error("Invalid state: {0}")]
    InvalidState(&'static str),

    /// The peer's handler failed; the error terminates this call only.
    #[error("Application error: {0}")]
    Application(String),

    /// Connection closed while a call was still in flight.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl WirecallError {
    /// True for failures of the underlying transport, as opposed to
    /// application-level or caller-side errors.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WirecallError::Io(_) | WirecallError::ConnectionClosed | WirecallError::Protocol(_)
        )
    }
}

/// Result type alias using WirecallError.
pub type Result<T> = std::result::Result<T, WirecallError>;
