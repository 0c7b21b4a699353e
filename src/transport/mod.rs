//! Transport module - connection plumbing over generic byte streams.
//!
//! Everything here is generic over `AsyncRead + AsyncWrite`: the demo
//! binaries plug in `tokio::net::TcpStream`, the tests plug in
//! `tokio::io::duplex`. The call layer never sees the difference.

mod framed;

pub use framed::{establish, FrameReader};
