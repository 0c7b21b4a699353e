//! # wirecall
//!
//! Unary and streaming RPC message exchange over any async byte stream.
//!
//! Four call shapes over one connection:
//!
//! - **unary / unary** — one request, one response
//! - **unary / stream** — one request, a stream of responses
//! - **stream / unary** — a stream of requests, one aggregate response
//! - **stream / stream** — full duplex, driven by concurrent sender and
//!   receiver activities
//!
//! Each call owns a pair of stream halves with explicit half-close: closing
//! the send side tells the peer "no more messages", while receiving
//! continues until the peer closes its own side. End-of-stream is a normal
//! result (`Ok(None)`), never an error, and is kept strictly distinct from
//! transport failure.
//!
//! ## Example
//!
//! ```ignore
//! use wirecall::{Client, Message, Server};
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let server = Server::builder()
//!         .unary_unary("greet", |req| async move {
//!             Ok(Message::new(format!("hello, {}", req.text)))
//!         })
//!         .build();
//!     tokio::spawn(async move { server.serve("127.0.0.1:8080").await });
//!
//!     let client = Client::connect("127.0.0.1:8080").await?;
//!     let reply = client.unary_unary("greet", &Message::new("world")).await?;
//!     println!("{}", reply);
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod duplex;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod orchestrator;
pub mod protocol;
pub mod service;
pub mod transport;

mod client;
mod server;
mod writer;

pub use client::{Client, ClientConfig, ClientStreamCall, DuplexCall, ResponseStream};
pub use endpoint::{RecvStream, SendStream};
pub use error::{Result, WirecallError};
pub use message::Message;
pub use orchestrator::{run_steps, CallOutcome, CallStep};
pub use server::{Server, ServerBuilder, ServerConfig};
pub use service::CallKind;
pub use writer::WriterConfig;
