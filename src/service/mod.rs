//! Service module - method registration and dispatch.
//!
//! A service is a set of named methods, each with one of the four call
//! shapes. Handlers are async closures; the connection loop owns the
//! shape-specific wrapping (receiving the single request for unary-request
//! shapes, emitting the single response and end-of-stream for unary-response
//! shapes).
//!
//! # Example
//!
//! ```ignore
//! use wirecall::service::ServiceRegistry;
//! use wirecall::Message;
//!
//! let mut registry = ServiceRegistry::new();
//!
//! registry.unary_unary("greet", |req| async move {
//!     Ok(Message::new(format!("hello, {}", req.text)))
//! });
//!
//! registry.stream_stream("echo", |mut requests, mut responses| async move {
//!     while let Some(msg) = requests.recv().await? {
//!         responses.send(&msg).await?;
//!     }
//!     Ok(())
//! });
//! ```

mod registry;

pub use registry::{BoxFuture, CallKind, MethodHandler, ServiceRegistry};
