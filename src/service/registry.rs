//! Method registry keyed by name.
//!
//! Method names travel in each call's Open frame, so no out-of-band id
//! assignment or schema exchange is needed; the registry is a plain map from
//! name to shape plus handler.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use crate::endpoint::{RecvStream, SendStream};
use crate::error::Result;
use crate::message::Message;

/// Boxed future returned by handlers.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The four call shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// One request, one response.
    UnaryUnary,
    /// One request, a stream of responses.
    UnaryStream,
    /// A stream of requests, one aggregate response.
    StreamUnary,
    /// Full duplex: both directions stream independently.
    StreamStream,
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CallKind::UnaryUnary => "unary-unary",
            CallKind::UnaryStream => "unary-stream",
            CallKind::StreamUnary => "stream-unary",
            CallKind::StreamStream => "stream-stream",
        };
        f.write_str(name)
    }
}

/// A registered handler, boxed per shape.
pub enum MethodHandler {
    /// One request in, one response out.
    UnaryUnary(Box<dyn Fn(Message) -> BoxFuture<'static, Result<Message>> + Send + Sync>),
    /// One request in, responses written to the send half.
    UnaryStream(Box<dyn Fn(Message, SendStream) -> BoxFuture<'static, Result<()>> + Send + Sync>),
    /// Requests consumed from the receive half, one response out.
    StreamUnary(Box<dyn Fn(RecvStream) -> BoxFuture<'static, Result<Message>> + Send + Sync>),
    /// Both halves handed to the handler.
    StreamStream(
        Box<dyn Fn(RecvStream, SendStream) -> BoxFuture<'static, Result<()>> + Send + Sync>,
    ),
}

impl MethodHandler {
    /// The shape this handler serves.
    pub fn kind(&self) -> CallKind {
        match self {
            MethodHandler::UnaryUnary(_) => CallKind::UnaryUnary,
            MethodHandler::UnaryStream(_) => CallKind::UnaryStream,
            MethodHandler::StreamUnary(_) => CallKind::StreamUnary,
            MethodHandler::StreamStream(_) => CallKind::StreamStream,
        }
    }
}

/// Registry mapping method names to handlers.
pub struct ServiceRegistry {
    methods: HashMap<String, MethodHandler>,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Register a unary-request, unary-response method.
    pub fn unary_unary<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Message>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodHandler::UnaryUnary(Box::new(move |req| Box::pin(handler(req)))),
        );
    }

    /// Register a unary-request, stream-response method.
    ///
    /// The handler writes responses to the send half; the half is closed for
    /// it after a successful return.
    pub fn unary_stream<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Message, SendStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodHandler::UnaryStream(Box::new(move |req, tx| Box::pin(handler(req, tx)))),
        );
    }

    /// Register a stream-request, unary-response method.
    ///
    /// The handler consumes requests as they arrive and returns the single
    /// aggregate response once it has observed end-of-stream.
    pub fn stream_unary<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(RecvStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Message>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodHandler::StreamUnary(Box::new(move |rx| Box::pin(handler(rx)))),
        );
    }

    /// Register a full-duplex method.
    pub fn stream_stream<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(RecvStream, SendStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            MethodHandler::StreamStream(Box::new(move |rx, tx| Box::pin(handler(rx, tx)))),
        );
    }

    /// Look up a handler by method name.
    pub(crate) fn get(&self, name: &str) -> Option<&MethodHandler> {
        self.methods.get(name)
    }

    /// The shape of a registered method, if any.
    pub fn kind(&self, name: &str) -> Option<CallKind> {
        self.methods.get(name).map(|h| h.kind())
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// True if no methods are registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
