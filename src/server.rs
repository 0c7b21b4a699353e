//! Server builder and per-connection serving loop.
//!
//! The [`ServerBuilder`] provides a fluent API for registering method
//! handlers. A built [`Server`] serves connections: each connection runs one
//! read loop that routes frames by call id to the calls in flight, and each
//! call runs its handler in its own task.
//!
//! # Example
//!
//! ```ignore
//! use wirecall::{Message, Server};
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let server = Server::builder()
//!         .unary_unary("greet", |req| async move {
//!             Ok(Message::new(format!("hello, {}", req.text)))
//!         })
//!         .stream_stream("echo", |mut requests, mut responses| async move {
//!             while let Some(msg) = requests.recv().await? {
//!                 responses.send(&msg).await?;
//!             }
//!             Ok(())
//!         })
//!         .build();
//!
//!     server.serve("127.0.0.1:8080").await
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};

use crate::codec::MsgPackCodec;
use crate::endpoint::{InboundEvent, RecvStream, SendStream};
use crate::error::{Result, WirecallError};
use crate::message::Message;
use crate::protocol::{Frame, FrameKind, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::service::{MethodHandler, ServiceRegistry};
use crate::transport::establish;
use crate::writer::{WriterConfig, WriterHandle};

/// Default maximum concurrent calls per connection.
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 64;

/// Default capacity of a call's inbound message buffer.
pub const DEFAULT_INBOUND_BUFFER: usize = 64;

/// Server-side configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Concurrent call cap per connection; excess calls are refused with an
    /// error frame rather than queued or dropped.
    pub max_concurrent_calls: usize,
    /// Per-call inbound channel capacity; a full buffer suspends the
    /// connection's read loop (flow control by refusal to read).
    pub inbound_buffer: usize,
    /// Maximum accepted frame payload size.
    pub max_payload_size: u32,
    /// Writer task configuration.
    pub writer: WriterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            inbound_buffer: DEFAULT_INBOUND_BUFFER,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            writer: WriterConfig::default(),
        }
    }
}

/// Builder for configuring and creating a [`Server`].
pub struct ServerBuilder {
    registry: ServiceRegistry,
    config: ServerConfig,
}

impl ServerBuilder {
    /// Create a new server builder.
    pub fn new() -> Self {
        Self {
            registry: ServiceRegistry::new(),
            config: ServerConfig::default(),
        }
    }

    /// Register a unary-request, unary-response method.
    pub fn unary_unary<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Message>> + Send + 'static,
    {
        self.registry.unary_unary(name, handler);
        self
    }

    /// Register a unary-request, stream-response method.
    pub fn unary_stream<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(Message, SendStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.registry.unary_stream(name, handler);
        self
    }

    /// Register a stream-request, unary-response method.
    pub fn stream_unary<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(RecvStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Message>> + Send + 'static,
    {
        self.registry.stream_unary(name, handler);
        self
    }

    /// Register a full-duplex method.
    pub fn stream_stream<F, Fut>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(RecvStream, SendStream) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.registry.stream_stream(name, handler);
        self
    }

    /// Set the concurrent call cap per connection. Default: 64.
    pub fn max_concurrent_calls(mut self, limit: usize) -> Self {
        self.config.max_concurrent_calls = limit;
        self
    }

    /// Set the per-call inbound buffer capacity. Default: 64.
    pub fn inbound_buffer(mut self, capacity: usize) -> Self {
        self.config.inbound_buffer = capacity;
        self
    }

    /// Set the maximum accepted payload size.
    pub fn max_payload_size(mut self, limit: u32) -> Self {
        self.config.max_payload_size = limit;
        self
    }

    /// Build the server.
    pub fn build(self) -> Server {
        Server {
            registry: Arc::new(self.registry),
            config: self.config,
        }
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A server hosting a set of registered methods.
pub struct Server {
    registry: Arc<ServiceRegistry>,
    config: ServerConfig,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// The registry of hosted methods.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Bind a TCP listener and serve connections until the listener fails.
    pub async fn serve<A: ToSocketAddrs>(&self, addr: A) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("listening on {}", listener.local_addr()?);
        self.serve_listener(listener).await
    }

    /// Serve connections from an existing TCP listener.
    ///
    /// A failed connection is logged and does not stop the accept loop.
    pub async fn serve_listener(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            tracing::debug!("accepted connection from {}", peer);

            let registry = self.registry.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, registry, config).await {
                    tracing::error!("connection from {} failed: {}", peer, e);
                }
            });
        }
    }

    /// Serve a single established duplex byte stream.
    ///
    /// Returns when the peer closes the stream, or with an error on
    /// transport failure. Useful for non-TCP transports and in-memory
    /// streams in tests.
    pub async fn serve_io<S>(&self, io: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        serve_connection(io, self.registry.clone(), self.config.clone()).await
    }
}

/// One connection's read loop: routes frames to calls, opens new calls.
async fn serve_connection<S>(
    io: S,
    registry: Arc<ServiceRegistry>,
    config: ServerConfig,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, writer, _writer_task) =
        establish(io, config.writer.clone(), config.max_payload_size);

    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_calls));
    // Only this loop touches the routing map, so no lock is needed.
    let mut active: HashMap<u32, mpsc::Sender<InboundEvent>> = HashMap::new();

    loop {
        let frames = match reader.read_frames().await? {
            Some(frames) => frames,
            // Clean close; in-flight calls observe it through their
            // dropped inbound senders.
            None => return Ok(()),
        };

        for frame in frames {
            route_frame(frame, &mut active, &registry, &writer, &semaphore, &config).await?;
        }
    }
}

/// Route one inbound frame.
async fn route_frame(
    frame: Frame,
    active: &mut HashMap<u32, mpsc::Sender<InboundEvent>>,
    registry: &Arc<ServiceRegistry>,
    writer: &WriterHandle,
    semaphore: &Arc<Semaphore>,
    config: &ServerConfig,
) -> Result<()> {
    let call_id = frame.call_id();

    if frame.is_open() {
        if active.contains_key(&call_id) {
            tracing::warn!("duplicate open for call {}", call_id);
            fail_call(writer, call_id, "duplicate call id").await?;
            return Ok(());
        }

        let method: String = match MsgPackCodec::decode(frame.payload()) {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!("unreadable method name on call {}: {}", call_id, e);
                fail_call(writer, call_id, "unreadable method name").await?;
                return Ok(());
            }
        };

        if registry.get(&method).is_none() {
            tracing::warn!("unknown method {:?} on call {}", method, call_id);
            fail_call(writer, call_id, &format!("unknown method: {}", method)).await?;
            return Ok(());
        }

        let permit = match semaphore.clone().try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!("call capacity reached, refusing call {} ({})", call_id, method);
                fail_call(writer, call_id, "server at capacity").await?;
                return Ok(());
            }
        };

        let (tx, rx) = mpsc::channel(config.inbound_buffer);
        active.insert(call_id, tx);

        let requests = RecvStream::new(rx);
        let responses = SendStream::new(writer.clone(), call_id);
        let registry = registry.clone();

        tokio::spawn(async move {
            run_call(registry, method, call_id, requests, responses, permit).await;
        });

        return Ok(());
    }

    // Data / EndStream / Error for a call in flight.
    let event = match frame.kind() {
        FrameKind::Data => InboundEvent::Message(frame.payload),
        FrameKind::EndStream => InboundEvent::End,
        FrameKind::Error => {
            let text: String = MsgPackCodec::decode(frame.payload())
                .unwrap_or_else(|_| "peer failed the call".to_string());
            InboundEvent::Error(text)
        }
        FrameKind::Open => unreachable!("open handled above"),
    };
    let terminal = !matches!(event, InboundEvent::Message(_));

    let Some(tx) = active.get(&call_id).cloned() else {
        tracing::debug!("frame for unknown call {}", call_id);
        return Ok(());
    };

    if tx.send(event).await.is_err() {
        // Handler finished early; stop routing to it.
        tracing::debug!("call {} no longer consuming, dropping frame", call_id);
        active.remove(&call_id);
        return Ok(());
    }

    if terminal {
        active.remove(&call_id);
    }

    Ok(())
}

/// Terminate a call with an error frame, without involving a handler.
async fn fail_call(writer: &WriterHandle, call_id: u32, message: &str) -> Result<()> {
    SendStream::new(writer.clone(), call_id).fail(message).await
}

/// Run one call to completion: shape-specific wrapping around the handler.
async fn run_call(
    registry: Arc<ServiceRegistry>,
    method: String,
    call_id: u32,
    requests: RecvStream,
    responses: SendStream,
    permit: OwnedSemaphorePermit,
) {
    // Held until the call finishes.
    let _permit = permit;

    let mut shadow = responses.shadow();
    // The registry is immutable after build; lookup was checked pre-spawn.
    let result = match registry.get(&method) {
        Some(handler) => execute(handler, requests, responses).await,
        None => Err(WirecallError::Application(format!(
            "unknown method: {}",
            method
        ))),
    };

    match result {
        Ok(()) => {
            // Natural end-of-stream if the handler didn't close explicitly.
            if let Err(e) = shadow.close().await {
                tracing::debug!("call {} ({}): close after handler failed: {}", call_id, method, e);
            }
        }
        Err(e) => {
            tracing::error!("call {} ({}) failed: {}", call_id, method, e);
            if let Err(send_err) = shadow.fail(&e.to_string()).await {
                tracing::debug!(
                    "call {} ({}): error report failed: {}",
                    call_id,
                    method,
                    send_err
                );
            }
        }
    }
}

/// Invoke the handler with its shape's contract.
async fn execute(
    handler: &MethodHandler,
    mut requests: RecvStream,
    mut responses: SendStream,
) -> Result<()> {
    match handler {
        MethodHandler::UnaryUnary(f) => {
            let request = recv_single_request(&mut requests).await?;
            let response = f(request).await?;
            responses.send(&response).await?;
            responses.close().await
        }
        MethodHandler::UnaryStream(f) => {
            let request = recv_single_request(&mut requests).await?;
            f(request, responses).await
        }
        MethodHandler::StreamUnary(f) => {
            let response = f(requests).await?;
            responses.send(&response).await?;
            responses.close().await
        }
        MethodHandler::StreamStream(f) => f(requests, responses).await,
    }
}

/// Receive the one request of a unary-request call.
async fn recv_single_request(requests: &mut RecvStream) -> Result<Message> {
    match requests.recv().await? {
        Some(message) => Ok(message),
        None => Err(WirecallError::Application(
            "call closed without a request".to_string(),
        )),
    }
}
