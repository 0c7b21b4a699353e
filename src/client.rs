//! Client connection and the four call-shape operations.
//!
//! A [`Client`] owns one connection. Its read loop routes response frames to
//! the calls in flight; each call gets its own endpoint halves, so calls are
//! independent and may run concurrently.
//!
//! # Example
//!
//! ```ignore
//! use wirecall::{Client, Message};
//!
//! #[tokio::main]
//! async fn main() -> wirecall::Result<()> {
//!     let client = Client::connect("127.0.0.1:8080").await?;
//!
//!     let reply = client
//!         .unary_unary("greet", &Message::new("world"))
//!         .await?;
//!     println!("{}", reply);
//!
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::codec::MsgPackCodec;
use crate::endpoint::{InboundEvent, RecvStream, SendStream};
use crate::error::{Result, WirecallError};
use crate::message::Message;
use crate::protocol::{FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::transport::{establish, FrameReader};
use crate::writer::{OutboundFrame, WriterConfig, WriterHandle};

/// Client-side configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-call inbound channel capacity.
    pub inbound_buffer: usize,
    /// Maximum accepted frame payload size.
    pub max_payload_size: u32,
    /// Writer task configuration.
    pub writer: WriterConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            inbound_buffer: 64,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            writer: WriterConfig::default(),
        }
    }
}

/// Routing table shared between the read loop and call initiation.
type CallMap = Arc<Mutex<HashMap<u32, mpsc::Sender<InboundEvent>>>>;

/// A client connection.
pub struct Client {
    writer: WriterHandle,
    calls: CallMap,
    next_call_id: AtomicU32,
    config: ClientConfig,
    _read_task: JoinHandle<()>,
}

impl Client {
    /// Dial a TCP endpoint and establish a connection.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        Self::connect_with(addr, ClientConfig::default()).await
    }

    /// Dial a TCP endpoint with custom configuration.
    pub async fn connect_with<A: ToSocketAddrs>(addr: A, config: ClientConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_io(stream, config))
    }

    /// Build a client over an established duplex byte stream.
    ///
    /// Useful for non-TCP transports and in-memory streams in tests.
    pub fn from_io<S>(io: S, config: ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer, _writer_task) =
            establish(io, config.writer.clone(), config.max_payload_size);

        let calls: CallMap = Arc::new(Mutex::new(HashMap::new()));
        let read_task = tokio::spawn(read_loop(reader, calls.clone()));

        Self {
            writer,
            calls,
            next_call_id: AtomicU32::new(1),
            config,
            _read_task: read_task,
        }
    }

    /// Open a call: register its inbound route and send the Open frame.
    async fn open(&self, method: &str) -> Result<(SendStream, RecvStream)> {
        let call_id = self.next_call_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(self.config.inbound_buffer);
        {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            calls.insert(call_id, tx);
        }

        let payload = MsgPackCodec::encode(&method)?;
        let header = Header::new(call_id, FrameKind::Open, payload.len() as u32);
        let open_result = self
            .writer
            .send(OutboundFrame::new(&header, Bytes::from(payload)))
            .await;

        if let Err(e) = open_result {
            let mut calls = self.calls.lock().unwrap_or_else(|e| e.into_inner());
            calls.remove(&call_id);
            return Err(e);
        }

        Ok((
            SendStream::new(self.writer.clone(), call_id),
            RecvStream::new(rx),
        ))
    }

    /// One request, one response.
    ///
    /// Enforces the shape: exactly one response message followed by clean
    /// termination.
    pub async fn unary_unary(&self, method: &str, request: &Message) -> Result<Message> {
        let (mut tx, mut rx) = self.open(method).await?;
        tx.send(request).await?;
        tx.close().await?;

        let response = match rx.recv().await? {
            Some(message) => message,
            None => {
                return Err(WirecallError::Protocol(
                    "call ended without a response".to_string(),
                ))
            }
        };
        expect_clean_end(&mut rx).await?;
        Ok(response)
    }

    /// One request, a stream of responses.
    ///
    /// The caller loops [`ResponseStream::recv`] until end-of-stream, or
    /// uses [`ResponseStream::collect`].
    pub async fn unary_stream(&self, method: &str, request: &Message) -> Result<ResponseStream> {
        let (mut tx, rx) = self.open(method).await?;
        tx.send(request).await?;
        tx.close().await?;
        Ok(ResponseStream { rx })
    }

    /// A stream of requests, one aggregate response.
    ///
    /// Send requests with [`ClientStreamCall::send`], then call
    /// [`ClientStreamCall::finish`] to half-close and await the response.
    pub async fn stream_unary(&self, method: &str) -> Result<ClientStreamCall> {
        let (tx, rx) = self.open(method).await?;
        Ok(ClientStreamCall { tx, rx })
    }

    /// Full duplex: both directions stream independently.
    ///
    /// Use [`DuplexCall::split`] to drive sending and receiving from two
    /// concurrent tasks, or [`crate::duplex::drive`] for the common
    /// send-all-and-collect pattern.
    pub async fn stream_stream(&self, method: &str) -> Result<DuplexCall> {
        let (tx, rx) = self.open(method).await?;
        Ok(DuplexCall { tx, rx })
    }
}

/// Verify that a response stream ends cleanly after its final message.
async fn expect_clean_end(rx: &mut RecvStream) -> Result<()> {
    match rx.recv().await? {
        None => Ok(()),
        Some(_) => Err(WirecallError::Protocol(
            "unexpected message after final response".to_string(),
        )),
    }
}

/// Response half of a unary-stream call.
pub struct ResponseStream {
    rx: RecvStream,
}

impl ResponseStream {
    /// Receive the next response, or `None` at end-of-stream.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        self.rx.recv().await
    }

    /// Accumulate all responses in arrival order until end-of-stream.
    pub async fn collect(mut self) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        while let Some(message) = self.rx.recv().await? {
            messages.push(message);
        }
        Ok(messages)
    }
}

/// Client side of a stream-unary call.
pub struct ClientStreamCall {
    tx: SendStream,
    rx: RecvStream,
}

impl ClientStreamCall {
    /// Send one request.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.tx.send(message).await
    }

    /// Half-close the request stream and await the single aggregate
    /// response.
    ///
    /// This is one operation, not a `recv` loop: the shape has exactly one
    /// response, and it arrives only after the server has observed
    /// end-of-stream on its side.
    pub async fn finish(mut self) -> Result<Message> {
        self.tx.close().await?;

        let response = match self.rx.recv().await? {
            Some(message) => message,
            None => {
                return Err(WirecallError::Protocol(
                    "call ended without a response".to_string(),
                ))
            }
        };
        expect_clean_end(&mut self.rx).await?;
        Ok(response)
    }
}

/// Client side of a full-duplex call.
pub struct DuplexCall {
    tx: SendStream,
    rx: RecvStream,
}

impl DuplexCall {
    /// Send one message.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        self.tx.send(message).await
    }

    /// Half-close the send direction. Receiving continues until the peer's
    /// end-of-stream.
    pub async fn close_send(&mut self) -> Result<()> {
        self.tx.close().await
    }

    /// Receive the next message, or `None` at the peer's end-of-stream.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        self.rx.recv().await
    }

    /// Split into independently owned halves for concurrent driving.
    pub fn split(self) -> (SendStream, RecvStream) {
        (self.tx, self.rx)
    }
}

/// Client read loop: demultiplex inbound frames to calls by id.
async fn read_loop<R>(mut reader: FrameReader<R>, calls: CallMap)
where
    R: AsyncRead + Unpin,
{
    loop {
        let frames = match reader.read_frames().await {
            Ok(Some(frames)) => frames,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("read loop error: {}", e);
                break;
            }
        };

        for frame in frames {
            let call_id = frame.call_id();

            let event = match frame.kind() {
                FrameKind::Data => InboundEvent::Message(frame.payload),
                FrameKind::EndStream => InboundEvent::End,
                FrameKind::Error => {
                    let text: String = MsgPackCodec::decode(frame.payload())
                        .unwrap_or_else(|_| "peer failed the call".to_string());
                    InboundEvent::Error(text)
                }
                FrameKind::Open => {
                    tracing::warn!("unexpected open frame from server on call {}", call_id);
                    continue;
                }
            };
            let terminal = !matches!(event, InboundEvent::Message(_));

            let tx = {
                let calls = calls.lock().unwrap_or_else(|e| e.into_inner());
                calls.get(&call_id).cloned()
            };
            let Some(tx) = tx else {
                tracing::debug!("frame for unknown call {}", call_id);
                continue;
            };

            if tx.send(event).await.is_err() || terminal {
                let mut calls = calls.lock().unwrap_or_else(|e| e.into_inner());
                calls.remove(&call_id);
            }
        }
    }

    // Drop every route: pending `recv` calls observe ConnectionClosed, which
    // is distinct from end-of-stream by construction.
    let mut calls = calls.lock().unwrap_or_else(|e| e.into_inner());
    calls.clear();
}
