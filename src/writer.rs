//! Dedicated writer task for frame sending.
//!
//! Every frame a connection emits goes through one mpsc channel into a
//! single task that owns the socket write half:
//!
//! ```text
//! call 1 ─┐
//! call 2 ─┼─► mpsc::Sender<OutboundFrame> ─► writer task ─► byte stream
//! call N ─┘
//! ```
//!
//! This is what makes concurrent sends safe: frames from different calls
//! interleave only at whole-frame granularity, never mid-frame. The channel
//! is bounded, so `send` suspends when the writer falls behind.

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, WirecallError};
use crate::protocol::{Header, HEADER_SIZE};

/// Default writer channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames drained per wakeup before flushing.
const MAX_BATCH_SIZE: usize = 32;

/// A frame ready to be written to the byte stream.
#[derive(Debug)]
pub struct OutboundFrame {
    /// Pre-encoded header.
    pub header: [u8; HEADER_SIZE],
    /// Payload bytes (empty for EndStream).
    pub payload: Bytes,
}

impl OutboundFrame {
    /// Create a new outbound frame.
    #[inline]
    pub fn new(header: &Header, payload: Bytes) -> Self {
        Self {
            header: header.encode(),
            payload,
        }
    }

    /// Create a new outbound frame with empty payload.
    #[inline]
    pub fn empty(header: &Header) -> Self {
        Self {
            header: header.encode(),
            payload: Bytes::new(),
        }
    }
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Channel capacity for the frame queue; full channel = backpressure.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for submitting frames to the writer task.
///
/// Cheaply cloneable; shared by every call on the connection.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<OutboundFrame>,
}

impl WriterHandle {
    /// Submit a frame for writing.
    ///
    /// Suspends while the writer channel is full. Fails with
    /// `ConnectionClosed` once the writer task has terminated.
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| WirecallError::ConnectionClosed)
    }
}

/// Spawn the writer task and return a handle for submitting frames.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, WriterConfig::default())
}

/// Main writer loop - drains the channel and writes frames in order.
///
/// Opportunistically batches ready frames so a burst costs one flush.
async fn writer_loop<W>(mut rx: mpsc::Receiver<OutboundFrame>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        for frame in &batch {
            writer.write_all(&frame.header).await?;
            if !frame.payload.is_empty() {
                writer.write_all(&frame.payload).await?;
            }
        }
        writer.flush().await?;
    }
}
