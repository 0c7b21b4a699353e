//! Buffered frame reading and connection establishment.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::protocol::{Frame, FrameBuffer};
use crate::writer::{spawn_writer_task, WriterConfig, WriterHandle};

/// Read buffer size for socket reads.
const READ_BUF_SIZE: usize = 16 * 1024;

/// Incremental frame reader over any `AsyncRead`.
///
/// Wraps a [`FrameBuffer`] and a read buffer; yields batches of complete
/// frames in arrival order.
pub struct FrameReader<R> {
    reader: R,
    frames: FrameBuffer,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with the given payload size cap.
    pub fn new(reader: R, max_payload_size: u32) -> Self {
        Self {
            reader,
            frames: FrameBuffer::with_max_payload(max_payload_size),
            buf: vec![0u8; READ_BUF_SIZE],
        }
    }

    /// Read until at least one complete frame is available.
    ///
    /// Returns `Ok(None)` when the peer closed the stream cleanly (EOF);
    /// in-flight calls decide for themselves whether that close was clean
    /// (end-of-stream already delivered) or a mid-call drop.
    ///
    /// # Errors
    ///
    /// I/O failures and protocol violations (malformed header, oversized
    /// payload).
    pub async fn read_frames(&mut self) -> Result<Option<Vec<Frame>>> {
        loop {
            let n = self.reader.read(&mut self.buf).await?;
            if n == 0 {
                return Ok(None);
            }

            let frames = self.frames.push(&self.buf[..n])?;
            if !frames.is_empty() {
                return Ok(Some(frames));
            }
        }
    }
}

/// Split a duplex byte stream and wire up the connection plumbing.
///
/// Returns the frame reader for the read half, the writer handle for
/// submitting frames, and the writer task's join handle.
pub fn establish<S>(
    io: S,
    writer_config: WriterConfig,
    max_payload_size: u32,
) -> (
    FrameReader<tokio::io::ReadHalf<S>>,
    WriterHandle,
    JoinHandle<Result<()>>,
)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (read_half, write_half) = tokio::io::split(io);
    let (writer, writer_task) = spawn_writer_task(write_half, writer_config);
    let reader = FrameReader::new(read_half, max_payload_size);
    (reader, writer, writer_task)
}
