//! The two halves of a call's stream endpoint.
//!
//! Every call owns exactly one [`SendStream`] and one [`RecvStream`]. The
//! halves are independent: a call can keep receiving long after it has
//! half-closed its send side, which is what the streaming shapes rely on.
//!
//! State rules:
//! - `send` after `close` is [`WirecallError::InvalidState`] — a caller bug,
//!   not a peer failure.
//! - `close` is idempotent; only the first call emits an EndStream frame.
//! - `recv` keeps yielding `Ok(None)` once end-of-stream has been observed,
//!   and keeps yielding the same error once the call has failed. A dropped
//!   connection is `ConnectionClosed`, never end-of-stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::codec::MsgPackCodec;
use crate::error::{Result, WirecallError};
use crate::message::Message;
use crate::protocol::{FrameKind, Header};
use crate::writer::{OutboundFrame, WriterHandle};

/// Inbound event routed to a call by its connection's read loop.
#[derive(Debug)]
pub(crate) enum InboundEvent {
    /// A message payload, still encoded.
    Message(Bytes),
    /// The peer half-closed its direction.
    End,
    /// The peer failed the call.
    Error(String),
}

/// The send half of a call.
///
/// Requires `&mut self` for `send` and `close`: a single activity drives a
/// half at a time, so partial writes can never interleave. Whole frames from
/// different calls are serialized by the connection's writer task.
pub struct SendStream {
    writer: WriterHandle,
    call_id: u32,
    /// Shared with the crate-internal shadow handle so close-after-handler
    /// stays exactly-once on the wire.
    closed: Arc<AtomicBool>,
}

impl SendStream {
    pub(crate) fn new(writer: WriterHandle, call_id: u32) -> Self {
        Self {
            writer,
            call_id,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Crate-internal second handle to the same half.
    ///
    /// The server connection loop keeps one so it can close (or fail) a call
    /// whose handler took the public half by value. Never exposed: callers
    /// get exactly one handle per half.
    pub(crate) fn shadow(&self) -> SendStream {
        SendStream {
            writer: self.writer.clone(),
            call_id: self.call_id,
            closed: self.closed.clone(),
        }
    }

    /// Get the call ID this half belongs to.
    #[inline]
    pub fn call_id(&self) -> u32 {
        self.call_id
    }

    /// True once the send side has been half-closed.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send one message, in FIFO order relative to prior sends on this half.
    ///
    /// May suspend while the connection's writer is backlogged.
    ///
    /// # Errors
    ///
    /// `InvalidState` if this half is closed; `ConnectionClosed` if the
    /// connection is gone.
    pub async fn send(&mut self, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(WirecallError::InvalidState("send on closed stream"));
        }

        let payload = MsgPackCodec::encode(message)?;
        let header = Header::new(self.call_id, FrameKind::Data, payload.len() as u32);
        self.writer
            .send(OutboundFrame::new(&header, Bytes::from(payload)))
            .await
    }

    /// Half-close this direction.
    ///
    /// Idempotent: the first call emits an EndStream frame, later calls are
    /// no-ops. The peer's receive half observes end-of-stream once its
    /// buffered messages drain.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let header = Header::new(self.call_id, FrameKind::EndStream, 0);
        self.writer.send(OutboundFrame::empty(&header)).await
    }

    /// Fail the call from this side; also closes the send half.
    ///
    /// No-op if the half was already closed: the peer has seen a clean
    /// end-of-stream by then and the call cannot be retroactively failed.
    pub(crate) async fn fail(&mut self, message: &str) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let payload = MsgPackCodec::encode(&message)?;
        let header = Header::new(self.call_id, FrameKind::Error, payload.len() as u32);
        self.writer
            .send(OutboundFrame::new(&header, Bytes::from(payload)))
            .await
    }
}

/// Terminal state of a receive half.
enum RecvState {
    /// Still expecting events.
    Open,
    /// End-of-stream observed; `recv` repeats `Ok(None)`.
    Ended,
    /// The call failed; `recv` repeats the same error.
    Failed(FailReason),
}

enum FailReason {
    /// Error frame from the peer.
    Application(String),
    /// Connection died without end-of-stream.
    Disconnected,
}

impl FailReason {
    fn to_error(&self) -> WirecallError {
        match self {
            FailReason::Application(msg) => WirecallError::Application(msg.clone()),
            FailReason::Disconnected => WirecallError::ConnectionClosed,
        }
    }
}

/// The receive half of a call.
pub struct RecvStream {
    rx: mpsc::Receiver<InboundEvent>,
    state: RecvState,
}

impl RecvStream {
    pub(crate) fn new(rx: mpsc::Receiver<InboundEvent>) -> Self {
        Self {
            rx,
            state: RecvState::Open,
        }
    }

    /// Receive the next message.
    ///
    /// Suspends until a message arrives, the peer half-closes, or the call
    /// fails. Returns:
    /// - `Ok(Some(message))` — next message, in the peer's send order
    /// - `Ok(None)` — end-of-stream; repeats on every later call
    /// - `Err(Application)` — the peer failed the call; repeats
    /// - `Err(ConnectionClosed)` — transport died mid-call; repeats
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        match &self.state {
            RecvState::Ended => return Ok(None),
            RecvState::Failed(reason) => return Err(reason.to_error()),
            RecvState::Open => {}
        }

        match self.rx.recv().await {
            Some(InboundEvent::Message(payload)) => {
                let message: Message = MsgPackCodec::decode(&payload)?;
                Ok(Some(message))
            }
            Some(InboundEvent::End) => {
                self.state = RecvState::Ended;
                Ok(None)
            }
            Some(InboundEvent::Error(msg)) => {
                let reason = FailReason::Application(msg);
                let err = reason.to_error();
                self.state = RecvState::Failed(reason);
                Err(err)
            }
            // The feeding read loop dropped its sender without delivering
            // End: the connection is gone.
            None => {
                self.state = RecvState::Failed(FailReason::Disconnected);
                Err(WirecallError::ConnectionClosed)
            }
        }
    }
}
