//! Driver for full-duplex calls.
//!
//! Sending and receiving on a duplex call must overlap: "send everything,
//! then read everything" deadlocks as soon as the peer waits for its own
//! responses to drain, or buffering is bounded. The driver runs a dedicated
//! receiver task concurrently with the sender and joins on an explicit
//! completion signal.
//!
//! The call is complete only when both hold:
//! - the sender has emitted every message and half-closed, and
//! - the receiver has observed the peer's end-of-stream.
//!
//! Closing the send side alone is not completion: responses may still be in
//! flight.

use tokio::sync::oneshot;

use crate::client::DuplexCall;
use crate::endpoint::RecvStream;
use crate::error::{Result, WirecallError};
use crate::message::Message;

/// Send `requests` in order, half-close, and collect every response until
/// the peer's end-of-stream.
///
/// Responses come back in the peer's send order. Works for empty exchanges:
/// zero requests, zero responses, or both.
///
/// # Errors
///
/// A sender-side failure is reported after the receiver has also settled, so
/// the join still happens and no task is left dangling.
pub async fn drive(call: DuplexCall, requests: &[Message]) -> Result<Vec<Message>> {
    let (mut tx, rx) = call.split();

    // Fires exactly once, when the receiver has observed end-of-stream.
    let (done_tx, done_rx) = oneshot::channel();
    let receiver = tokio::spawn(async move {
        let outcome = collect_responses(rx).await;
        // The driver may have bailed; a dropped receiver is its problem.
        let _ = done_tx.send(outcome);
    });

    let send_outcome = async {
        for message in requests {
            tx.send(message).await?;
        }
        tx.close().await
    }
    .await;

    let recv_outcome = match done_rx.await {
        Ok(outcome) => outcome,
        // Receiver task died without firing; treat as a dropped connection.
        Err(_) => Err(WirecallError::ConnectionClosed),
    };
    let _ = receiver.await;

    // Sender errors take precedence over the receiver's follow-on failure.
    send_outcome?;
    recv_outcome
}

/// Receiver half of the driver: loop until end-of-stream.
async fn collect_responses(mut rx: RecvStream) -> Result<Vec<Message>> {
    let mut responses = Vec::new();
    while let Some(message) = rx.recv().await? {
        responses.push(message);
    }
    Ok(responses)
}
