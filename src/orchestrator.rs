//! Client-side call sequencing.
//!
//! Runs a scripted sequence of calls against one connection. Calls are
//! independent: a failure is captured in that step's outcome, logged, and
//! the sequence continues. Whether a failure should abort anything is the
//! caller's decision, made after the fact.

use crate::client::Client;
use crate::duplex;
use crate::error::Result;
use crate::message::Message;
use crate::service::CallKind;

/// One scripted call.
#[derive(Debug, Clone)]
pub struct CallStep {
    /// Method name to invoke.
    pub method: String,
    /// Call shape to drive it with.
    pub kind: CallKind,
    /// Requests to send. Unary-request shapes use the first entry;
    /// stream-request shapes send all of them in order.
    pub requests: Vec<Message>,
}

impl CallStep {
    /// Create a step.
    pub fn new(method: impl Into<String>, kind: CallKind, requests: Vec<Message>) -> Self {
        Self {
            method: method.into(),
            kind,
            requests,
        }
    }
}

/// The outcome of one step.
#[derive(Debug)]
pub struct CallOutcome {
    /// Method name the step invoked.
    pub method: String,
    /// Call shape used.
    pub kind: CallKind,
    /// Collected responses, or the error that ended the call.
    pub result: Result<Vec<Message>>,
}

impl CallOutcome {
    /// True if the call completed without error.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run the steps in order, one call at a time.
///
/// Every step produces an outcome; a failed call never short-circuits the
/// rest of the sequence.
pub async fn run_steps(client: &Client, steps: &[CallStep]) -> Vec<CallOutcome> {
    let mut outcomes = Vec::with_capacity(steps.len());

    for step in steps {
        let result = run_step(client, step).await;
        if let Err(e) = &result {
            tracing::error!("call {} ({}) failed: {}", step.method, step.kind, e);
        }
        outcomes.push(CallOutcome {
            method: step.method.clone(),
            kind: step.kind,
            result,
        });
    }

    outcomes
}

/// Drive one step with its shape's client operation.
async fn run_step(client: &Client, step: &CallStep) -> Result<Vec<Message>> {
    match step.kind {
        CallKind::UnaryUnary => {
            let request = single_request(step)?;
            let response = client.unary_unary(&step.method, request).await?;
            Ok(vec![response])
        }
        CallKind::UnaryStream => {
            let request = single_request(step)?;
            let stream = client.unary_stream(&step.method, request).await?;
            stream.collect().await
        }
        CallKind::StreamUnary => {
            let mut call = client.stream_unary(&step.method).await?;
            for message in &step.requests {
                call.send(message).await?;
            }
            let response = call.finish().await?;
            Ok(vec![response])
        }
        CallKind::StreamStream => {
            let call = client.stream_stream(&step.method).await?;
            duplex::drive(call, &step.requests).await
        }
    }
}

/// The one request of a unary-request step.
fn single_request(step: &CallStep) -> Result<&Message> {
    step.requests.first().ok_or(crate::error::WirecallError::InvalidState(
        "unary-request step needs a request message",
    ))
}
