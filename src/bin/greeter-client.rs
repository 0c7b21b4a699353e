//! Greeter client - runs the four call shapes in sequence.
//!
//! Connects to the greeter server, drives one call of each shape through the
//! orchestrator, and prints every response. A failed call is reported and
//! the sequence continues; the process exit code reflects whether every call
//! succeeded.
//!
//! Run with `RUST_LOG=info cargo run --bin greeter-client`.

use tracing_subscriber::EnvFilter;

use wirecall::{run_steps, CallKind, CallStep, Client, Message};

/// Three copies of the same request, like the streaming calls send.
fn three(text: &str) -> Vec<Message> {
    (0..3).map(|_| Message::new(text)).collect()
}

#[tokio::main]
async fn main() -> wirecall::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let client = Client::connect("127.0.0.1:8080").await?;

    let steps = [
        CallStep::new(
            "DoUnaryUnary",
            CallKind::UnaryUnary,
            vec![Message::new("Hello DoUnaryUnary")],
        ),
        CallStep::new(
            "DoUnaryStream",
            CallKind::UnaryStream,
            vec![Message::new("Hello DoUnaryStream")],
        ),
        CallStep::new(
            "DoStreamUnary",
            CallKind::StreamUnary,
            three("Hello DoStreamUnary"),
        ),
        CallStep::new(
            "DoStreamStream",
            CallKind::StreamStream,
            three("Hello DoStreamStream"),
        ),
    ];

    let outcomes = run_steps(&client, &steps).await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(responses) => {
                for response in responses {
                    println!("{}", response);
                }
            }
            Err(e) => {
                eprintln!("{}: {}", outcome.method, e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
