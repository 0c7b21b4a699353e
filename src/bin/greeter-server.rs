//! Greeter server - hosts the four call shapes over TCP.
//!
//! Each method logs what it receives and replies with a fixed greeting, so
//! the client side can be eyeballed against the log:
//!
//! - `DoUnaryUnary`: one reply per request
//! - `DoUnaryStream`: three replies per request
//! - `DoStreamUnary`: one reply after the request stream ends
//! - `DoStreamStream`: one echo per received message
//!
//! Run with `RUST_LOG=info cargo run --bin greeter-server`.

use tracing_subscriber::EnvFilter;

use wirecall::{Message, Server};

/// Log one received message, like every method does.
fn process_message(method: &str, msg: &Message) {
    tracing::info!("{}: message received: {}", method, msg.text);
}

#[tokio::main]
async fn main() -> wirecall::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server = Server::builder()
        .unary_unary("DoUnaryUnary", |req| async move {
            process_message("DoUnaryUnary", &req);
            Ok(Message::new("Hello from DoUnaryUnary"))
        })
        .unary_stream("DoUnaryStream", |req, mut responses| async move {
            process_message("DoUnaryStream", &req);
            for _ in 0..3 {
                responses.send(&Message::new("Hello from DoUnaryStream")).await?;
            }
            Ok(())
        })
        .stream_unary("DoStreamUnary", |mut requests| async move {
            while let Some(msg) = requests.recv().await? {
                process_message("DoStreamUnary", &msg);
            }
            Ok(Message::new("Hello from DoStreamUnary"))
        })
        .stream_stream("DoStreamStream", |mut requests, mut responses| async move {
            while let Some(msg) = requests.recv().await? {
                process_message("DoStreamStream", &msg);
                responses.send(&Message::new("Hello from DoStreamStream")).await?;
            }
            Ok(())
        })
        .build();

    server.serve("127.0.0.1:8080").await
}
