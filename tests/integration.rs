//! End-to-end tests: a real server and client joined by an in-memory duplex
//! stream, exercising all four call shapes and their termination rules.

use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

use wirecall::codec::MsgPackCodec;
use wirecall::protocol::{build_frame, FrameBuffer, FrameKind, Header};
use wirecall::{
    run_steps, CallKind, CallStep, Client, ClientConfig, Message, Server, WirecallError,
};

/// Greeter service used by most tests.
///
/// Besides the four fixed-reply greeter methods, hosts:
/// - `Repeat`: unary-stream, emits N numbered parts where N = request text
/// - `Count`: stream-unary, replies with how many requests arrived
/// - `Echo`: stream-stream, echoes each request verbatim
/// - `Fail`: unary-unary, always returns an application error
fn greeter() -> Server {
    Server::builder()
        .unary_unary("DoUnaryUnary", |_req| async move {
            Ok(Message::new("Hello from DoUnaryUnary"))
        })
        .unary_stream("DoUnaryStream", |_req, mut responses| async move {
            for _ in 0..3 {
                responses.send(&Message::new("Hello from DoUnaryStream")).await?;
            }
            Ok(())
        })
        .stream_unary("DoStreamUnary", |mut requests| async move {
            while requests.recv().await?.is_some() {}
            Ok(Message::new("Hello from DoStreamUnary"))
        })
        .stream_stream("DoStreamStream", |mut requests, mut responses| async move {
            while requests.recv().await?.is_some() {
                responses.send(&Message::new("Hello from DoStreamStream")).await?;
            }
            Ok(())
        })
        .unary_stream("Repeat", |req, mut responses| async move {
            let n: usize = req
                .text
                .parse()
                .map_err(|_| WirecallError::Application("not a number".to_string()))?;
            for i in 0..n {
                responses.send(&Message::new(format!("part {}", i))).await?;
            }
            Ok(())
        })
        .stream_unary("Count", |mut requests| async move {
            let mut count = 0usize;
            while requests.recv().await?.is_some() {
                count += 1;
            }
            Ok(Message::new(count.to_string()))
        })
        .stream_stream("Echo", |mut requests, mut responses| async move {
            while let Some(msg) = requests.recv().await? {
                responses.send(&msg).await?;
            }
            Ok(())
        })
        .unary_unary("Fail", |_req| async move {
            Err(WirecallError::Application("deliberate failure".to_string()))
        })
        .build()
}

/// Serve `server` on one end of an in-memory pipe, return a client on the
/// other.
fn connect(server: Server) -> Client {
    let (client_io, server_io) = duplex(64 * 1024);
    tokio::spawn(async move {
        let _ = server.serve_io(server_io).await;
    });
    Client::from_io(client_io, ClientConfig::default())
}

#[tokio::test]
async fn test_unary_unary_round_trip() {
    let client = connect(greeter());

    let response = client
        .unary_unary("DoUnaryUnary", &Message::new("Hello DoUnaryUnary"))
        .await
        .unwrap();

    assert_eq!(response, Message::new("Hello from DoUnaryUnary"));
}

#[tokio::test]
async fn test_unary_stream_fixed_three() {
    let client = connect(greeter());

    let responses = client
        .unary_stream("DoUnaryStream", &Message::new("Hello DoUnaryStream"))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    assert_eq!(responses.len(), 3);
    for response in &responses {
        assert_eq!(response.text, "Hello from DoUnaryStream");
    }
}

#[tokio::test]
async fn test_unary_stream_n_responses_in_order() {
    let client = connect(greeter());

    for n in [0usize, 1, 5, 17] {
        let responses = client
            .unary_stream("Repeat", &Message::new(n.to_string()))
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(responses.len(), n);
        for (i, response) in responses.iter().enumerate() {
            assert_eq!(response.text, format!("part {}", i));
        }
    }
}

#[tokio::test]
async fn test_stream_unary_aggregates_after_half_close() {
    let client = connect(greeter());

    for n in [0usize, 1, 3, 12] {
        let mut call = client.stream_unary("Count").await.unwrap();
        for i in 0..n {
            call.send(&Message::new(format!("req {}", i))).await.unwrap();
        }
        let response = call.finish().await.unwrap();

        // The count is the per-message processing tally: it ran exactly
        // n times, all before the response was emitted.
        assert_eq!(response.text, n.to_string());
    }
}

#[tokio::test]
async fn test_stream_unary_greeter() {
    let client = connect(greeter());

    let mut call = client.stream_unary("DoStreamUnary").await.unwrap();
    for _ in 0..3 {
        call.send(&Message::new("Hello DoStreamUnary")).await.unwrap();
    }
    let response = call.finish().await.unwrap();
    assert_eq!(response.text, "Hello from DoStreamUnary");
}

#[tokio::test]
async fn test_stream_stream_three_echoes_in_order() {
    let client = connect(greeter());

    let call = client.stream_stream("DoStreamStream").await.unwrap();
    let requests: Vec<Message> = (0..3).map(|_| Message::new("Hello DoStreamStream")).collect();
    let responses = wirecall::duplex::drive(call, &requests).await.unwrap();

    assert_eq!(responses.len(), 3);
    for response in &responses {
        assert_eq!(response.text, "Hello from DoStreamStream");
    }
}

#[tokio::test]
async fn test_stream_stream_preserves_order() {
    let client = connect(greeter());

    let call = client.stream_stream("Echo").await.unwrap();
    let requests: Vec<Message> = (0..10).map(|i| Message::new(format!("msg {}", i))).collect();
    let responses = wirecall::duplex::drive(call, &requests).await.unwrap();

    assert_eq!(responses, requests);
}

#[tokio::test]
async fn test_stream_stream_empty_call_completes() {
    let client = connect(greeter());

    let call = client.stream_stream("Echo").await.unwrap();
    let responses = wirecall::duplex::drive(call, &[]).await.unwrap();
    assert!(responses.is_empty());
}

#[tokio::test]
async fn test_stream_stream_large_exchange_does_not_deadlock() {
    // Small pipe and small buffers everywhere: the exchange only finishes if
    // sending and receiving overlap.
    let (client_io, server_io) = duplex(1024);
    let server = greeter();
    tokio::spawn(async move {
        let _ = server.serve_io(server_io).await;
    });
    let mut config = ClientConfig::default();
    config.writer.channel_capacity = 8;
    config.inbound_buffer = 16;
    let client = Client::from_io(client_io, config);

    let call = client.stream_stream("Echo").await.unwrap();
    let requests: Vec<Message> = (0..200)
        .map(|i| Message::new(format!("payload payload payload {}", i)))
        .collect();
    let responses = wirecall::duplex::drive(call, &requests).await.unwrap();

    assert_eq!(responses, requests);
}

#[tokio::test]
async fn test_manual_duplex_receive_after_close_send() {
    let client = connect(greeter());

    let mut call = client.stream_stream("Echo").await.unwrap();
    call.send(&Message::new("only")).await.unwrap();
    call.close_send().await.unwrap();

    // Half-close stops sending, not receiving.
    assert_eq!(call.recv().await.unwrap(), Some(Message::new("only")));
    assert_eq!(call.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_recv_after_end_of_stream_is_idempotent() {
    let client = connect(greeter());

    let mut stream = client
        .unary_stream("Repeat", &Message::new("2"))
        .await
        .unwrap();

    while stream.recv().await.unwrap().is_some() {}
    assert_eq!(stream.recv().await.unwrap(), None);
    assert_eq!(stream.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_double_close_send_is_noop() {
    let client = connect(greeter());

    let mut call = client.stream_stream("Echo").await.unwrap();
    call.close_send().await.unwrap();
    call.close_send().await.unwrap();

    assert_eq!(call.recv().await.unwrap(), None);
}

#[tokio::test]
async fn test_send_after_close_send_is_invalid_state() {
    let client = connect(greeter());

    let mut call = client.stream_stream("Echo").await.unwrap();
    call.close_send().await.unwrap();

    let result = call.send(&Message::new("late")).await;
    assert!(matches!(result, Err(WirecallError::InvalidState(_))));
}

#[tokio::test]
async fn test_handler_error_reaches_caller_and_spares_connection() {
    let client = connect(greeter());

    let result = client.unary_unary("Fail", &Message::new("x")).await;
    match result {
        Err(WirecallError::Application(msg)) => assert!(msg.contains("deliberate failure")),
        other => panic!("expected application error, got {:?}", other),
    }

    // The connection survives a failed call.
    let response = client
        .unary_unary("DoUnaryUnary", &Message::new("again"))
        .await
        .unwrap();
    assert_eq!(response.text, "Hello from DoUnaryUnary");
}

#[tokio::test]
async fn test_unknown_method_is_reported() {
    let client = connect(greeter());

    let result = client.unary_unary("NoSuchMethod", &Message::new("x")).await;
    match result {
        Err(WirecallError::Application(msg)) => assert!(msg.contains("unknown method")),
        other => panic!("expected application error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_orchestrator_runs_the_four_shapes() {
    let client = connect(greeter());

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
            (0..3).map(|_| Message::new("Hello DoStreamUnary")).collect(),
        ),
        CallStep::new(
            "DoStreamStream",
            CallKind::StreamStream,
            (0..3).map(|_| Message::new("Hello DoStreamStream")).collect(),
        ),
    ];

    let outcomes = run_steps(&client, &steps).await;
    assert_eq!(outcomes.len(), 4);

    let texts: Vec<Vec<String>> = outcomes
        .iter()
        .map(|o| {
            o.result
                .as_ref()
                .unwrap()
                .iter()
                .map(|m| m.text.clone())
                .collect()
        })
        .collect();

    assert_eq!(texts[0], vec!["Hello from DoUnaryUnary"]);
    assert_eq!(texts[1], vec!["Hello from DoUnaryStream"; 3]);
    assert_eq!(texts[2], vec!["Hello from DoStreamUnary"]);
    assert_eq!(texts[3], vec!["Hello from DoStreamStream"; 3]);
}

#[tokio::test]
async fn test_orchestrator_continues_past_failure() {
    let client = connect(greeter());

    let steps = [
        CallStep::new(
            "DoUnaryUnary",
            CallKind::UnaryUnary,
            vec![Message::new("first")],
        ),
        CallStep::new("Fail", CallKind::UnaryUnary, vec![Message::new("boom")]),
        CallStep::new(
            "DoUnaryUnary",
            CallKind::UnaryUnary,
            vec![Message::new("third")],
        ),
    ];

    let outcomes = run_steps(&client, &steps).await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_ok());
    assert!(!outcomes[1].is_ok());
    assert!(outcomes[2].is_ok());
}

/// Hand-rolled peer for fault injection: parses the client's frames and
/// drives raw bytes back.
struct RawPeer {
    io: DuplexStream,
    frames: FrameBuffer,
}

impl RawPeer {
    fn new(io: DuplexStream) -> Self {
        Self {
            io,
            frames: FrameBuffer::new(),
        }
    }

    /// Read until at least one frame is parsed.
    async fn read_frames(&mut self) -> Vec<wirecall::protocol::Frame> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.io.read(&mut buf).await.unwrap();
            assert!(n > 0, "client hung up unexpectedly");
            let frames = self.frames.push(&buf[..n]).unwrap();
            if !frames.is_empty() {
                return frames;
            }
        }
    }

    /// Send one Data frame carrying a message.
    async fn send_message(&mut self, call_id: u32, text: &str) {
        let payload = MsgPackCodec::encode(&Message::new(text)).unwrap();
        let header = Header::new(call_id, FrameKind::Data, payload.len() as u32);
        self.io.write_all(&build_frame(&header, &payload)).await.unwrap();
        self.io.flush().await.unwrap();
    }
}

#[tokio::test]
async fn test_transport_break_mid_receive_is_an_error_not_end_of_stream() {
    let (client_io, server_io) = duplex(64 * 1024);
    let client = Client::from_io(client_io, ClientConfig::default());
    let mut peer = RawPeer::new(server_io);

    let mut stream = client
        .unary_stream("Anything", &Message::new("x"))
        .await
        .unwrap();

    // Wait for the Open frame, answer with one message, then cut the wire
    // without any end-of-stream.
    let frames = peer.read_frames().await;
    let call_id = frames[0].call_id();
    assert!(frames[0].is_open());
    peer.send_message(call_id, "one").await;
    let first = stream.recv().await.unwrap();
    assert_eq!(first, Some(Message::new("one")));

    drop(peer);

    // The blocked receive must fail, not hang and not report a clean end.
    let result = stream.recv().await;
    assert!(matches!(result, Err(WirecallError::ConnectionClosed)));

    // And it keeps failing the same way.
    let result = stream.recv().await;
    assert!(matches!(result, Err(WirecallError::ConnectionClosed)));
}

#[tokio::test]
async fn test_calls_are_independent_across_a_connection() {
    let client = connect(greeter());

    // Interleave two calls on the same connection.
    let mut duplex_call = client.stream_stream("Echo").await.unwrap();
    duplex_call.send(&Message::new("held open")).await.unwrap();

    let response = client
        .unary_unary("DoUnaryUnary", &Message::new("meanwhile"))
        .await
        .unwrap();
    assert_eq!(response.text, "Hello from DoUnaryUnary");

    assert_eq!(
        duplex_call.recv().await.unwrap(),
        Some(Message::new("held open"))
    );
    duplex_call.close_send().await.unwrap();
    assert_eq!(duplex_call.recv().await.unwrap(), None);
}
