//! Loopback test of the WebSocket transport against a local tokio-tungstenite server.

use bidi_tts::{
    config::{resource_id, ConnectionConfig, SynthesisParams, DEFAULT_RESOURCE_ID},
    event::EventType,
    protocol::Frame,
    Connection, ConnectionState, Synthesizer, TtsError,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message;

/// Accept one client, hand its handshake headers back, and play the TTS service
async fn serve_one(listener: TcpListener, headers_tx: oneshot::Sender<HeaderMap>) -> Vec<EventType> {
    let (stream, _) = listener.accept().await.unwrap();
    let callback = move |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        let _ = headers_tx.send(req.headers().clone());
        resp.headers_mut()
            .insert("x-tt-logid", HeaderValue::from_static("20260101-log"));
        Ok(resp)
    };
    let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Some(Ok(message)) = ws.next().await {
        let data = match message {
            Message::Binary(data) => data.as_slice().to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };
        let frame = Frame::from_bytes(&data).unwrap();
        let event = frame.event.unwrap();
        events.push(event);
        let sid = frame.session_id.clone().unwrap_or_default();

        let replies = match event {
            EventType::StartConnection => vec![Frame::server_event(
                EventType::ConnectionStarted,
                None,
                b"{}".to_vec(),
            )],
            EventType::StartSession => vec![Frame::server_event(
                EventType::SessionStarted,
                Some(&sid),
                b"{}".to_vec(),
            )],
            EventType::FinishSession => vec![
                Frame::server_audio(&sid, b"ID3-audio".to_vec()),
                Frame::server_event(EventType::SessionFinished, Some(&sid), b"{}".to_vec()),
            ],
            EventType::FinishConnection => vec![Frame::server_event(
                EventType::ConnectionFinished,
                None,
                b"{}".to_vec(),
            )],
            _ => Vec::new(),
        };
        for reply in replies {
            ws.send(Message::Binary(reply.to_bytes().unwrap().into()))
                .await
                .unwrap();
        }
    }
    events
}

#[test_log::test(tokio::test)]
async fn test_websocket_round_trip() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (headers_tx, headers_rx) = oneshot::channel();
    let server = tokio::spawn(serve_one(listener, headers_tx));

    let mut config = ConnectionConfig::new(
        "app-123".to_string(),
        "secret-token".to_string(),
        resource_id("S_test", None),
    );
    config.endpoint = format!("ws://{}/api/v3/tts/bidirection", addr);

    let mut connection = Connection::open(&config).await.unwrap();
    assert_eq!(connection.state(), ConnectionState::Open);
    assert_eq!(connection.log_id(), Some("20260101-log"));

    let headers = headers_rx.await.unwrap();
    assert_eq!(headers["X-Api-App-Key"], "app-123");
    assert_eq!(headers["X-Api-Access-Key"], "secret-token");
    assert_eq!(headers["X-Api-Resource-Id"], DEFAULT_RESOURCE_ID);
    assert_eq!(headers["X-Api-Connect-Id"], connection.connect_id());

    let synthesizer = Synthesizer::new(SynthesisParams::new("S_test"));
    let segments = vec!["Hello.".to_string(), "World.".to_string()];
    let output = synthesizer
        .synthesize(&mut connection, &segments)
        .await
        .unwrap();
    connection.disconnect().await.unwrap();

    assert_eq!(output.audio, b"ID3-audioID3-audio".to_vec());
    assert_eq!(output.sessions.len(), 2);

    let events = server.await.unwrap();
    assert_eq!(events.first(), Some(&EventType::StartConnection));
    assert_eq!(events.last(), Some(&EventType::FinishConnection));
    assert_eq!(
        events
            .iter()
            .filter(|e| **e == EventType::StartSession)
            .count(),
        2
    );
}

#[tokio::test]
async fn test_unreachable_endpoint_is_connection_setup_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = ConnectionConfig::new(
        "app".to_string(),
        "token".to_string(),
        resource_id("zh_voice", None),
    );
    config.endpoint = format!("ws://{}/tts", addr);

    let result = Connection::open(&config).await;
    assert!(matches!(result, Err(TtsError::ConnectionSetup(_))));
}

#[tokio::test]
async fn test_invalid_endpoint_is_config_error() {
    let mut config = ConnectionConfig::new("app".to_string(), "token".to_string(), "r".to_string());
    config.endpoint = "not a url".to_string();

    let result = Connection::open(&config).await;
    assert!(matches!(result, Err(TtsError::Config(_))));
}
