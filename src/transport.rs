//! The socket seam: a write half and a read half moving whole binary messages.

use crate::config::ConnectionConfig;
use crate::error::{Result, TtsError};
use crate::protocol::Frame;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::{Message, WebSocketConfig};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

#[async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, data: Vec<u8>) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait FrameSource: Send {
    /// Next binary message, or `None` once the peer has closed the stream
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;
}

/// An opened socket split into its two halves
pub struct Transport {
    pub sink: Box<dyn FrameSink>,
    pub source: Box<dyn FrameSource>,
    /// Client-side correlation token sent at connect time
    pub connect_id: String,
    /// Server-side trace id, when the server returned one
    pub log_id: Option<String>,
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct WsSink(SplitSink<WsStream, Message>);

struct WsSource(SplitStream<WsStream>);

#[async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, data: Vec<u8>) -> Result<()> {
        self.0.send(Message::Binary(data.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.0.close().await?;
        Ok(())
    }
}

#[async_trait]
impl FrameSource for WsSource {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.0.next().await {
            match message? {
                Message::Binary(data) => return Ok(Some(data.as_slice().to_vec())),
                Message::Close(frame) => {
                    log::info!("Server closed connection: {:?}", frame);
                    return Ok(None);
                }
                Message::Text(text) => {
                    log::warn!("Ignoring text message: {}", text.as_str());
                }
                // Ping/pong are answered by tungstenite itself
                _ => {}
            }
        }
        Ok(None)
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| TtsError::Config(format!("Invalid value for header {}: {}", name, e)))
}

/// Open a WebSocket to the configured endpoint with the connection headers
pub async fn connect_websocket(config: &ConnectionConfig) -> Result<Transport> {
    let connect_id = Uuid::new_v4().to_string();

    let mut request = config.endpoint.as_str().into_client_request()?;
    let headers = request.headers_mut();
    headers.insert("X-Api-App-Key", header_value("X-Api-App-Key", &config.app_id)?);
    headers.insert(
        "X-Api-Access-Key",
        header_value("X-Api-Access-Key", config.access_token())?,
    );
    headers.insert(
        "X-Api-Resource-Id",
        header_value("X-Api-Resource-Id", &config.resource_id)?,
    );
    headers.insert(
        "X-Api-Connect-Id",
        header_value("X-Api-Connect-Id", &connect_id)?,
    );

    log::info!(
        "🔗 Connecting to {} (resource: {}, connect id: {})",
        config.endpoint,
        config.resource_id,
        connect_id
    );

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);

    let (ws_stream, response) = connect_async_with_config(request, Some(ws_config), false).await?;

    let log_id = response
        .headers()
        .get("x-tt-logid")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    log::info!("Connected to WebSocket server, logid: {:?}", log_id);

    let (write, read) = ws_stream.split();
    Ok(Transport {
        sink: Box::new(WsSink(write)),
        source: Box::new(WsSource(read)),
        connect_id,
        log_id,
    })
}

struct ChannelSink {
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

struct ChannelSource {
    rx: mpsc::Receiver<Vec<u8>>,
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn send(&mut self, data: Vec<u8>) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TtsError::ConnectionClosed)?;
        tx.send(data).await.map_err(|_| TtsError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<()> {
        self.tx.take();
        Ok(())
    }
}

#[async_trait]
impl FrameSource for ChannelSource {
    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.rx.recv().await)
    }
}

/// The far end of an in-memory transport
pub struct ChannelPeer {
    incoming: mpsc::Receiver<Vec<u8>>,
    outgoing: mpsc::Sender<Vec<u8>>,
}

impl ChannelPeer {
    /// Next message the client wrote, `None` once the client closed
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.incoming.recv().await
    }

    /// Next client message decoded as a frame
    pub async fn recv_frame(&mut self) -> Option<Result<Frame>> {
        let data = self.recv().await?;
        Some(Frame::from_bytes(&data).map_err(TtsError::from))
    }

    /// Deliver raw bytes to the client, e.g. a corrupted frame
    pub async fn send_raw(&self, data: Vec<u8>) -> Result<()> {
        self.outgoing
            .send(data)
            .await
            .map_err(|_| TtsError::ConnectionClosed)
    }

    pub async fn send_frame(&self, frame: &Frame) -> Result<()> {
        self.send_raw(frame.to_bytes()?).await
    }
}

/// An in-memory transport pair. Dropping the peer closes the client's read half.
pub fn duplex(buffer: usize) -> (Transport, ChannelPeer) {
    let (client_tx, server_rx) = mpsc::channel(buffer);
    let (server_tx, client_rx) = mpsc::channel(buffer);

    let transport = Transport {
        sink: Box::new(ChannelSink {
            tx: Some(client_tx),
        }),
        source: Box::new(ChannelSource { rx: client_rx }),
        connect_id: Uuid::new_v4().to_string(),
        log_id: None,
    };
    let peer = ChannelPeer {
        incoming: server_rx,
        outgoing: server_tx,
    };
    (transport, peer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;

    #[tokio::test]
    async fn test_duplex_carries_messages_both_ways() {
        let (mut transport, mut peer) = duplex(4);

        transport.sink.send(vec![1, 2, 3]).await.unwrap();
        assert_eq!(peer.recv().await, Some(vec![1, 2, 3]));

        peer.send_frame(&Frame::server_event(
            EventType::ConnectionStarted,
            None,
            b"{}".to_vec(),
        ))
        .await
        .unwrap();
        let data = transport.source.recv().await.unwrap().unwrap();
        let frame = Frame::from_bytes(&data).unwrap();
        assert_eq!(frame.event, Some(EventType::ConnectionStarted));
    }

    #[tokio::test]
    async fn test_duplex_close_semantics() {
        let (mut transport, mut peer) = duplex(4);

        transport.sink.close().await.unwrap();
        assert!(peer.recv().await.is_none());
        assert!(matches!(
            transport.sink.send(vec![0]).await,
            Err(TtsError::ConnectionClosed)
        ));

        drop(peer);
        assert!(transport.source.recv().await.unwrap().is_none());
    }

    #[test]
    fn test_header_value_rejects_control_characters() {
        assert!(header_value("X-Api-App-Key", "app\nid").is_err());
        assert!(header_value("X-Api-App-Key", "app-id").is_ok());
    }
}
