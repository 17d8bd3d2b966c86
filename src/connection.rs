use crate::config::{ConnectOptions, ConnectionConfig};
use crate::error::{Result, TtsError};
use crate::event::{Direction, EventType, MsgType};
use crate::protocol::Frame;
use crate::transport::{self, FrameSink, FrameSource, Transport};
use serde::Deserialize;
use std::sync::Arc;
use strum::Display;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Cloneable write handle. All writers go through one lock so frames are
/// never interleaved on the socket.
#[derive(Clone)]
pub struct FrameSender {
    sink: Arc<Mutex<Box<dyn FrameSink>>>,
}

impl FrameSender {
    /// Write one frame. Only client request events may be sent.
    pub async fn send(&self, frame: &Frame) -> Result<()> {
        if let Some(event) = frame.event.filter(|e| e.direction() != Direction::Request) {
            return Err(TtsError::UnexpectedFrame(format!(
                "{} is a server event and cannot be sent",
                event
            )));
        }
        let bytes = frame.to_bytes()?;
        log::debug!(
            "→ {} {:?} session={:?} ({} payload bytes)",
            frame.msg_type,
            frame.event,
            frame.session_id,
            frame.payload.len()
        );
        self.sink.lock().await.send(bytes).await
    }

    async fn close(&self) -> Result<()> {
        self.sink.lock().await.close().await
    }
}

/// Body of error frames and failure events
#[derive(Debug, Deserialize)]
struct ServerStatus {
    #[serde(alias = "code")]
    status_code: Option<i64>,
    #[serde(alias = "error")]
    message: Option<String>,
}

/// Error described by a server error frame or failure event, if any
pub(crate) fn server_failure(frame: &Frame) -> Option<TtsError> {
    let is_failure = frame.msg_type == MsgType::Error || frame.event.is_some_and(|e| e.is_failure());
    if !is_failure {
        return None;
    }

    let status = serde_json::from_slice::<ServerStatus>(&frame.payload).ok();
    let code = frame
        .error_code
        .map(i64::from)
        .or_else(|| status.as_ref().and_then(|s| s.status_code))
        .unwrap_or(-1);
    let message = status
        .and_then(|s| s.message)
        .unwrap_or_else(|| match frame.event {
            Some(event) => format!("{} ({})", event, frame.payload_text()),
            None => frame.payload_text(),
        });

    Some(TtsError::Server { code, message })
}

/// The single socket of a run, from the start-connection handshake to the
/// finish-connection handshake.
pub struct Connection {
    sender: FrameSender,
    source: Box<dyn FrameSource>,
    state: ConnectionState,
    connect_id: String,
    log_id: Option<String>,
    options: ConnectOptions,
}

impl Connection {
    /// Open the WebSocket described by `config` and run the connection handshake
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let transport = transport::connect_websocket(config)
            .await
            .map_err(|e| e.or_wrap(TtsError::ConnectionSetup))?;
        Self::establish(transport, config.options).await
    }

    /// Run the connection handshake over an already opened transport
    pub async fn establish(transport: Transport, options: ConnectOptions) -> Result<Self> {
        let Transport {
            sink,
            source,
            connect_id,
            log_id,
        } = transport;

        let mut connection = Self {
            sender: FrameSender {
                sink: Arc::new(Mutex::new(sink)),
            },
            source,
            state: ConnectionState::Disconnected,
            connect_id,
            log_id,
            options,
        };

        connection.transition(ConnectionState::Connecting);
        if let Err(e) = connection.handshake().await {
            log::error!("Connection handshake failed: {}", e);
            if let Err(close_err) = connection.sender.close().await {
                log::warn!("Failed to close socket after handshake failure: {}", close_err);
            }
            connection.transition(ConnectionState::Disconnected);
            return Err(e.or_wrap(TtsError::ConnectionSetup));
        }
        connection.transition(ConnectionState::Open);
        log::info!("Connection {} started", connection.connect_id);

        Ok(connection)
    }

    async fn handshake(&mut self) -> Result<()> {
        self.sender.send(&Frame::start_connection()).await?;
        let ack = self
            .wait_for_event(MsgType::FullServerResponse, EventType::ConnectionStarted)
            .await?;
        if let Some(server_id) = ack.connect_id.filter(|id| !id.is_empty()) {
            log::debug!("Server connect id: {}", server_id);
        }
        Ok(())
    }

    /// Finish the connection and release the socket.
    ///
    /// Consumes the connection, so the finish handshake runs at most once.
    /// The socket is closed even when the handshake fails.
    pub async fn disconnect(mut self) -> Result<()> {
        log::info!("Finishing connection {}", self.connect_id);

        let finished = match self.sender.send(&Frame::finish_connection()).await {
            Ok(()) => self
                .wait_for_event(MsgType::FullServerResponse, EventType::ConnectionFinished)
                .await
                .map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = &finished {
            log::warn!("Connection finish handshake failed: {}", e);
        }

        self.transition(ConnectionState::Closing);
        let closed = self.sender.close().await;
        self.transition(ConnectionState::Disconnected);
        log::info!("Connection closed");

        finished.and(closed)
    }

    /// Handle for writing frames, shareable with a spawned task
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    pub async fn send(&self, frame: &Frame) -> Result<()> {
        self.sender.send(frame).await
    }

    /// Next inbound frame, bounded by the configured receive timeout
    pub async fn recv_frame(&mut self) -> Result<Frame> {
        self.next_frame("next frame").await
    }

    async fn next_frame(&mut self, waiting_for: &str) -> Result<Frame> {
        let received = match self.options.receive_timeout {
            Some(limit) => tokio::time::timeout(limit, self.source.recv())
                .await
                .map_err(|_| TtsError::Timeout(waiting_for.to_string()))?,
            None => self.source.recv().await,
        };

        let data = received?.ok_or(TtsError::ConnectionClosed)?;
        let frame = Frame::from_bytes(&data)?;
        log::debug!(
            "← {} {:?} session={:?} ({} payload bytes)",
            frame.msg_type,
            frame.event,
            frame.session_id,
            frame.payload.len()
        );
        Ok(frame)
    }

    /// Block until a frame with exactly this type and event arrives.
    ///
    /// Failure frames in between abort the wait; stray audio and
    /// informational events are skipped.
    pub async fn wait_for_event(&mut self, msg_type: MsgType, event: EventType) -> Result<Frame> {
        let waiting_for = event.to_string();
        loop {
            let frame = self.next_frame(&waiting_for).await?;
            if frame.matches(msg_type, event) {
                return Ok(frame);
            }
            if let Some(err) = server_failure(&frame) {
                return Err(err);
            }
            if frame.is_audio() {
                log::warn!(
                    "Discarding stray audio frame ({} bytes) while waiting for {}",
                    frame.payload.len(),
                    event
                );
            } else {
                log::debug!(
                    "Ignoring {} {:?} while waiting for {}",
                    frame.msg_type,
                    frame.event,
                    event
                );
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) {
        log::debug!("Connection state: {} → {}", self.state, next);
        self.state = next;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connect_id(&self) -> &str {
        &self.connect_id
    }

    pub fn log_id(&self) -> Option<&str> {
        self.log_id.as_deref()
    }
}

/// Combine the result of the work done on a connection with the result of
/// tearing it down. The work's error takes precedence.
pub fn settle<T>(work: Result<T>, teardown: Result<()>) -> Result<T> {
    match (work, teardown) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(teardown_err)) => {
            log::error!("Connection teardown also failed: {}", teardown_err);
            Err(e)
        }
    }
}
