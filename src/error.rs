use crate::config::ConfigError;
use crate::protocol::ProtocolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TtsError>;

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("Connection setup failed: {0}")]
    ConnectionSetup(String),

    #[error("Session {session_id} failed to start: {reason}")]
    SessionStart { session_id: String, reason: String },

    #[error("Unexpected frame: {0}")]
    UnexpectedFrame(String),

    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] ProtocolError),

    #[error("No audio data received")]
    NoAudioReceived,

    #[error("Server error ({code}): {message}")]
    Server { code: i64, message: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Send task failed: {0}")]
    SendTask(String),
}

impl TtsError {
    /// Codec errors keep their own kind when a handshake wraps failures
    pub(crate) fn or_wrap(self, wrap: impl FnOnce(String) -> TtsError) -> TtsError {
        match self {
            TtsError::MalformedFrame(_) => self,
            other => wrap(other.to_string()),
        }
    }
}

impl From<ConfigError> for TtsError {
    fn from(err: ConfigError) -> Self {
        TtsError::Config(err.to_string())
    }
}
