use secrecy::{ExposeSecret, SecretBox};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "wss://openspeech.bytedance.com/api/v3/tts/bidirection";

/// Resource used by voices with the reserved `S_` prefix
pub const DEFAULT_RESOURCE_ID: &str = "volc.megatts.default";

/// Resource used by every other voice
pub const FALLBACK_RESOURCE_ID: &str = "volc.service_type.10029";

const CUSTOM_VOICE_PREFIX: &str = "S_";

/// Server frames can be large audio pushes
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

pub const DEFAULT_PROMPT: &str = "你是一位资深英语老师，请用缓慢、娓娓道来的语气说话，语调要轻松幽默，像在和朋友聊天一样自然亲切。";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(String),
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },
}

/// Pick the resource id for a voice unless one was given explicitly
pub fn resource_id(voice: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ if voice.starts_with(CUSTOM_VOICE_PREFIX) => DEFAULT_RESOURCE_ID.to_string(),
        _ => FALLBACK_RESOURCE_ID.to_string(),
    }
}

/// Knobs that apply to every wait on the connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Upper bound on each wait for an inbound frame. `None` waits forever.
    pub receive_timeout: Option<Duration>,
}

/// Everything needed to open the socket
#[derive(Debug)]
pub struct ConnectionConfig {
    pub endpoint: String,
    pub app_id: String,
    pub access_token: SecretBox<String>,
    pub resource_id: String,
    pub max_message_size: usize,
    pub options: ConnectOptions,
}

impl ConnectionConfig {
    pub fn new(app_id: String, access_token: String, resource_id: String) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            app_id,
            access_token: SecretBox::new(Box::new(access_token)),
            resource_id,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            options: ConnectOptions::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::Missing("app id".to_string()));
        }
        if self.access_token.expose_secret().trim().is_empty() {
            return Err(ConfigError::Missing("access token".to_string()));
        }
        if self.resource_id.trim().is_empty() {
            return Err(ConfigError::Missing("resource id".to_string()));
        }

        let url = Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }
        Ok(())
    }

    /// Get the access token (use only when building the handshake request)
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// Read-only synthesis parameters shared by every session of a run
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisParams {
    pub speaker: String,
    pub format: String,
    pub sample_rate: u32,
    /// -50 (0.5x) to 100 (2x)
    pub speech_rate: i32,
    pub prompt: Option<String>,
    /// Silence the server appends after each segment
    pub silence_duration_ms: u32,
    pub enable_timestamp: bool,
    pub disable_markdown_filter: bool,
}

impl SynthesisParams {
    pub fn new(speaker: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            format: "mp3".to_string(),
            sample_rate: 24000,
            speech_rate: -15,
            prompt: Some(DEFAULT_PROMPT.to_string()),
            silence_duration_ms: 800,
            enable_timestamp: true,
            disable_markdown_filter: true,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.speaker.trim().is_empty() {
            return Err(ConfigError::Missing("voice type".to_string()));
        }
        if !(-50..=100).contains(&self.speech_rate) {
            return Err(ConfigError::InvalidValue {
                name: "speech rate".to_string(),
                reason: format!("{} is outside -50..=100", self.speech_rate),
            });
        }
        if self.format.trim().is_empty() {
            return Err(ConfigError::Missing("audio encoding".to_string()));
        }
        Ok(())
    }
}
