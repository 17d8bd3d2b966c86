use crate::error::{Result, TtsError};
use std::path::PathBuf;

/// Where the text to synthesize comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextSource {
    Inline(String),
    File(PathBuf),
}

impl TextSource {
    /// An input file takes precedence over inline text
    pub fn from_args(text: Option<String>, input_file: Option<PathBuf>) -> Result<Self> {
        match (input_file, text) {
            (Some(path), _) => Ok(TextSource::File(path)),
            (None, Some(text)) => Ok(TextSource::Inline(text)),
            (None, None) => Err(TtsError::Config(
                "Either --text or --input-file must be provided".to_string(),
            )),
        }
    }

    pub async fn load(&self) -> Result<String> {
        match self {
            TextSource::Inline(text) => Ok(text.clone()),
            TextSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                TtsError::Config(format!("Failed to read {}: {}", path.display(), e))
            }),
        }
    }
}

/// One segment per non-blank line, trimmed. Each line becomes its own
/// session so the server's trailing silence separates them.
pub fn split_segments(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
