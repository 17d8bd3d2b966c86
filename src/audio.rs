use crate::error::Result;
use std::path::{Path, PathBuf};

/// Append-only buffer collecting the audio of every session in a run
#[derive(Debug, Default)]
pub struct AudioAccumulator {
    data: Vec<u8>,
    chunks: usize,
}

impl AudioAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one audio frame payload. Empty payloads still count as a chunk.
    pub fn append(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
        self.chunks += 1;
    }

    pub fn received_any(&self) -> bool {
        self.chunks > 0
    }

    pub fn chunks(&self) -> usize {
        self.chunks
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// `<voice>_output.<encoding>`, used when no output path is given
pub fn default_output_path(voice: &str, encoding: &str) -> PathBuf {
    PathBuf::from(format!("{}_output.{}", voice, encoding))
}

/// Write audio to `path` through a temporary sibling file, so a failed
/// write never leaves a partial output behind.
pub async fn save_audio(path: &Path, data: &[u8]) -> Result<()> {
    use tokio::fs;

    let mut partial = path.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = fs::write(&partial, data).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&partial, path).await {
        let _ = fs::remove_file(&partial).await;
        return Err(e.into());
    }

    log::info!("Audio saved: {} bytes to {}", data.len(), path.display());
    Ok(())
}
