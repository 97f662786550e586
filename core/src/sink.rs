//! Writes synthesized audio to disk.

use std::path::{Path, PathBuf};

use crate::Result;

pub const DEFAULT_OUTPUT_PATH: &str = "synthesized_audio.wav";

/// Single output file, overwritten on every successful synthesis.
#[derive(Clone, Debug)]
pub struct AudioSink {
    path: PathBuf,
}

impl Default for AudioSink {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_PATH)
    }
}

impl AudioSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file contents with `audio`, byte for byte.
    pub async fn write(&self, audio: &[u8]) -> Result<PathBuf> {
        tokio::fs::write(&self.path, audio).await?;
        Ok(self.path.clone())
    }
}
