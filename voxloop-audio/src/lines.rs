//! Typed-input recognizer: one line of text per turn.
//!
//! Stands in for the microphone on machines without one (`--typed`).

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines, Stdin};
use voxloop_core::{RecognitionError, SpeechRecognizer};

pub struct LineRecognizer<R> {
    lines: Lines<BufReader<R>>,
}

impl LineRecognizer<Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> LineRecognizer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> SpeechRecognizer for LineRecognizer<R> {
    async fn listen(&mut self) -> Result<String, RecognitionError> {
        match self.lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => Err(RecognitionError::Unintelligible),
            Ok(Some(line)) => Ok(line.trim().to_string()),
            Ok(None) => Err(RecognitionError::Closed),
            Err(e) => Err(RecognitionError::Service(e.to_string())),
        }
    }
}
