//! Microphone recognizer: capture → VAD → endpoint → whisper, one utterance per `listen`.
//!
//! The microphone is opened for each turn and released before transcription, so
//! the local voice doesn't get picked up as the next utterance.

use crate::endpoint::{Endpointer, EndpointerConfig, Step};
use crate::mic::{MicConfig, MicStream};
use crate::stt::{SttConfig, WhisperTranscriber};
use crate::vad::{VadClassifier, VadConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use voxloop_core::{RecognitionError, SpeechRecognizer};

#[derive(Clone, Debug)]
pub struct MicRecognizerConfig {
    pub mic: MicConfig,
    pub vad: VadConfig,
    pub endpoint: EndpointerConfig,
    pub stt: SttConfig,
    /// Give up on a turn with no speech after this long (whole seconds, env LISTEN_TIMEOUT_S)
    pub listen_timeout: Duration,
}

impl Default for MicRecognizerConfig {
    fn default() -> Self {
        let vad = VadConfig::default();
        let mic = MicConfig {
            chunk_ms: vad.frame_ms,
            ..MicConfig::default()
        };
        let endpoint = EndpointerConfig {
            frame_ms: vad.frame_ms,
            ..EndpointerConfig::default()
        };
        let listen_timeout = std::env::var("LISTEN_TIMEOUT_S")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));
        Self {
            mic,
            vad,
            endpoint,
            stt: SttConfig::default(),
            listen_timeout,
        }
    }
}

pub struct MicRecognizer {
    cfg: Arc<MicRecognizerConfig>,
    stt: Arc<WhisperTranscriber>,
}

impl MicRecognizer {
    pub fn new(cfg: MicRecognizerConfig) -> Self {
        let stt = Arc::new(WhisperTranscriber::new(cfg.stt.clone()));
        Self {
            cfg: Arc::new(cfg),
            stt,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for MicRecognizer {
    async fn listen(&mut self) -> Result<String, RecognitionError> {
        let cfg = Arc::clone(&self.cfg);
        let stt = Arc::clone(&self.stt);
        // cpal and webrtc-vad handles are not Send; keep the whole turn on one blocking thread.
        tokio::task::spawn_blocking(move || {
            let (pcm, rate) = capture_utterance(&cfg)?;
            stt.transcribe(&pcm, rate)
        })
        .await
        .map_err(|e| RecognitionError::Service(format!("recognizer task failed: {e}")))?
    }
}

fn capture_utterance(cfg: &MicRecognizerConfig) -> Result<(Vec<i16>, u32), RecognitionError> {
    let mic = MicStream::open(&cfg.mic).map_err(|e| RecognitionError::Service(e.to_string()))?;
    let rate = mic.sample_rate_hz();
    let mut vad =
        VadClassifier::new(&cfg.vad, rate).map_err(|e| RecognitionError::Service(e.to_string()))?;
    let mut endpointer = Endpointer::new(&cfg.endpoint);
    let frame_len = vad.frame_len();
    let deadline = Instant::now() + cfg.listen_timeout;
    let mut pending: Vec<i16> = Vec::with_capacity(frame_len * 2);

    'capture: loop {
        if !endpointer.in_speech() && Instant::now() >= deadline {
            debug!("No speech within {:?}", cfg.listen_timeout);
            return Err(RecognitionError::Unintelligible);
        }
        let chunk = match mic.recv_timeout(Duration::from_millis(200)) {
            Ok(Some(chunk)) => chunk,
            Ok(None) => continue,
            Err(e) => return Err(RecognitionError::Service(e.to_string())),
        };
        pending.extend(chunk);
        while pending.len() >= frame_len {
            let frame: Vec<i16> = pending.drain(..frame_len).collect();
            let is_speech = vad.is_speech(&frame);
            let was_speaking = endpointer.in_speech();
            let step = endpointer.push(frame, is_speech);
            if !was_speaking && step == Step::Speaking {
                info!("Speech started ({}Hz, device=\"{}\")", rate, mic.device_name());
            }
            if step == Step::Done {
                break 'capture;
            }
        }
    }
    drop(mic);
    info!("Speech ended, transcribing");
    Ok((endpointer.finish(), rate))
}
