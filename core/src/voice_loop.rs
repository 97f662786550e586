//! Listen → synthesize → speak, until the input ends.
//!
//! The loop owns its collaborators for the process lifetime and runs one turn
//! at a time. A failed synthesis (SSO, channel, RPC, file write) is logged and
//! the loop goes back to listening. It stops when the recognizer reports that
//! its input is closed, or when the caller drops it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::client::Synthesized;
use crate::synth::SpeechSynthesizer;
use crate::{Result, VoxError};

const RECOGNITION_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// Audio was captured but no words could be made out.
    #[error("could not understand audio")]
    Unintelligible,
    /// The recognizer itself failed (device, engine, network).
    #[error("recognition service error: {0}")]
    Service(String),
    /// The input has ended for good (e.g. stdin reached EOF).
    #[error("input closed")]
    Closed,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Block until one utterance has been captured and transcribed.
    async fn listen(&mut self) -> std::result::Result<String, RecognitionError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceEngine: Send {
    /// Speak `text` on the local audio output and wait until done.
    async fn speak(&mut self, text: &str) -> Result<()>;
}

/// Outcome of a single listen/synthesize turn.
#[derive(Debug)]
pub enum Turn {
    NoSpeech,
    RecognitionFailed(String),
    InputClosed,
    Spoken {
        text: String,
        synthesized: Synthesized,
    },
    SynthesisFailed {
        text: String,
        error: VoxError,
    },
}

pub struct VoiceLoop<R, V, S> {
    recognizer: R,
    voice: V,
    synthesizer: S,
}

impl<R, V, S> VoiceLoop<R, V, S>
where
    R: SpeechRecognizer,
    V: VoiceEngine,
    S: SpeechSynthesizer,
{
    pub fn new(recognizer: R, voice: V, synthesizer: S) -> Self {
        Self {
            recognizer,
            voice,
            synthesizer,
        }
    }

    /// Run one Listening → Synthesizing turn.
    pub async fn run_once(&mut self) -> Turn {
        info!(target = "voice_loop", "Say something...");
        let text = match self.recognizer.listen().await {
            Ok(t) if !t.trim().is_empty() => t,
            Ok(_) | Err(RecognitionError::Unintelligible) => {
                warn!(target = "voice_loop", "Could not recognize speech");
                return Turn::NoSpeech;
            }
            Err(RecognitionError::Service(e)) => {
                error!(target = "voice_loop", error = %e, "Speech recognition service error");
                return Turn::RecognitionFailed(e);
            }
            Err(RecognitionError::Closed) => {
                info!(target = "voice_loop", "Input closed");
                return Turn::InputClosed;
            }
        };
        info!(target = "voice_loop", text = %text, "You said");

        let synthesized = match self.synthesizer.synthesize(&text).await {
            Ok(s) => s,
            Err(error) => {
                error!(target = "voice_loop", error = %error, "Synthesis failed; skipping this turn");
                return Turn::SynthesisFailed { text, error };
            }
        };

        // The remote audio is already on disk; a local playback failure does not undo that.
        if let Err(e) = self.voice.speak(&text).await {
            warn!(target = "voice_loop", error = %e, "Local voice failed");
        }
        Turn::Spoken { text, synthesized }
    }

    /// Run turns until the recognizer's input closes. Returns the number of turns taken,
    /// the closing one included. Drop the future to stop earlier (e.g. on Ctrl+C).
    pub async fn run(&mut self) -> u64 {
        let mut turns = 0u64;
        loop {
            turns += 1;
            let turn = self.run_once().await;
            tracing::debug!(target = "voice_loop", turns, outcome = ?turn, "Turn finished");
            match turn {
                Turn::InputClosed => return turns,
                // A broken recognizer fails instantly; don't spin on it.
                Turn::RecognitionFailed(_) => tokio::time::sleep(RECOGNITION_RETRY_DELAY).await,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::MockSpeechSynthesizer;
    use mockall::predicate::eq;

    fn audio() -> Synthesized {
        Synthesized {
            audio: vec![0u8; 10],
            request_id: "req-1".into(),
            trace_id: "1234".into(),
        }
    }

    #[tokio::test]
    async fn unintelligible_audio_skips_rpc() {
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen()
            .times(1)
            .returning(|| Err(RecognitionError::Unintelligible));
        let mut voice = MockVoiceEngine::new();
        voice.expect_speak().never();
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().never();

        let mut vl = VoiceLoop::new(rec, voice, synth);
        assert!(matches!(vl.run_once().await, Turn::NoSpeech));
    }

    #[tokio::test]
    async fn service_error_is_reported_and_skips_rpc() {
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen()
            .returning(|| Err(RecognitionError::Service("offline".into())));
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().never();

        let mut vl = VoiceLoop::new(rec, MockVoiceEngine::new(), synth);
        match vl.run_once().await {
            Turn::RecognitionFailed(e) => assert_eq!(e, "offline"),
            other => panic!("unexpected turn {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_transcript_counts_as_no_speech() {
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen().returning(|| Ok("   ".into()));
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().never();

        let mut vl = VoiceLoop::new(rec, MockVoiceEngine::new(), synth);
        assert!(matches!(vl.run_once().await, Turn::NoSpeech));
    }

    #[tokio::test]
    async fn recognized_text_is_synthesized_then_spoken() {
        let mut seq = mockall::Sequence::new();
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen().returning(|| Ok("hello".into()));
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_synthesize()
            .with(eq("hello"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(audio()));
        let mut voice = MockVoiceEngine::new();
        voice
            .expect_speak()
            .with(eq("hello"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let mut vl = VoiceLoop::new(rec, voice, synth);
        match vl.run_once().await {
            Turn::Spoken { text, synthesized } => {
                assert_eq!(text, "hello");
                assert_eq!(synthesized.audio.len(), 10);
            }
            other => panic!("unexpected turn {other:?}"),
        }
    }

    #[tokio::test]
    async fn sso_timeout_is_logged_and_next_turn_proceeds() {
        let mut rec = MockSpeechRecognizer::new();
        let mut calls = 0;
        rec.expect_listen().times(2).returning(move || {
            calls += 1;
            Ok(format!("phrase {calls}"))
        });
        let mut synth = MockSpeechSynthesizer::new();
        synth
            .expect_synthesize()
            .with(eq("phrase 1"))
            .returning(|_| Err(VoxError::Auth("SSO request timed out".into())));
        synth
            .expect_synthesize()
            .with(eq("phrase 2"))
            .returning(|_| Ok(audio()));
        let mut voice = MockVoiceEngine::new();
        voice
            .expect_speak()
            .with(eq("phrase 2"))
            .times(1)
            .returning(|_| Ok(()));

        let mut vl = VoiceLoop::new(rec, voice, synth);
        match vl.run_once().await {
            Turn::SynthesisFailed { text, error } => {
                assert_eq!(text, "phrase 1");
                assert!(matches!(error, VoxError::Auth(_)));
            }
            other => panic!("unexpected turn {other:?}"),
        }
        assert!(matches!(vl.run_once().await, Turn::Spoken { .. }));
    }

    #[tokio::test]
    async fn local_voice_failure_does_not_fail_the_turn() {
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen().returning(|| Ok("hi".into()));
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().returning(|_| Ok(audio()));
        let mut voice = MockVoiceEngine::new();
        voice
            .expect_speak()
            .returning(|_| Err(VoxError::Audio("no output device".into())));

        let mut vl = VoiceLoop::new(rec, voice, synth);
        assert!(matches!(vl.run_once().await, Turn::Spoken { .. }));
    }

    #[tokio::test]
    async fn run_keeps_going_after_failures() {
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen()
            .returning(|| Err(RecognitionError::Service("no input device".into())));
        let mut vl = VoiceLoop::new(rec, MockVoiceEngine::new(), MockSpeechSynthesizer::new());

        // A failing recognizer is not a closed one; only an outside deadline ends the loop.
        let res = tokio::time::timeout(std::time::Duration::from_millis(50), vl.run()).await;
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn closed_input_ends_run() {
        let mut seq = mockall::Sequence::new();
        let mut rec = MockSpeechRecognizer::new();
        rec.expect_listen()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok("hi".into()));
        rec.expect_listen()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(RecognitionError::Closed));
        let mut synth = MockSpeechSynthesizer::new();
        synth.expect_synthesize().times(1).returning(|_| Ok(audio()));
        let mut voice = MockVoiceEngine::new();
        voice.expect_speak().times(1).returning(|_| Ok(()));

        let mut vl = VoiceLoop::new(rec, voice, synth);
        let turns = tokio::time::timeout(std::time::Duration::from_secs(5), vl.run())
            .await
            .expect("run should return once the input is closed");
        assert_eq!(turns, 2);
    }
}
