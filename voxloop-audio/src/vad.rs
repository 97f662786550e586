//! Per-frame speech detection with WebRTC VAD.
//!
//! `webrtc_vad::Vad` is not `Send`; build the classifier on the thread that uses it.

use tracing::warn;
use voxloop_core::{Result, VoxError};
use webrtc_vad::{SampleRate, Vad, VadMode};

#[derive(Clone, Debug)]
pub struct VadConfig {
    /// Aggressiveness mode 0..=3 (higher = more aggressive = more strict speech)
    pub mode: i32,
    /// Frame size in milliseconds (allowed: 10, 20, 30). Default: 20
    pub frame_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        let mode = std::env::var("VAD_MODE")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .map(|m| m.clamp(0, 3))
            .unwrap_or(2);
        let frame_ms = std::env::var("VAD_FRAME_MS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&v| v == 10 || v == 20 || v == 30)
            .unwrap_or(20);
        Self { mode, frame_ms }
    }
}

pub struct VadClassifier {
    vad: Vad,
    frame_len: usize,
}

fn vad_mode(mode: i32) -> VadMode {
    match mode {
        0 => VadMode::Quality,
        1 => VadMode::LowBitrate,
        3 => VadMode::VeryAggressive,
        _ => VadMode::Aggressive,
    }
}

fn vad_rate(rate_hz: u32) -> Option<SampleRate> {
    match rate_hz {
        8000 => Some(SampleRate::Rate8kHz),
        16000 => Some(SampleRate::Rate16kHz),
        32000 => Some(SampleRate::Rate32kHz),
        48000 => Some(SampleRate::Rate48kHz),
        _ => None,
    }
}

impl VadClassifier {
    pub fn new(cfg: &VadConfig, rate_hz: u32) -> Result<Self> {
        let rate = vad_rate(rate_hz).ok_or_else(|| {
            VoxError::Audio(format!("VAD: unsupported sample_rate={rate_hz}Hz"))
        })?;
        if !matches!(cfg.frame_ms, 10 | 20 | 30) {
            return Err(VoxError::Audio(format!(
                "VAD: unsupported frame size {}ms",
                cfg.frame_ms
            )));
        }
        let mut vad = Vad::new();
        vad.set_mode(vad_mode(cfg.mode));
        let _ = vad.set_sample_rate(rate);
        Ok(Self {
            vad,
            frame_len: (rate_hz as usize) * (cfg.frame_ms as usize) / 1000,
        })
    }

    /// Samples per frame at the configured rate.
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Classify one frame of exactly `frame_len` samples. Errors count as silence.
    pub fn is_speech(&mut self, frame: &[i16]) -> bool {
        if frame.len() != self.frame_len {
            warn!(
                "VAD: frame of {} samples, expected {}",
                frame.len(),
                self.frame_len
            );
            return false;
        }
        match self.vad.is_voice_segment(frame) {
            Ok(b) => b,
            Err(e) => {
                warn!("VAD error: {:?}", e);
                false
            }
        }
    }
}
