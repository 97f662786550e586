//! Speech-to-text through the whisper.cpp command line.
//!
//! An utterance is written to a temporary 16 kHz mono WAV, whisper is run on
//! it, and the stdout transcript is cleaned of progress/status lines.

use crate::utils::gen_id;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};
use voxloop_core::RecognitionError;

/// Rate whisper.cpp expects its input at.
pub const WHISPER_RATE_HZ: u32 = 16_000;

#[derive(Clone, Debug)]
pub struct SttConfig {
    /// Path to whisper.cpp executable (e.g., "./whisper.cpp/main")
    pub whisper_bin: PathBuf,
    /// Path to whisper model file (e.g., "./models/ggml-base.bin")
    pub whisper_model: PathBuf,
    /// Language for transcription (e.g., "ru", "en", "auto")
    pub language: String,
    /// Temporary directory for WAV files
    pub temp_dir: PathBuf,
    /// Additional whisper.cpp arguments (e.g., ["--threads", "4"])
    pub extra_args: Vec<String>,
    /// Utterances shorter than this are treated as unintelligible
    pub min_utterance_ms: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        let whisper_bin = std::env::var("WHISPER_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("whisper"));
        let whisper_model = std::env::var("WHISPER_MODEL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ggml-base.bin"));
        let language = std::env::var("WHISPER_LANG").unwrap_or_else(|_| "ru".to_string());
        let temp_dir = std::env::var("STT_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());

        // comma-separated
        let extra_args = std::env::var("WHISPER_EXTRA_ARGS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|arg| arg.trim().to_string())
                    .filter(|arg| !arg.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            whisper_bin,
            whisper_model,
            language,
            temp_dir,
            extra_args,
            min_utterance_ms: 200,
        }
    }
}

pub struct WhisperTranscriber {
    cfg: SttConfig,
}

impl WhisperTranscriber {
    pub fn new(cfg: SttConfig) -> Self {
        if !cfg.whisper_bin.exists() {
            warn!(
                "Whisper binary not found at {:?}; set WHISPER_BIN or install whisper.cpp",
                cfg.whisper_bin
            );
        }
        if !cfg.whisper_model.exists() {
            warn!(
                "Whisper model not found at {:?}; set WHISPER_MODEL_PATH",
                cfg.whisper_model
            );
        }
        Self { cfg }
    }

    /// Transcribe mono PCM captured at `rate_hz`. Blocks on the whisper process.
    pub fn transcribe(&self, pcm: &[i16], rate_hz: u32) -> Result<String, RecognitionError> {
        let duration_ms = duration_ms(pcm.len(), rate_hz);
        if duration_ms < self.cfg.min_utterance_ms {
            info!("Utterance too short ({}ms), skipping transcription", duration_ms);
            return Err(RecognitionError::Unintelligible);
        }

        let pcm16k = resample_to_16k(pcm, rate_hz);
        let wav_path = self
            .cfg
            .temp_dir
            .join(format!("utterance_{}.wav", gen_id()));
        write_wav(&wav_path, &pcm16k, WHISPER_RATE_HZ)
            .map_err(|e| RecognitionError::Service(format!("failed to write WAV: {e}")))?;
        debug!("Wrote WAV file: {:?} ({} samples)", wav_path, pcm16k.len());

        let result = self.run_whisper(&wav_path);

        if std::env::var("STT_KEEP_WAV").is_ok() {
            info!("Kept WAV file for debugging: {:?}", wav_path);
        } else {
            let _ = std::fs::remove_file(&wav_path);
        }

        let transcript = result?;
        if transcript.is_empty() {
            return Err(RecognitionError::Unintelligible);
        }
        info!("Transcript: {}", transcript);
        Ok(transcript)
    }

    fn run_whisper(&self, wav_path: &Path) -> Result<String, RecognitionError> {
        let mut cmd = Command::new(&self.cfg.whisper_bin);
        cmd.arg("-m").arg(&self.cfg.whisper_model);
        cmd.arg("-f").arg(wav_path);
        if !self.cfg.language.is_empty() && self.cfg.language != "auto" {
            cmd.arg("-l").arg(&self.cfg.language);
        }
        cmd.arg("--no-timestamps");
        cmd.arg("--no-prints");
        for arg in &self.cfg.extra_args {
            cmd.arg(arg);
        }
        debug!("Running whisper command: {:?}", cmd);

        let output = cmd
            .output()
            .map_err(|e| RecognitionError::Service(format!("failed to run whisper: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Service(format!(
                "whisper failed with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(parse_transcript(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn duration_ms(samples: usize, rate_hz: u32) -> u64 {
    if rate_hz == 0 {
        return 0;
    }
    (samples as u64 * 1000) / rate_hz as u64
}

/// Keep transcript lines, dropping whisper.cpp progress/status output.
fn parse_transcript(stdout: &str) -> String {
    stdout
        .lines()
        .filter(|line| {
            !line.starts_with('[')
                && !line.trim().is_empty()
                && !line.contains("whisper_")
                && !line.contains("load time")
                && !line.contains("system_info")
        })
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Bring VAD-rate PCM to 16 kHz: integer decimation from above, sample repeat from 8 kHz.
pub fn resample_to_16k(pcm: &[i16], rate_hz: u32) -> Vec<i16> {
    match rate_hz {
        WHISPER_RATE_HZ => pcm.to_vec(),
        r if r > WHISPER_RATE_HZ && r % WHISPER_RATE_HZ == 0 => {
            let step = (r / WHISPER_RATE_HZ) as usize;
            pcm.chunks(step)
                .map(|c| (c.iter().map(|&s| s as i32).sum::<i32>() / c.len() as i32) as i16)
                .collect()
        }
        8_000 => pcm.iter().flat_map(|&s| [s, s]).collect(),
        r => {
            // Linear interpolation for anything else.
            let out_len = (pcm.len() as u64 * WHISPER_RATE_HZ as u64 / r.max(1) as u64) as usize;
            let ratio = r as f64 / WHISPER_RATE_HZ as f64;
            (0..out_len)
                .map(|i| {
                    let pos = i as f64 * ratio;
                    let idx = pos as usize;
                    let frac = pos - idx as f64;
                    let a = pcm.get(idx).copied().unwrap_or(0) as f64;
                    let b = pcm.get(idx + 1).copied().unwrap_or(a as i16) as f64;
                    (a + (b - a) * frac) as i16
                })
                .collect()
        }
    }
}

fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<(), hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()
}
