use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use voxloop_audio::{LocalVoiceConfig, MicRecognizerConfig};
use voxloop_core::{ConfigFile, VoxError};

/// Local audio settings for the voice loop: env-driven defaults with
/// `[Mic]`, `[Vad]`, `[Stt]` and `[Voice]` from the config file laid on top.
#[derive(Clone, Debug, Default)]
pub struct AudioSettings {
    pub recognizer: MicRecognizerConfig,
    pub voice: LocalVoiceConfig,
}

impl AudioSettings {
    pub fn from_config(file: &ConfigFile) -> voxloop_core::Result<Self> {
        let mut base = Self::default();
        if let Some(m) = section::<MicToml>(file, "Mic")? {
            m.apply(&mut base.recognizer);
        }
        if let Some(v) = section::<VadToml>(file, "Vad")? {
            v.apply(&mut base.recognizer);
        }
        if let Some(s) = section::<SttToml>(file, "Stt")? {
            s.apply(&mut base.recognizer);
        }
        if let Some(t) = section::<VoiceToml>(file, "Voice")? {
            t.apply(&mut base.voice);
        }
        Ok(base)
    }
}

fn section<T: DeserializeOwned>(file: &ConfigFile, name: &str) -> voxloop_core::Result<Option<T>> {
    let Some(table) = file.section(name) else {
        return Ok(None);
    };
    toml::Value::Table(table.clone())
        .try_into::<T>()
        .map(Some)
        .map_err(|e| VoxError::Config(format!("invalid [{name}] section: {e}")))
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct MicToml {
    pub sample_rate_hz: Option<u32>,
    pub device_name: Option<String>,
    pub listen_timeout_s: Option<u64>,
}
impl MicToml {
    fn apply(self, r: &mut MicRecognizerConfig) {
        if let Some(v) = self.sample_rate_hz {
            r.mic.sample_rate_hz = v;
        }
        if let Some(v) = self.device_name {
            r.mic.device_name = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = self.listen_timeout_s {
            r.listen_timeout = Duration::from_secs(v);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct VadToml {
    pub mode: Option<i32>,
    pub frame_ms: Option<u32>,
    pub min_start_ms: Option<u32>,
    pub hangover_ms: Option<u32>,
    pub max_utterance_ms: Option<u32>,
}
impl VadToml {
    fn apply(self, r: &mut MicRecognizerConfig) {
        if let Some(x) = self.mode {
            r.vad.mode = x.clamp(0, 3);
        }
        if let Some(x) = self.frame_ms.filter(|v| matches!(v, 10 | 20 | 30)) {
            // mic chunks, VAD frames and endpointer steps share one frame size
            r.vad.frame_ms = x;
            r.mic.chunk_ms = x;
            r.endpoint.frame_ms = x;
        }
        if let Some(x) = self.min_start_ms {
            r.endpoint.min_start_ms = x;
        }
        if let Some(x) = self.hangover_ms {
            r.endpoint.hangover_ms = x;
        }
        if let Some(x) = self.max_utterance_ms {
            r.endpoint.max_utterance_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SttToml {
    pub whisper_bin: Option<PathBuf>,
    pub whisper_model: Option<PathBuf>,
    pub language: Option<String>,
    pub temp_dir: Option<PathBuf>,
    pub extra_args: Option<Vec<String>>, // e.g., ["--threads", "4"]
    pub min_utterance_ms: Option<u64>,
}
impl SttToml {
    fn apply(self, r: &mut MicRecognizerConfig) {
        let s = &mut r.stt;
        if let Some(x) = self.whisper_bin {
            s.whisper_bin = x;
        }
        if let Some(x) = self.whisper_model {
            s.whisper_model = x;
        }
        if let Some(x) = self.language {
            s.language = x;
        }
        if let Some(x) = self.temp_dir {
            s.temp_dir = x;
        }
        if let Some(x) = self.extra_args {
            s.extra_args = x.into_iter().filter(|a| !a.is_empty()).collect();
        }
        if let Some(x) = self.min_utterance_ms {
            s.min_utterance_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct VoiceToml {
    pub voice: Option<String>,
    pub rate: Option<f32>,
    pub timeout_ms: Option<u64>,
    pub piper_voice: Option<PathBuf>,
    pub piper_voice_dir: Option<PathBuf>,
}
impl VoiceToml {
    fn apply(self, t: &mut LocalVoiceConfig) {
        if let Some(x) = self.voice {
            t.voice = x;
        }
        if let Some(x) = self.rate {
            t.rate = x.clamp(0.5, 2.0);
        }
        if let Some(x) = self.timeout_ms {
            t.timeout_ms = x;
        }
        if let Some(x) = self.piper_voice {
            t.piper_voice = Some(x);
        }
        if let Some(x) = self.piper_voice_dir {
            t.piper_voice_dir = Some(x);
        }
    }
}
