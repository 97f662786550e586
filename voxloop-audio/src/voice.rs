//! Local voice: speaks recognized text on this machine with CLI engines.
//!
//! - espeak-ng speaks straight to the default output
//! - Piper (when a voice model is configured) renders a WAV that is played with
//!   aplay, paplay or ffplay
//! - With neither present the text is only logged
//!
//! Env overrides:
//! - PIPER_BIN, PIPER_VOICE, PIPER_VOICE_DIR
//! - ESPEAK_BIN, ESPEAK_VOICE
//! - TTS_TIMEOUT_MS, TTS_TEMP_DIR

use crate::utils::{find_binary, find_on_path, gen_id};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tokio::task;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use voxloop_core::{Result, VoiceEngine, VoxError};

#[derive(Clone, Debug)]
pub struct LocalVoiceConfig {
    pub temp_dir: PathBuf,
    pub timeout_ms: u64,
    /// espeak voice code, or a Piper voice name resolved against `piper_voice_dir`
    pub voice: String,
    /// Speech rate multiplier (0.5–2.0)
    pub rate: f32,
    pub piper_bin: Option<PathBuf>,
    pub piper_voice: Option<PathBuf>,
    pub piper_voice_dir: Option<PathBuf>,
    pub espeak_bin: Option<PathBuf>,
}

impl Default for LocalVoiceConfig {
    fn default() -> Self {
        let temp_dir = std::env::var("TTS_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir());
        let timeout_ms = std::env::var("TTS_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(20_000);
        let voice = std::env::var("ESPEAK_VOICE").unwrap_or_else(|_| "ru".to_string());

        let piper_bin = find_binary("PIPER_BIN", "piper");
        let piper_voice = std::env::var("PIPER_VOICE").ok().map(PathBuf::from);
        let piper_voice_dir = std::env::var("PIPER_VOICE_DIR").ok().map(PathBuf::from);
        let espeak_bin =
            find_binary("ESPEAK_BIN", "espeak-ng").or_else(|| find_on_path("espeak"));

        Self {
            temp_dir,
            timeout_ms,
            voice,
            rate: 1.0,
            piper_bin,
            piper_voice,
            piper_voice_dir,
            espeak_bin,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Engine {
    Piper(PathBuf, PathBuf),
    Espeak(PathBuf),
    None,
}

pub struct LocalVoice {
    cfg: LocalVoiceConfig,
    engine: Engine,
}

impl LocalVoice {
    pub fn new(cfg: LocalVoiceConfig) -> Self {
        let engine = select_engine(&cfg);
        match &engine {
            Engine::Piper(bin, model) => {
                info!(target = "tts", bin = ?bin, model = ?model, "Using Piper voice")
            }
            Engine::Espeak(bin) => info!(target = "tts", bin = ?bin, "Using espeak-ng voice"),
            Engine::None => warn!(target = "tts", "No TTS engine detected. Printing only."),
        }
        Self { cfg, engine }
    }

    pub fn engine_name(&self) -> &'static str {
        match self.engine {
            Engine::Piper(..) => "piper",
            Engine::Espeak(_) => "espeak-ng",
            Engine::None => "none",
        }
    }
}

#[async_trait]
impl VoiceEngine for LocalVoice {
    async fn speak(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if self.engine == Engine::None {
            info!(target = "tts", text = %text, "Speak (no engine)");
            return Ok(());
        }

        let cfg = self.cfg.clone();
        let engine = self.engine.clone();
        let text = text.to_string();
        let join = task::spawn_blocking(move || match engine {
            Engine::Piper(bin, model) => {
                let wav_path = cfg.temp_dir.join(format!("tts_{}.wav", gen_id()));
                let res = synth_with_piper(&bin, &model, cfg.rate, &text, &wav_path)
                    .and_then(|_| play_wav(&wav_path));
                let _ = std::fs::remove_file(&wav_path);
                res
            }
            Engine::Espeak(bin) => speak_with_espeak(&bin, &cfg.voice, cfg.rate, &text),
            Engine::None => Ok(()),
        });

        match timeout(Duration::from_millis(self.cfg.timeout_ms), join).await {
            Ok(join_res) => {
                join_res.map_err(|e| VoxError::Audio(format!("voice task failed: {e}")))?
            }
            Err(_) => Err(VoxError::Audio(format!(
                "local voice timed out after {}ms",
                self.cfg.timeout_ms
            ))),
        }
    }
}

fn select_engine(cfg: &LocalVoiceConfig) -> Engine {
    if let Some(bin) = &cfg.piper_bin {
        if let Some(model) = resolve_piper_voice_path(cfg) {
            return Engine::Piper(bin.clone(), model);
        }
        debug!(target = "tts", "Piper found but no voice model; trying espeak-ng");
    }
    if let Some(bin) = &cfg.espeak_bin {
        return Engine::Espeak(bin.clone());
    }
    Engine::None
}

fn resolve_piper_voice_path(cfg: &LocalVoiceConfig) -> Option<PathBuf> {
    if let Some(v) = &cfg.piper_voice {
        return Some(v.clone());
    }
    let dir = cfg.piper_voice_dir.as_ref()?;
    if cfg.voice.is_empty() {
        return None;
    }
    let candidate = dir.join(&cfg.voice);
    if candidate.exists() {
        return Some(candidate);
    }
    ["onnx", "onnx.gz"]
        .iter()
        .map(|ext| dir.join(format!("{}.{}", cfg.voice, ext)))
        .find(|c| c.exists())
}

fn synth_with_piper(
    piper: &Path,
    model: &Path,
    rate: f32,
    text: &str,
    out_wav: &Path,
) -> Result<()> {
    let mut cmd = Command::new(piper);
    cmd.arg("-m").arg(model);
    cmd.arg("-f").arg(out_wav);
    let length_scale = (1.0f32 / rate).clamp(0.5, 2.0);
    cmd.arg("--length_scale").arg(format!("{:.2}", length_scale));
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!(target = "tts", command = ?cmd, "Running piper");
    let mut child = cmd.spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(VoxError::Audio(format!(
            "Piper failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

fn speak_with_espeak(espeak: &Path, voice: &str, rate: f32, text: &str) -> Result<()> {
    let mut cmd = Command::new(espeak);
    let wpm = (160.0 * rate).round().clamp(80.0, 450.0) as i32;
    if !voice.is_empty() {
        cmd.arg("-v").arg(voice);
    }
    cmd.arg("-s").arg(wpm.to_string());
    cmd.arg(text);
    debug!(target = "tts", command = ?cmd, "Running espeak-ng");
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(VoxError::Audio(format!(
            "espeak-ng failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    Ok(())
}

fn play_wav(wav_path: &Path) -> Result<()> {
    let Some(player) = find_on_path("aplay")
        .or_else(|| find_on_path("paplay"))
        .or_else(|| find_on_path("ffplay"))
    else {
        info!(target = "tts", path = ?wav_path, "No audio player found");
        return Ok(());
    };
    let mut cmd = Command::new(&player);
    if player.file_name().and_then(|s| s.to_str()) == Some("ffplay") {
        cmd.arg("-autoexit").arg("-nodisp").arg("-loglevel").arg("quiet");
    }
    let status = cmd.arg(wav_path).status()?;
    if !status.success() {
        return Err(VoxError::Audio(format!(
            "{} exited with {}",
            player.display(),
            status
        )));
    }
    Ok(())
}
