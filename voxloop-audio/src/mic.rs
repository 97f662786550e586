//! Microphone capture using cpal.
//!
//! Linux build note: you need ALSA development headers for `cpal`.
//! On Debian/Ubuntu:
//!   sudo apt-get update && sudo apt-get install -y libasound2-dev pkg-config
//!
//! The cpal stream is not `Send`, so it lives on a dedicated thread for as long
//! as the `MicStream` handle exists. Frames arrive as mono i16 chunks.
use crate::utils::downmix;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};
use voxloop_core::{Result, VoxError};

/// Configuration for microphone capture
#[derive(Clone, Debug)]
pub struct MicConfig {
    /// Desired sample rate; falls back to 48k/32k/16k/8k (all VAD-compatible)
    pub sample_rate_hz: u32,
    /// Desired channels; default mono
    pub channels: u16,
    /// Chunk size in milliseconds for emitted frames
    pub chunk_ms: u32,
    /// Optional input device name substring to match
    pub device_name: Option<String>,
}

impl Default for MicConfig {
    fn default() -> Self {
        let chunk_ms = std::env::var("MIC_CHUNK_MS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|&v| v == 10 || v == 20 || v == 30)
            .unwrap_or(20);
        Self {
            sample_rate_hz: 16_000,
            channels: 1,
            chunk_ms,
            device_name: std::env::var("MIC_DEVICE").ok().filter(|s| !s.is_empty()),
        }
    }
}

/// An open microphone. Dropping it stops capture and releases the device.
pub struct MicStream {
    rx: Receiver<Vec<i16>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate_hz: u32,
    device_name: String,
}

impl MicStream {
    /// Open the configured (or default) input device and start capturing.
    pub fn open(cfg: &MicConfig) -> Result<Self> {
        let (frame_tx, frame_rx) = mpsc::sync_channel::<Vec<i16>>(256);
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(u32, String)>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = Arc::clone(&stop);
        let cfg_thread = cfg.clone();

        let thread = std::thread::Builder::new()
            .name("mic-capture".into())
            .spawn(move || {
                let stream = match build_stream(&cfg_thread, frame_tx) {
                    Ok((stream, rate, name)) => {
                        let _ = ready_tx.send(Ok((rate, name)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                while !stop_thread.load(Ordering::Relaxed) {
                    std::thread::sleep(Duration::from_millis(20));
                }
                drop(stream);
            })?;

        let (sample_rate_hz, device_name) = ready_rx
            .recv()
            .map_err(|_| VoxError::Audio("mic thread exited before start".into()))??;
        Ok(Self {
            rx: frame_rx,
            stop,
            thread: Some(thread),
            sample_rate_hz,
            device_name,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Next mono chunk, `Ok(None)` on timeout, error if the stream died.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Vec<i16>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(VoxError::Audio("microphone stream closed".into()))
            }
        }
    }
}

impl Drop for MicStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

fn select_device(host: &cpal::Host, needle: Option<&str>) -> Option<cpal::Device> {
    if let Some(needle) = needle {
        match host.input_devices() {
            Ok(devices) => {
                for dev in devices {
                    if let Ok(name) = dev.name() {
                        if name.to_lowercase().contains(&needle.to_lowercase()) {
                            info!("Selected input device by MIC_DEVICE='{}': {}", needle, name);
                            return Some(dev);
                        }
                    }
                }
                warn!("No input device matches '{}'; using default", needle);
            }
            Err(e) => warn!("Failed to list input devices: {}", e),
        }
    }
    host.default_input_device()
}

/// Rank input sample formats: F32 > I16 > U16 > U8.
fn fmt_rank(fmt: cpal::SampleFormat) -> usize {
    match fmt {
        cpal::SampleFormat::F32 => 3,
        cpal::SampleFormat::I16 => 2,
        cpal::SampleFormat::U16 => 1,
        _ => 0,
    }
}

fn choose_config(
    device: &cpal::Device,
    cfg: &MicConfig,
) -> Result<cpal::SupportedStreamConfig> {
    let preferred_rates = [cfg.sample_rate_hz, 48_000u32, 32_000, 16_000, 8_000];
    let ranges = device
        .supported_input_configs()
        .map_err(|e| VoxError::Audio(format!("failed to query input configs: {e}")))?;

    // (fmt_rank, channel penalty, rate rank) → best first
    let mut best: Option<((usize, usize, usize), cpal::SupportedStreamConfig)> = None;
    for range in ranges {
        let fmt = range.sample_format();
        let ch = range.channels();
        for (rank, &rate) in preferred_rates.iter().enumerate() {
            if range.min_sample_rate().0 > rate || range.max_sample_rate().0 < rate {
                continue;
            }
            let ch_penalty = if ch == cfg.channels { 0 } else if ch == 2 { 1 } else { 2 };
            let key = (usize::MAX - fmt_rank(fmt), ch_penalty, rank);
            if best.as_ref().map_or(true, |(k, _)| key < *k) {
                best = Some((
                    key,
                    cpal::SupportedStreamConfig::new(
                        ch,
                        cpal::SampleRate(rate),
                        range.buffer_size().clone(),
                        fmt,
                    ),
                ));
            }
        }
    }
    best.map(|(_, c)| c).ok_or_else(|| {
        VoxError::Audio("input device supports no VAD-compatible sample rate".into())
    })
}

fn build_stream(
    cfg: &MicConfig,
    tx: SyncSender<Vec<i16>>,
) -> Result<(cpal::Stream, u32, String)> {
    let host = cpal::default_host();
    let device = select_device(&host, cfg.device_name.as_deref())
        .ok_or_else(|| VoxError::Audio("no input device available".into()))?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());

    let chosen = choose_config(&device, cfg)?;
    let rate = chosen.sample_rate().0;
    let channels = chosen.channels();
    if rate != cfg.sample_rate_hz || channels != cfg.channels {
        warn!(
            "Mic using rate={}Hz channels={} fmt={:?} (requested {}Hz/{}ch)",
            rate, channels, chosen.sample_format(), cfg.sample_rate_hz, cfg.channels
        );
    } else {
        info!(
            "Mic configured rate={}Hz channels={} device=\"{}\" fmt={:?}",
            rate, channels, device_name, chosen.sample_format()
        );
    }

    let chunk_samples = (rate as usize) * (cfg.chunk_ms as usize) / 1000;
    let stream_config: cpal::StreamConfig = chosen.clone().into();
    let err_fn = |err| error!("cpal input stream error: {}", err);

    let mut acc: Vec<i16> = Vec::with_capacity(chunk_samples * 2);
    let mut on_pcm = move |interleaved: Vec<i16>| {
        acc.extend(downmix(&interleaved, channels));
        while acc.len() >= chunk_samples {
            let chunk: Vec<i16> = acc.drain(..chunk_samples).collect();
            // Drop frames rather than block the audio callback.
            let _ = tx.try_send(chunk);
        }
    };

    let stream = match chosen.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| on_pcm(data.to_vec()),
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &stream_config,
            move |data: &[u16], _| on_pcm(data.iter().map(|&s| u16_to_i16(s)).collect()),
            err_fn,
            None,
        ),
        cpal::SampleFormat::U8 => device.build_input_stream(
            &stream_config,
            move |data: &[u8], _| on_pcm(data.iter().map(|&s| u8_to_i16(s)).collect()),
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| on_pcm(data.iter().map(|&s| f32_to_i16(s)).collect()),
            err_fn,
            None,
        ),
        other => {
            return Err(VoxError::Audio(format!(
                "Unsupported sample format: {:?}",
                other
            )))
        }
    }
    .map_err(|e| VoxError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| VoxError::Audio(format!("failed to start input stream: {e}")))?;
    info!(
        "Microphone open: device=\"{}\" chunk={}ms rate={}Hz ch={}",
        device_name, cfg.chunk_ms, rate, channels
    );
    Ok((stream, rate, device_name))
}

#[inline]
fn f32_to_i16(s: f32) -> i16 {
    let s = s.clamp(-1.0, 1.0);
    (s * i16::MAX as f32) as i16
}

#[inline]
fn u16_to_i16(s: u16) -> i16 {
    // Map 0..=65535 to -32768..=32767
    (s as i32 - 32768) as i16
}

#[inline]
fn u8_to_i16(s: u8) -> i16 {
    // Center at 128 and scale to 16 bits
    (s as i16 - 128) << 8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_conversions() {
        assert_eq!(f32_to_i16(1.5), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(u16_to_i16(0), i16::MIN);
        assert_eq!(u16_to_i16(32768), 0);
        assert_eq!(u8_to_i16(128), 0);
        assert_eq!(u8_to_i16(0), -32768);
    }

    #[test]
    fn format_ranking_prefers_float() {
        assert!(fmt_rank(cpal::SampleFormat::F32) > fmt_rank(cpal::SampleFormat::I16));
        assert!(fmt_rank(cpal::SampleFormat::I16) > fmt_rank(cpal::SampleFormat::U8));
    }
}
