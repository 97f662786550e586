//! Utterance endpointing over per-frame speech decisions.
//!
//! Feed fixed-size mono frames with a voiced/unvoiced flag; the endpointer
//! declares speech after `min_start_ms` of consecutive voiced audio and ends
//! the utterance after `hangover_ms` without voice, or at `max_utterance_ms`.

use std::collections::VecDeque;

#[derive(Clone, Debug)]
pub struct EndpointerConfig {
    /// Frame size in milliseconds (VAD accepts 10, 20, 30)
    pub frame_ms: u32,
    /// Minimum consecutive voiced duration to declare speech start (ms)
    pub min_start_ms: u32,
    /// Silence after the last voiced frame that ends the utterance (ms)
    pub hangover_ms: u32,
    /// Hard cap on utterance length (ms)
    pub max_utterance_ms: u32,
}

impl Default for EndpointerConfig {
    fn default() -> Self {
        let env_u32 = |key: &str, default: u32| {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(default)
        };
        Self {
            frame_ms: 20,
            min_start_ms: env_u32("VAD_MIN_START_MS", 60),
            hangover_ms: env_u32("VAD_HANGOVER_MS", 800),
            max_utterance_ms: env_u32("VAD_MAX_UTTERANCE_MS", 15_000),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// No speech yet.
    Waiting,
    /// Inside an utterance.
    Speaking,
    /// Utterance complete; call `finish`.
    Done,
}

#[derive(Debug)]
pub struct Endpointer {
    min_start_frames: usize,
    hangover_frames: usize,
    max_frames: usize,
    consec_voiced: usize,
    hangover_left: usize,
    in_speech: bool,
    done: bool,
    // Voiced frames since the last unvoiced one, so the onset isn't clipped.
    pre_speech: VecDeque<Vec<i16>>,
    frames: Vec<Vec<i16>>,
}

fn frames_for(ms: u32, frame_ms: u32) -> usize {
    let frame_ms = frame_ms.max(1);
    ms.div_ceil(frame_ms) as usize
}

impl Endpointer {
    pub fn new(cfg: &EndpointerConfig) -> Self {
        Self {
            min_start_frames: frames_for(cfg.min_start_ms.max(cfg.frame_ms), cfg.frame_ms),
            hangover_frames: frames_for(cfg.hangover_ms, cfg.frame_ms).max(1),
            max_frames: frames_for(cfg.max_utterance_ms, cfg.frame_ms).max(1),
            consec_voiced: 0,
            hangover_left: 0,
            in_speech: false,
            done: false,
            pre_speech: VecDeque::new(),
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: Vec<i16>, is_speech: bool) -> Step {
        if self.done {
            return Step::Done;
        }

        if !self.in_speech {
            if !is_speech {
                self.consec_voiced = 0;
                self.pre_speech.clear();
                return Step::Waiting;
            }
            self.consec_voiced += 1;
            self.pre_speech.push_back(frame);
            if self.consec_voiced < self.min_start_frames {
                return Step::Waiting;
            }
            self.in_speech = true;
            self.hangover_left = self.hangover_frames;
            self.frames.extend(self.pre_speech.drain(..));
        } else {
            self.frames.push(frame);
            if is_speech {
                self.hangover_left = self.hangover_frames;
            } else {
                self.hangover_left = self.hangover_left.saturating_sub(1);
            }
        }

        if self.hangover_left == 0 || self.frames.len() >= self.max_frames {
            self.done = true;
            return Step::Done;
        }
        Step::Speaking
    }

    pub fn in_speech(&self) -> bool {
        self.in_speech
    }

    /// Concatenated samples of the utterance (empty if speech never started).
    pub fn finish(self) -> Vec<i16> {
        self.frames.into_iter().flatten().collect()
    }
}
