//! Speech synthesis request construction.

use crate::proto::{
    synthesize_options::PostprocessingMode, AudioEncoding, SynthesizeOptions,
    SynthesizeSpeechRequest, VoiceStyle,
};

/// Every request field except the text. Defaults match the demo voice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynthesisOptions {
    pub encoding: AudioEncoding,
    pub sample_rate_hertz: i64,
    pub voice_name: String,
    pub postprocessing_mode: PostprocessingMode,
    pub model_type: String,
    pub voice_style: VoiceStyle,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            encoding: AudioEncoding::LinearPcm,
            sample_rate_hertz: 22_050,
            voice_name: "gandzhaev".to_string(),
            postprocessing_mode: PostprocessingMode::PostProcessingDisable,
            model_type: "default".to_string(),
            voice_style: VoiceStyle::Neutral,
        }
    }
}

/// Build the request for `text`. Pure: length and content limits are enforced server-side.
pub fn build_request(text: &str, opts: &SynthesisOptions) -> SynthesizeSpeechRequest {
    SynthesizeSpeechRequest {
        text: text.to_string(),
        encoding: opts.encoding as i32,
        sample_rate_hertz: opts.sample_rate_hertz,
        voice_name: opts.voice_name.clone(),
        synthesize_options: Some(SynthesizeOptions {
            postprocessing_mode: opts.postprocessing_mode as i32,
            model_type: opts.model_type.clone(),
            voice_style: opts.voice_style as i32,
        }),
    }
}
