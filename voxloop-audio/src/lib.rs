// Audio collaborators for the voice loop

// Shared audio utilities
#[cfg(any(feature = "mic", feature = "stt", feature = "tts"))]
pub(crate) mod utils;

pub mod endpoint;
pub use endpoint::{Endpointer, EndpointerConfig, Step};

pub mod lines;
pub use lines::LineRecognizer;

#[cfg(feature = "mic")]
pub mod mic;

#[cfg(feature = "mic")]
pub use mic::{MicConfig, MicStream};

#[cfg(feature = "vad")]
pub mod vad;

#[cfg(feature = "vad")]
pub use vad::{VadClassifier, VadConfig};

#[cfg(feature = "stt")]
pub mod stt;

#[cfg(feature = "stt")]
pub use stt::{SttConfig, WhisperTranscriber};

#[cfg(all(feature = "mic", feature = "vad", feature = "stt"))]
pub mod recognizer;

#[cfg(all(feature = "mic", feature = "vad", feature = "stt"))]
pub use recognizer::{MicRecognizer, MicRecognizerConfig};

#[cfg(feature = "tts")]
pub mod voice;

#[cfg(feature = "tts")]
pub use voice::{LocalVoice, LocalVoiceConfig};
