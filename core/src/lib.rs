// Voxloop Core Library
// Speech loop client: SSO token exchange, gRPC speech synthesis, voice loop driver

pub mod auth;
pub mod client;
pub mod config;
pub mod request;
pub mod sink;
pub mod synth;
pub mod telemetry;
pub mod voice_loop;

// Export core types
pub use auth::{generate_trace_id, request_metadata, AccessToken, SsoTokenProvider, TokenProvider};
pub use client::{ChannelOptions, SpeechClient, Synthesized};
pub use config::{ApiConfig, AuthConfig, ConfigFile};
pub use request::{build_request, SynthesisOptions};
pub use sink::AudioSink;
pub use synth::{SpeechSynthesizer, Synthesizer};
pub use voice_loop::{RecognitionError, SpeechRecognizer, Turn, VoiceEngine, VoiceLoop};

// Generated proto code
pub use voxloop_proto as proto;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC failed ({:?}): {}", .0.code(), .0.message())]
    Rpc(#[from] tonic::Status),

    #[error("Audio error: {0}")]
    Audio(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VoxError>;
