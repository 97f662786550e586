//! Synthesis pipeline: channel → token → request → RPC → file.

use async_trait::async_trait;
use tracing::{debug, info};

use std::path::Path;

use crate::auth::{generate_trace_id, request_metadata, SsoTokenProvider, TokenProvider};
use crate::client::{SpeechClient, Synthesized};
use crate::config::ConfigFile;
use crate::request::{build_request, SynthesisOptions};
use crate::sink::AudioSink;
use crate::Result;

/// Turns text into audio on disk. The voice loop only sees this seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Synthesized>;
}

pub struct Synthesizer {
    tokens: Box<dyn TokenProvider>,
    client: SpeechClient,
    options: SynthesisOptions,
    sink: AudioSink,
}

impl Synthesizer {
    pub fn new(
        tokens: Box<dyn TokenProvider>,
        client: SpeechClient,
        options: SynthesisOptions,
        sink: AudioSink,
    ) -> Self {
        Self {
            tokens,
            client,
            options,
            sink,
        }
    }

    /// Wire the SSO provider and channel from `[Auth]`, `[API]`, `[Synthesis]` and `[Channel]`.
    /// Every required key is checked here, before any network traffic.
    pub fn from_config(file: &ConfigFile, output: impl AsRef<Path>) -> Result<Self> {
        let api = file.api()?;
        let tokens = SsoTokenProvider::new(file.auth()?, file.sso_timeout()?)?;
        let client = SpeechClient::new(&api.server_address, file.channel()?)?;
        Ok(Self::new(
            Box::new(tokens),
            client,
            file.synthesis()?,
            AudioSink::new(output.as_ref()),
        ))
    }
}

#[async_trait]
impl SpeechSynthesizer for Synthesizer {
    /// Any failure (SSO, channel, RPC, file) ends this call; nothing is retried here.
    async fn synthesize(&self, text: &str) -> Result<Synthesized> {
        let request = build_request(text, &self.options);
        debug!(target = "synth", request = ?request, "Prepared request");

        info!(target = "synth", address = %self.client.address(), "Sending request to gRPC server");
        let channel = self.client.connect().await?;

        let token = self.tokens.fetch_token().await?;
        let trace_id = generate_trace_id();
        let metadata = request_metadata(&token, &trace_id)?;

        let out = self.client.synthesize(channel, request, metadata).await?;

        let path = self.sink.write(&out.audio).await?;
        info!(target = "synth", path = %path.display(), "Saved received audio");
        Ok(out)
    }
}
