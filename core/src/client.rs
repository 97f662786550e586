//! gRPC client for the `tts.v1.TTS/Synthesize` unary call.
//!
//! A fresh channel is opened per synthesis; nothing is pooled. Waiting for
//! the channel is bounded by `ChannelOptions::ready_timeout`, and reconnect
//! attempts are spaced by a fixed backoff (min = max), not an exponential one.

use std::time::Duration;

use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::{debug, info, warn};

use crate::proto::{
    tts_client::TtsClient, SynthesizeSpeechRequest, EXTERNAL_TRACE_ID_KEY, REQUEST_ID_KEY,
};
use crate::{Result, VoxError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelOptions {
    /// Delay between connection attempts while waiting for the channel.
    pub reconnect_backoff: Duration,
    /// Upper bound on waiting for the channel to become ready.
    pub ready_timeout: Duration,
    /// Deadline for the RPC itself once connected.
    pub request_timeout: Duration,
    /// Max encoded/decoded message size, both directions.
    pub max_message_size: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_millis(1000),
            ready_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(60),
            max_message_size: usize::MAX,
        }
    }
}

/// Audio plus the response metadata the server attached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Synthesized {
    pub audio: Vec<u8>,
    pub request_id: String,
    pub trace_id: String,
}

#[derive(Clone, Debug)]
pub struct SpeechClient {
    address: String,
    endpoint: Endpoint,
    opts: ChannelOptions,
}

/// `host:port` means TLS; an explicit `http://` scheme selects plaintext.
fn normalize_address(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{address}")
    }
}

impl SpeechClient {
    pub fn new(address: &str, opts: ChannelOptions) -> Result<Self> {
        let uri = normalize_address(address);
        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| VoxError::Transport(format!("invalid server address '{address}': {e}")))?
            .timeout(opts.request_timeout);
        if uri.starts_with("https://") {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new())
                .map_err(|e| VoxError::Transport(format!("TLS setup failed: {e}")))?;
        }
        Ok(Self {
            address: address.to_string(),
            endpoint,
            opts,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Block until the channel is ready, retrying at the fixed backoff, or fail at the deadline.
    pub async fn connect(&self) -> Result<Channel> {
        let backoff = self.opts.reconnect_backoff;
        let attempt_loop = async {
            let mut attempt = 0u32;
            loop {
                attempt += 1;
                match self.endpoint.connect().await {
                    Ok(channel) => {
                        debug!(target = "speech_client", address = %self.address, attempt, "Channel ready");
                        return channel;
                    }
                    Err(e) => {
                        warn!(
                            target = "speech_client",
                            address = %self.address,
                            attempt,
                            error = %e,
                            "Channel not ready; retrying in {:?}",
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        };
        tokio::time::timeout(self.opts.ready_timeout, attempt_loop)
            .await
            .map_err(|_| {
                VoxError::Transport(format!(
                    "channel to {} not ready within {:?}",
                    self.address, self.opts.ready_timeout
                ))
            })
    }

    /// Invoke `Synthesize` on an open channel with the given call metadata.
    pub async fn synthesize(
        &self,
        channel: Channel,
        request: SynthesizeSpeechRequest,
        metadata: MetadataMap,
    ) -> Result<Synthesized> {
        let mut client = TtsClient::new(channel)
            .max_decoding_message_size(self.opts.max_message_size)
            .max_encoding_message_size(self.opts.max_message_size);

        let mut req = tonic::Request::new(request);
        *req.metadata_mut() = metadata;

        let response = client.synthesize(req).await?;
        let md = response.metadata();
        let request_id = metadata_str(md, REQUEST_ID_KEY);
        let trace_id = metadata_str(md, EXTERNAL_TRACE_ID_KEY);
        let audio = response.into_inner().audio;

        info!(
            target = "speech_client",
            request_id = %request_id,
            trace_id = %trace_id,
            audio_bytes = audio.len(),
            "Received response"
        );
        Ok(Synthesized {
            audio,
            request_id,
            trace_id,
        })
    }
}

fn metadata_str(md: &MetadataMap, key: &str) -> String {
    md.get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
