//! Static key/value configuration (`[API]`, `[Auth]`, optional `[Synthesis]`
//! and `[Channel]` sections).
//!
//! Loading never fails: a missing or unparsable file yields an empty mapping
//! and a warning. Required keys are checked on lookup, so the binary resolves
//! every section it needs before entering the loop.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use toml::{Table, Value};

use crate::client::ChannelOptions;
use crate::proto::{synthesize_options::PostprocessingMode, AudioEncoding, VoiceStyle};
use crate::request::SynthesisOptions;
use crate::{Result, VoxError};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_SSO_TIMEOUT_MS: u64 = 10_000;

const SYNTHESIS_KEYS: &[&str] = &[
    "encoding",
    "sample_rate_hertz",
    "voice_name",
    "postprocessing_mode",
    "model_type",
    "voice_style",
];
const CHANNEL_KEYS: &[&str] = &["reconnect_backoff_ms", "ready_timeout_ms", "request_timeout_ms"];

/// Parsed section → key → value mapping.
#[derive(Clone, Debug, Default)]
pub struct ConfigFile {
    table: Table,
}

/// Credentials for the OAuth2 client-credentials grant.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub sso_server_url: String,
    pub realm_name: String,
    pub client_id: String,
    pub client_secret: String,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("sso_server_url", &self.sso_server_url)
            .field("realm_name", &self.realm_name)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub server_address: String,
}

impl ConfigFile {
    /// Resolve the config path: explicit path, then `VOXLOOP_CONFIG`, then `./config.toml`.
    pub fn resolve_path(explicit: Option<&Path>) -> std::path::PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        std::env::var("VOXLOOP_CONFIG")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
            .into()
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let p = path.as_ref();
        if !p.exists() {
            tracing::warn!(target = "config", path = %p.display(), "Config file not found; starting empty");
            return Self::default();
        }
        match std::fs::read_to_string(p) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                tracing::warn!(target = "config", path = %p.display(), error = %e, "Failed to parse config; starting empty");
                Self::default()
            }),
            Err(e) => {
                tracing::warn!(target = "config", path = %p.display(), error = %e, "Failed to read config; starting empty");
                Self::default()
            }
        }
    }

    pub fn parse(s: &str) -> std::result::Result<Self, toml::de::Error> {
        Ok(Self {
            table: toml::from_str::<Table>(s)?,
        })
    }

    pub fn section(&self, name: &str) -> Option<&Table> {
        self.table.get(name).and_then(Value::as_table)
    }

    /// Look up a string value. Absence is an error at first use, not at load time.
    pub fn get(&self, section: &str, key: &str) -> Result<&str> {
        self.section(section)
            .and_then(|t| t.get(key))
            .and_then(Value::as_str)
            .ok_or_else(|| VoxError::Config(format!("missing key [{section}] {key}")))
    }

    fn get_required(&self, section: &str, key: &str) -> Result<String> {
        let v = self.get(section, key)?;
        if v.trim().is_empty() {
            return Err(VoxError::Config(format!("empty value for [{section}] {key}")));
        }
        Ok(v.to_string())
    }

    fn get_opt_str(&self, section: &str, key: &str) -> Result<Option<&str>> {
        match self.section(section).and_then(|t| t.get(key)) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(VoxError::Config(format!(
                "[{section}] {key} must be a string, got {}",
                other.type_str()
            ))),
        }
    }

    /// Optional sections are overlays: a key we don't read is a typo, not a no-op.
    fn check_known_keys(&self, section: &str, known: &[&str]) -> Result<()> {
        let Some(table) = self.section(section) else {
            return Ok(());
        };
        match table.keys().find(|k| !known.contains(&k.as_str())) {
            Some(k) => Err(VoxError::Config(format!("unknown key [{section}] {k}"))),
            None => Ok(()),
        }
    }

    fn get_opt_u64(&self, section: &str, key: &str) -> Result<Option<u64>> {
        match self.section(section).and_then(|t| t.get(key)) {
            None => Ok(None),
            Some(Value::Integer(i)) if *i >= 0 => Ok(Some(*i as u64)),
            Some(other) => Err(VoxError::Config(format!(
                "[{section}] {key} must be a non-negative integer, got {other}"
            ))),
        }
    }

    pub fn auth(&self) -> Result<AuthConfig> {
        Ok(AuthConfig {
            sso_server_url: self.get_required("Auth", "sso_server_url")?,
            realm_name: self.get_required("Auth", "realm_name")?,
            client_id: self.get_required("Auth", "client_id")?,
            client_secret: self.get_required("Auth", "client_secret")?,
        })
    }

    pub fn api(&self) -> Result<ApiConfig> {
        Ok(ApiConfig {
            server_address: self.get_required("API", "server_address")?,
        })
    }

    /// Timeout for the SSO token request (`[Auth] timeout_ms`, default 10s).
    pub fn sso_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_millis(
            self.get_opt_u64("Auth", "timeout_ms")?
                .unwrap_or(DEFAULT_SSO_TIMEOUT_MS),
        ))
    }

    /// Synthesis options overlayed onto the defaults from `[Synthesis]`.
    pub fn synthesis(&self) -> Result<SynthesisOptions> {
        self.check_known_keys("Synthesis", SYNTHESIS_KEYS)?;
        let mut o = SynthesisOptions::default();
        if let Some(v) = self.get_opt_str("Synthesis", "encoding")? {
            o.encoding = AudioEncoding::from_str_name(v)
                .ok_or_else(|| VoxError::Config(format!("unknown encoding '{v}'")))?;
        }
        if let Some(v) = self.get_opt_u64("Synthesis", "sample_rate_hertz")? {
            o.sample_rate_hertz = v as i64;
        }
        if let Some(v) = self.get_opt_str("Synthesis", "voice_name")? {
            o.voice_name = v.to_string();
        }
        if let Some(v) = self.get_opt_str("Synthesis", "postprocessing_mode")? {
            o.postprocessing_mode = PostprocessingMode::from_str_name(v)
                .ok_or_else(|| VoxError::Config(format!("unknown postprocessing_mode '{v}'")))?;
        }
        if let Some(v) = self.get_opt_str("Synthesis", "model_type")? {
            o.model_type = v.to_string();
        }
        if let Some(v) = self.get_opt_str("Synthesis", "voice_style")? {
            o.voice_style = VoiceStyle::from_str_name(v)
                .ok_or_else(|| VoxError::Config(format!("unknown voice_style '{v}'")))?;
        }
        Ok(o)
    }

    /// Channel options overlayed onto the defaults from `[Channel]`.
    pub fn channel(&self) -> Result<ChannelOptions> {
        self.check_known_keys("Channel", CHANNEL_KEYS)?;
        let mut c = ChannelOptions::default();
        if let Some(ms) = self.get_opt_u64("Channel", "reconnect_backoff_ms")? {
            c.reconnect_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = self.get_opt_u64("Channel", "ready_timeout_ms")? {
            c.ready_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.get_opt_u64("Channel", "request_timeout_ms")? {
            c.request_timeout = Duration::from_millis(ms);
        }
        Ok(c)
    }
}
