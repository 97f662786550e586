//! SSO token exchange (OAuth2 client-credentials grant) and call metadata.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::proto::{AUTHORIZATION_KEY, EXTERNAL_TRACE_ID_KEY};
use crate::{Result, VoxError};

/// Bearer token issued by the SSO server. Expiry is not tracked; a fresh
/// token is fetched for every synthesis call.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken(<{} chars>)", self.0.len())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<AccessToken>;
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

#[derive(Deserialize, Default)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Keycloak-style SSO client. Certificate verification is always on.
#[derive(Clone)]
pub struct SsoTokenProvider {
    http: Client,
    cfg: AuthConfig,
}

impl SsoTokenProvider {
    pub fn new(cfg: AuthConfig, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VoxError::Auth(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.cfg.sso_server_url.trim_end_matches('/'),
            self.cfg.realm_name
        )
    }
}

#[async_trait]
impl TokenProvider for SsoTokenProvider {
    async fn fetch_token(&self) -> Result<AccessToken> {
        let url = self.token_url();
        debug!(target = "auth", url = %url, client_id = %self.cfg.client_id, "Requesting client-credentials token");

        let resp = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VoxError::Auth(format!("SSO request timed out: {e}"))
                } else {
                    VoxError::Auth(format!("SSO request failed: {e}"))
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let parsed: TokenErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            let detail = parsed
                .error_description
                .filter(|d| !d.is_empty())
                .or_else(|| (!parsed.error.is_empty()).then_some(parsed.error))
                .unwrap_or(body);
            return Err(VoxError::Auth(format!(
                "SSO rejected credentials ({status}): {detail}"
            )));
        }

        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|e| VoxError::Auth(format!("Failed to parse token response: {e}")))?;
        if token.access_token.is_empty() {
            return Err(VoxError::Auth("token response has no access_token".into()));
        }
        Ok(AccessToken(token.access_token))
    }
}

/// Random correlation id in `[1000, 9999]`. Uniqueness is not guaranteed.
pub fn generate_trace_id() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

/// Build the two call metadata entries: bearer token and trace id.
pub fn request_metadata(token: &AccessToken, trace_id: &str) -> Result<MetadataMap> {
    let bearer: MetadataValue<Ascii> = format!("Bearer {}", token.as_str())
        .parse()
        .map_err(|_| VoxError::Auth("access token is not valid ASCII metadata".into()))?;
    let trace: MetadataValue<Ascii> = trace_id
        .parse()
        .map_err(|_| VoxError::Auth(format!("invalid trace id '{trace_id}'")))?;

    let mut md = MetadataMap::new();
    md.insert(AUTHORIZATION_KEY, bearer);
    md.insert(EXTERNAL_TRACE_ID_KEY, trace);
    info!(target = "auth", trace_id = %trace_id, "Trace id");
    Ok(md)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(url: &str) -> AuthConfig {
        AuthConfig {
            sso_server_url: url.into(),
            realm_name: "speech".into(),
            client_id: "cid".into(),
            client_secret: "secret".into(),
        }
    }

    #[test]
    fn trace_id_is_four_digits_in_range() {
        for _ in 0..2_000 {
            let id = generate_trace_id();
            assert_eq!(id.len(), 4, "{id}");
            let n: u32 = id.parse().unwrap();
            assert!((1000..=9999).contains(&n), "{n}");
        }
    }

    #[test]
    fn token_url_joins_realm_path() {
        let p = SsoTokenProvider::new(cfg("https://sso.example.com/auth/"), Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            p.token_url(),
            "https://sso.example.com/auth/realms/speech/protocol/openid-connect/token"
        );
    }

    #[test]
    fn metadata_has_exactly_two_entries() {
        let md = request_metadata(&AccessToken::new("tok123"), "4321").unwrap();
        assert_eq!(md.len(), 2);
        assert_eq!(md.get("authorization").unwrap(), "Bearer tok123");
        assert_eq!(md.get("external_trace_id").unwrap(), "4321");
    }

    #[test]
    fn non_ascii_token_is_rejected() {
        let err = request_metadata(&AccessToken::new("tok\nen"), "1000").unwrap_err();
        assert!(matches!(err, VoxError::Auth(_)));
    }

    #[test]
    fn token_debug_hides_value() {
        let dbg = format!("{:?}", AccessToken::new("tok123"));
        assert!(!dbg.contains("tok123"));
    }
}
