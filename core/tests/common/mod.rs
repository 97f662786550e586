//! Shared test doubles: in-process SSO (axum) and TTS (tonic) servers.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Form, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Status};

use voxloop_core::proto::tts_server::{Tts, TtsServer};
use voxloop_core::proto::{SynthesizeSpeechRequest, SynthesizeSpeechResponse};
use voxloop_core::{
    AuthConfig, RecognitionError, SpeechRecognizer, VoiceEngine, VoxError,
};

pub const REALM: &str = "speech";
pub const CLIENT_ID: &str = "demo-client";
pub const CLIENT_SECRET: &str = "right-secret";
pub const TOKEN: &str = "tok123";

// ---------------------------------------------------------------------------
// SSO mock
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct SsoState {
    delay: Duration,
}

#[derive(Deserialize)]
struct TokenForm {
    grant_type: String,
    client_id: String,
    client_secret: String,
}

async fn token_handler(
    State(state): State<SsoState>,
    Path(realm): Path<String>,
    Form(form): Form<TokenForm>,
) -> Response {
    tokio::time::sleep(state.delay).await;
    let ok = realm == REALM
        && form.grant_type == "client_credentials"
        && form.client_id == CLIENT_ID
        && form.client_secret == CLIENT_SECRET;
    if ok {
        Json(json!({
            "access_token": TOKEN,
            "token_type": "Bearer",
            "expires_in": 300,
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "unauthorized_client",
                "error_description": "Invalid client or Invalid client credentials",
            })),
        )
            .into_response()
    }
}

/// Start a Keycloak-like token endpoint; each request waits `delay` before answering.
pub async fn start_sso(delay: Duration) -> SocketAddr {
    let app = Router::new()
        .route(
            "/realms/:realm/protocol/openid-connect/token",
            post(token_handler),
        )
        .with_state(SsoState { delay });
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind sso listener");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("sso server");
    });
    addr
}

pub fn auth_config(sso: SocketAddr, secret: &str) -> AuthConfig {
    AuthConfig {
        sso_server_url: format!("http://{sso}/"),
        realm_name: REALM.into(),
        client_id: CLIENT_ID.into(),
        client_secret: secret.into(),
    }
}

/// Config file text pointing at the local mocks, as the binary would load it.
pub fn config_text(sso: SocketAddr, secret: &str, tts: SocketAddr) -> String {
    format!(
        r#"
[API]
server_address = "http://{tts}"

[Auth]
sso_server_url = "http://{sso}/"
realm_name = "{REALM}"
client_id = "{CLIENT_ID}"
client_secret = "{secret}"
timeout_ms = 2000

[Channel]
reconnect_backoff_ms = 100
ready_timeout_ms = 5000
"#
    )
}

// ---------------------------------------------------------------------------
// TTS mock
// ---------------------------------------------------------------------------

/// What the mock server saw on its last call.
#[derive(Clone, Debug, Default)]
pub struct SeenCall {
    pub request: Option<SynthesizeSpeechRequest>,
    pub authorization: String,
    pub trace_id: String,
}

#[derive(Clone)]
pub struct MockTts {
    pub audio: Vec<u8>,
    pub expected_token: String,
    pub seen: Arc<Mutex<Vec<SeenCall>>>,
}

impl MockTts {
    pub fn new(audio: Vec<u8>) -> Self {
        Self {
            audio,
            expected_token: TOKEN.into(),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<SeenCall> {
        self.seen.lock().unwrap().clone()
    }
}

fn md(req: &Request<SynthesizeSpeechRequest>, key: &str) -> String {
    req.metadata()
        .get(key)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tonic::async_trait]
impl Tts for MockTts {
    async fn synthesize(
        &self,
        request: Request<SynthesizeSpeechRequest>,
    ) -> Result<tonic::Response<SynthesizeSpeechResponse>, Status> {
        let authorization = md(&request, "authorization");
        let trace_id = md(&request, "external_trace_id");
        self.seen.lock().unwrap().push(SeenCall {
            request: Some(request.get_ref().clone()),
            authorization: authorization.clone(),
            trace_id: trace_id.clone(),
        });

        if authorization != format!("Bearer {}", self.expected_token) {
            return Err(Status::unauthenticated("invalid bearer token"));
        }
        if request.get_ref().text.is_empty() {
            return Err(Status::invalid_argument("text is empty"));
        }

        let mut resp = tonic::Response::new(SynthesizeSpeechResponse {
            audio: self.audio.clone(),
        });
        resp.metadata_mut()
            .insert("request_id", "req-42".parse().unwrap());
        resp.metadata_mut()
            .insert("external_trace_id", trace_id.parse().unwrap());
        Ok(resp)
    }
}

/// Start the TTS mock on an ephemeral localhost port and return its address.
pub async fn start_tts(svc: MockTts) -> SocketAddr {
    let listener = TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind tts listener");
    let addr = listener.local_addr().unwrap();
    let incoming = TcpListenerStream::new(listener);
    tokio::spawn(async move {
        tonic::transport::Server::builder()
            .add_service(TtsServer::new(svc))
            .serve_with_incoming(incoming)
            .await
            .expect("tts server exited cleanly");
    });
    addr
}

// ---------------------------------------------------------------------------
// Voice loop collaborators
// ---------------------------------------------------------------------------

/// Plays back a fixed script of recognition results, then reports closed input.
pub struct ScriptedRecognizer {
    script: VecDeque<Result<String, RecognitionError>>,
}

impl ScriptedRecognizer {
    pub fn new(script: Vec<Result<String, RecognitionError>>) -> Self {
        Self {
            script: script.into(),
        }
    }
}

#[async_trait::async_trait]
impl SpeechRecognizer for ScriptedRecognizer {
    async fn listen(&mut self) -> Result<String, RecognitionError> {
        self.script
            .pop_front()
            .unwrap_or(Err(RecognitionError::Closed))
    }
}

/// Records what it was asked to say.
#[derive(Clone, Default)]
pub struct RecordingVoice {
    pub spoken: Arc<Mutex<Vec<String>>>,
}

#[async_trait::async_trait]
impl VoiceEngine for RecordingVoice {
    async fn speak(&mut self, text: &str) -> Result<(), VoxError> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }
}
