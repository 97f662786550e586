//! Generated types for the `tts.v1` speech synthesis service.

tonic::include_proto!("tts.v1");

/// Metadata key carrying the bearer token on every call.
pub const AUTHORIZATION_KEY: &str = "authorization";
/// Metadata key for the client-generated trace id (sent and echoed back).
pub const EXTERNAL_TRACE_ID_KEY: &str = "external_trace_id";
/// Response metadata key holding the server-assigned request id.
pub const REQUEST_ID_KEY: &str = "request_id";
