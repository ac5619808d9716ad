//! Proxy API handlers.

use crate::connections::{ConnectionError, ProxySession};
use crate::middleware::KeyContext;
use crate::simulate::{simulate_tool, SimulationError};
use crate::store::usage::{record_usage, UsageAction, UsageEntry};
use crate::upstream::{AudioUpload, UpstreamError};
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Multipart},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use napier_types::{
    ClientRequest, ConnectResponse, DisconnectResponse, ExecuteToolRequest, ExecuteToolResponse,
    ProcessAudioResponse,
};
use std::sync::Arc;
use thiserror::Error;

pub use napier_types::NOT_CONNECTED;

pub const MISSING_CLIENT_ID: &str = "Napier Client ID is required";
pub const CLIENT_ID_IN_USE: &str = "Napier Client ID is in use by another API key";
pub const MISSING_AUDIO: &str = "Audio file is required";
pub const UNSUPPORTED_AUDIO: &str = "Unsupported audio type";
pub const MISSING_TOOL: &str = "Tool name is required";

const DEFAULT_AUDIO_NAME: &str = "audio.webm";
const DEFAULT_AUDIO_TYPE: &str = "audio/webm";

/// Audio MIME types forwarded upstream.
const ALLOWED_AUDIO_TYPES: &[&str] = &[
    "audio/webm",
    "audio/ogg",
    "audio/wav",
    "audio/mpeg",
    "audio/mp4",
];

/// Normalizes an uploaded part's content type to an allowed audio type.
///
/// Parameters such as `;codecs=opus` are dropped. A part without a content
/// type is taken as WebM, the recorder's default.
fn audio_content_type(raw: Option<&str>) -> Result<&'static str, ApiError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_AUDIO_TYPE);
    };
    let essence = raw.split(';').next().unwrap_or_default().trim();
    ALLOWED_AUDIO_TYPES
        .iter()
        .copied()
        .find(|allowed| allowed.eq_ignore_ascii_case(essence))
        .ok_or_else(|| ApiError::BadRequest(format!("{}: {}", UNSUPPORTED_AUDIO, raw)))
}

/// The caller's session, or the not-connected error when the client id has
/// no session or one opened under another key.
async fn require_session(
    state: &AppState,
    client_id: &str,
    key: &KeyContext,
) -> Result<ProxySession, ApiError> {
    state
        .connections
        .session_for(client_id, key.key_id())
        .await
        .ok_or_else(|| ApiError::BadRequest(NOT_CONNECTED.to_string()))
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Too many requests")]
    TooManyRequests,
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        ApiError::Upstream(e.to_string())
    }
}

/// Appends a row to the usage log. Failures are logged and swallowed.
pub(crate) async fn log_usage(
    state: &AppState,
    key: Option<i64>,
    client_id: Option<&str>,
    action: UsageAction,
    outcome: &str,
) {
    let pool = state.pool.clone();
    let client_id = client_id.map(str::to_string);
    let outcome = outcome.to_string();

    let result = tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| e.to_string())?;
        record_usage(
            &conn,
            &UsageEntry {
                api_key_id: key,
                client_id: client_id.as_deref(),
                action,
                outcome: &outcome,
            },
        )
        .map_err(|e| e.to_string())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(action = %action, "failed to record usage: {}", e),
        Err(e) => tracing::warn!(action = %action, "usage logging task failed: {}", e),
    }
}

/// Handler for `POST /api/connect`.
///
/// Idempotent per client id: repeated connects return the same session id
/// until the client disconnects.
pub async fn connect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(key): Extension<KeyContext>,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<Json<ConnectResponse>, ApiError> {
    let Json(payload) = payload?;
    let client_id = payload
        .client_id()
        .ok_or_else(|| ApiError::BadRequest(MISSING_CLIENT_ID.to_string()))?;

    let session = match state.connections.connect_or_get(client_id, key.key_id()).await {
        Ok(session) => session,
        Err(ConnectionError::HeldByOtherKey) => {
            tracing::warn!(client_id, "connect refused, client id held by another key");
            log_usage(&state, key.key_id(), Some(client_id), UsageAction::Connect, "in_use").await;
            return Err(ApiError::BadRequest(CLIENT_ID_IN_USE.to_string()));
        }
    };
    tracing::info!(client_id, session_id = %session.session_id, "client connected");
    log_usage(&state, key.key_id(), Some(client_id), UsageAction::Connect, "ok").await;

    Ok(Json(ConnectResponse {
        success: true,
        session_id: session.session_id,
        message: "Connected to Napier AI service".to_string(),
    }))
}

/// Handler for `POST /api/disconnect`. Succeeds whether or not the client
/// was connected; only the key that opened a session can close it.
pub async fn disconnect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(key): Extension<KeyContext>,
    payload: Result<Json<ClientRequest>, JsonRejection>,
) -> Result<Json<DisconnectResponse>, ApiError> {
    let Json(payload) = payload?;
    let client_id = payload
        .client_id()
        .ok_or_else(|| ApiError::BadRequest(MISSING_CLIENT_ID.to_string()))?;

    if state.connections.disconnect(client_id, key.key_id()).await {
        tracing::info!(client_id, "client disconnected");
    }
    log_usage(&state, key.key_id(), Some(client_id), UsageAction::Disconnect, "ok").await;

    Ok(Json(DisconnectResponse {
        success: true,
        message: "Disconnected from Napier AI service".to_string(),
    }))
}

/// Handler for `POST /api/process-audio`.
///
/// Expects a multipart form with a `clientId` text field and an `audio` file.
/// The audio is held in memory only for the upstream call.
pub async fn process_audio_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(key): Extension<KeyContext>,
    mut multipart: Multipart,
) -> Result<Json<ProcessAudioResponse>, ApiError> {
    let mut client_id: Option<String> = None;
    let mut audio: Option<(Vec<u8>, String, Option<String>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("multipart error: {}", e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("clientId") | Some("napierClientId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("multipart error: {}", e)))?;
                client_id = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            Some("audio") => {
                let file_name = field
                    .file_name()
                    .unwrap_or(DEFAULT_AUDIO_NAME)
                    .to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("multipart error: {}", e)))?;
                audio = Some((bytes.to_vec(), file_name, content_type));
            }
            _ => {}
        }
    }

    let client_id =
        client_id.ok_or_else(|| ApiError::BadRequest(MISSING_CLIENT_ID.to_string()))?;
    let session = require_session(&state, &client_id, &key).await?;
    let (bytes, file_name, content_type) = audio
        .filter(|(bytes, _, _)| !bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest(MISSING_AUDIO.to_string()))?;
    let audio = AudioUpload {
        bytes,
        file_name,
        content_type: audio_content_type(content_type.as_deref())?.to_string(),
    };

    let bytes = audio.bytes.len();
    match state.upstream.process_audio(&session.session_id, audio).await {
        Ok(response) => {
            tracing::debug!(client_id = %client_id, bytes, "audio processed");
            log_usage(&state, key.key_id(), Some(&client_id), UsageAction::ProcessAudio, "ok")
                .await;
            Ok(Json(ProcessAudioResponse {
                success: true,
                message: "Audio processed successfully".to_string(),
                response,
            }))
        }
        Err(e) => {
            tracing::warn!(client_id = %client_id, "upstream audio processing failed: {}", e);
            log_usage(
                &state,
                key.key_id(),
                Some(&client_id),
                UsageAction::ProcessAudio,
                "upstream_error",
            )
            .await;
            Err(ApiError::Upstream(format!("Failed to process audio: {}", e)))
        }
    }
}

/// Handler for `POST /api/execute-tool`. Runs a simulated device tool.
pub async fn execute_tool_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(key): Extension<KeyContext>,
    payload: Result<Json<ExecuteToolRequest>, JsonRejection>,
) -> Result<Json<ExecuteToolResponse>, ApiError> {
    let Json(payload) = payload?;
    let client_id = payload
        .client_id()
        .ok_or_else(|| ApiError::BadRequest(MISSING_CLIENT_ID.to_string()))?;
    require_session(&state, client_id, &key).await?;
    let tool = payload
        .tool()
        .ok_or_else(|| ApiError::BadRequest(MISSING_TOOL.to_string()))?;

    match simulate_tool(tool, &payload.data) {
        Ok(result) => {
            log_usage(&state, key.key_id(), Some(client_id), UsageAction::ExecuteTool, "ok").await;
            Ok(Json(ExecuteToolResponse {
                success: true,
                message: format!("Tool {} executed successfully", tool),
                result,
            }))
        }
        Err(e @ SimulationError::UnknownTool(_)) => {
            log_usage(
                &state,
                key.key_id(),
                Some(client_id),
                UsageAction::ExecuteTool,
                "unknown_tool",
            )
            .await;
            Err(ApiError::BadRequest(e.to_string()))
        }
    }
}
