//! Hosted-agent relay: `POST /api/voice-chat`.
//!
//! Resolves the caller's key and agent, then forwards the conversation step
//! upstream with the agent's system prompt and tools attached.

use crate::api::{log_usage, ApiError};
use crate::store::agents::{find_agent_for_user, AgentRecord};
use crate::store::keys::{validate_key, ValidatedKey};
use crate::store::usage::UsageAction;
use crate::upstream::RelayCall;
use crate::AppState;
use axum::extract::{rejection::JsonRejection, Extension, Json};
use napier_types::RelayRequest;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const INVALID_API_KEY: &str = "Invalid API key";
pub const AGENT_NOT_FOUND: &str = "Agent not found";

/// Builds the upstream body. Payload fields override the upstream agent id
/// but never the system prompt or tools. A non-object payload is nested
/// under `payload`.
pub fn relay_body(agent: &AgentRecord, payload: Option<Value>) -> Value {
    let mut body = Map::new();
    body.insert(
        "agentId".to_string(),
        Value::String(agent.upstream_agent_id.clone()),
    );
    match payload {
        Some(Value::Object(fields)) => body.extend(fields),
        Some(Value::Null) | None => {}
        Some(other) => {
            body.insert("payload".to_string(), other);
        }
    }
    body.insert(
        "systemPrompt".to_string(),
        Value::String(agent.system_prompt.clone()),
    );
    body.insert(
        "tools".to_string(),
        serde_json::to_value(&agent.tools).unwrap_or_else(|_| Value::Array(Vec::new())),
    );
    Value::Object(body)
}

async fn resolve(
    state: &AppState,
    api_key: String,
    agent_id: String,
) -> Result<(ValidatedKey, AgentRecord), ApiError> {
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool.get().map_err(|e| ApiError::Internal(e.to_string()))?;
        let key = validate_key(&conn, &api_key)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::Unauthorized(INVALID_API_KEY.to_string()))?;
        let agent = find_agent_for_user(&conn, &agent_id, key.user_id)
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .ok_or_else(|| ApiError::NotFound(AGENT_NOT_FOUND.to_string()))?;
        Ok::<_, ApiError>((key, agent))
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
}

/// Handler for `POST /api/voice-chat`. Returns the upstream JSON verbatim.
pub async fn voice_chat_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let (key, agent) = resolve(&state, request.api_key, request.agent_id).await?;

    tracing::info!(
        agent_id = %agent.id,
        action = request.action.as_str(),
        tools = agent.tools.len(),
        "relaying voice chat"
    );

    let call = RelayCall {
        action: request.action,
        bearer_key: key.upstream_api_key.clone(),
        body: relay_body(&agent, request.payload),
    };

    let outcome = state.upstream.relay(call).await;
    let label = if outcome.is_ok() { "ok" } else { "upstream_error" };
    log_usage(&state, Some(key.key_id), None, UsageAction::VoiceChat, label).await;

    match outcome {
        Ok(value) => Ok(Json(value)),
        Err(e) => {
            tracing::warn!(agent_id = %agent.id, "voice chat relay failed: {}", e);
            Err(e.into())
        }
    }
}
