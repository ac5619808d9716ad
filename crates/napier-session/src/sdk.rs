use crate::error::SdkError;
use async_trait::async_trait;
use napier_tools::ToolDefinition;
use serde::Serialize;
use serde_json::{Map, Value};

/// Everything the remote voice SDK needs to start a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub agent_id: String,
    pub client_tools: Vec<ToolDefinition>,
    /// Context variables exposed to the agent (`platform`, `isWeb`, flags).
    pub dynamic_variables: Map<String, Value>,
}

/// The managed conversational-voice SDK.
///
/// Audio transport and tool-call delivery are owned by the SDK; incoming
/// tool calls are handed to
/// [`SessionController::handle_tool_call`](crate::SessionController::handle_tool_call).
#[async_trait]
pub trait VoiceSdk: Send + Sync {
    /// Starts a session and returns its conversation id.
    async fn start_session(&self, start: SessionStart) -> Result<String, SdkError>;

    async fn end_session(&self, conversation_id: &str) -> Result<(), SdkError>;
}
