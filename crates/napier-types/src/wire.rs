//! JSON bodies exchanged with the proxy.
//!
//! Field names are camelCase on the wire. Client identifiers are also
//! accepted under the legacy `napierClientId` name used by older widget
//! builds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error text the proxy answers with when a client id has no session.
///
/// Clients compare against it to notice that the proxy dropped their
/// session, e.g. after a restart.
pub const NOT_CONNECTED: &str = "Not connected to Napier AI service";

/// Body of `POST /api/connect` and `POST /api/disconnect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientRequest {
    #[serde(
        rename = "clientId",
        alias = "napierClientId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
}

impl ClientRequest {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
        }
    }

    /// Returns the client id if present and not blank.
    pub fn client_id(&self) -> Option<&str> {
        non_blank(self.client_id.as_deref())
    }
}

/// Response body of `POST /api/connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub success: bool,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

/// Response body of `POST /api/disconnect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Response body of `POST /api/process-audio`.
///
/// `response` carries the upstream voice API's reply verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessAudioResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub response: Value,
}

/// Body of `POST /api/execute-tool`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteToolRequest {
    #[serde(
        rename = "clientId",
        alias = "napierClientId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default = "empty_object")]
    pub data: Value,
}

impl ExecuteToolRequest {
    pub fn new(client_id: impl Into<String>, tool: impl Into<String>, data: Value) -> Self {
        Self {
            client_id: Some(client_id.into()),
            tool: Some(tool.into()),
            data,
        }
    }

    pub fn client_id(&self) -> Option<&str> {
        non_blank(self.client_id.as_deref())
    }

    pub fn tool(&self) -> Option<&str> {
        non_blank(self.tool.as_deref())
    }
}

/// Response body of `POST /api/execute-tool`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteToolResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

/// Error body returned by every failing proxy route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Frames accepted on the proxy WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsIncoming {
    #[serde(rename = "register")]
    Register {
        #[serde(rename = "clientId", alias = "napierClientId")]
        client_id: String,
    },
}

/// Frames sent on the proxy WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsOutgoing {
    #[serde(rename = "registered")]
    Registered { success: bool },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Conversation step forwarded by the agent relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    Start,
    Message,
    End,
}

impl RelayAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Message => "message",
            Self::End => "end",
        }
    }
}

/// Body of `POST /api/voice-chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub action: RelayAction,
    #[serde(default)]
    pub payload: Option<Value>,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
