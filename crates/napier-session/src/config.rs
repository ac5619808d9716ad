//! Client-side settings.

use napier_types::Platform;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

fn default_end_session_timeout_ms() -> u64 {
    5_000
}

fn default_proxy_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Settings for an SDK-backed [`SessionController`](crate::SessionController).
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Agent to talk to on the voice service.
    pub agent_id: String,

    pub platform: Platform,

    /// Extra boolean context variables passed to the agent.
    #[serde(default)]
    pub feature_flags: BTreeMap<String, bool>,

    /// Upper bound on waiting for the remote end-session call.
    #[serde(default = "default_end_session_timeout_ms")]
    pub end_session_timeout_ms: u64,
}

impl SessionSettings {
    pub fn new(agent_id: impl Into<String>, platform: Platform) -> Self {
        Self {
            agent_id: agent_id.into(),
            platform,
            feature_flags: BTreeMap::new(),
            end_session_timeout_ms: default_end_session_timeout_ms(),
        }
    }

    pub fn end_session_timeout(&self) -> Duration {
        Duration::from_millis(self.end_session_timeout_ms)
    }

    /// Context variables sent with session start.
    pub fn dynamic_variables(&self) -> Map<String, Value> {
        let mut vars = Map::new();
        for (flag, enabled) in &self.feature_flags {
            vars.insert(flag.clone(), Value::Bool(*enabled));
        }
        vars.insert(
            "platform".to_string(),
            Value::String(self.platform.as_str().to_string()),
        );
        vars.insert("isWeb".to_string(), Value::Bool(self.platform.is_browser()));
        vars
    }
}

/// Settings for [`ProxyClient`](crate::ProxyClient).
#[derive(Clone, Deserialize)]
pub struct ProxyClientConfig {
    #[serde(default = "default_proxy_url")]
    pub base_url: String,

    pub client_id: String,

    /// Sent as `X-API-Key` when present.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ProxyClientConfig {
    pub fn new(base_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl fmt::Debug for ProxyClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyClientConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
