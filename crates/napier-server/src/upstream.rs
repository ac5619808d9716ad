//! Client for the upstream conversational voice API.

use async_trait::async_trait;
use napier_types::RelayAction;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// An uploaded audio chunk.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

/// A relayed conversation step for a hosted agent.
#[derive(Debug, Clone)]
pub struct RelayCall {
    pub action: RelayAction,
    /// Key presented to the upstream as a bearer token.
    pub bearer_key: Option<String>,
    pub body: Value,
}

/// The voice service behind the proxy.
#[async_trait]
pub trait VoiceUpstream: Send + Sync {
    /// Sends one audio chunk into the session's conversation and returns the
    /// service's reply verbatim.
    async fn process_audio(&self, session_id: &str, audio: AudioUpload)
        -> Result<Value, UpstreamError>;

    async fn relay(&self, call: RelayCall) -> Result<Value, UpstreamError>;
}

/// [`VoiceUpstream`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    agent_id: String,
    api_key: Option<String>,
}

impl HttpUpstream {
    pub fn new(
        base_url: impl Into<String>,
        agent_id: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent_id: agent_id.into(),
            api_key,
        })
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl VoiceUpstream for HttpUpstream {
    async fn process_audio(
        &self,
        session_id: &str,
        audio: AudioUpload,
    ) -> Result<Value, UpstreamError> {
        let size = audio.bytes.len();
        let part = Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.content_type)?;
        let form = Form::new().part("audio", part);

        let mut req = self
            .client
            .post(format!("{}/conversation", self.base_url))
            .query(&[
                ("agent_id", self.agent_id.as_str()),
                ("session_id", session_id),
            ])
            .multipart(form);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        tracing::debug!(session_id, bytes = size, "forwarding audio upstream");
        Self::read_json(req.send().await?).await
    }

    async fn relay(&self, call: RelayCall) -> Result<Value, UpstreamError> {
        let mut req = self
            .client
            .post(format!("{}/voice-chat/{}", self.base_url, call.action.as_str()))
            .json(&call.body);
        if let Some(key) = call.bearer_key.as_ref().or(self.api_key.as_ref()) {
            req = req.bearer_auth(key);
        }

        tracing::debug!(action = call.action.as_str(), "relaying agent request upstream");
        Self::read_json(req.send().await?).await
    }
}
