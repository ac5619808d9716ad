//! HTTP client for the Napier proxy routes.

use crate::config::ProxyClientConfig;
use crate::error::TransportError;
use async_trait::async_trait;
use napier_types::{
    ClientRequest, ConnectResponse, DisconnectResponse, ErrorBody, ExecuteToolRequest,
    ExecuteToolResponse, ProcessAudioResponse,
};
use reqwest::multipart::{Form, Part};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Request/response exchanges the widget shell makes with the proxy.
#[async_trait]
pub trait ProxyTransport: Send + Sync {
    async fn connect(&self) -> Result<ConnectResponse, TransportError>;
    async fn disconnect(&self) -> Result<DisconnectResponse, TransportError>;
    async fn process_audio(&self, audio: Vec<u8>) -> Result<ProcessAudioResponse, TransportError>;
    async fn execute_tool(
        &self,
        tool: &str,
        data: Value,
    ) -> Result<ExecuteToolResponse, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    config: ProxyClientConfig,
}

impl ProxyClient {
    pub fn new(config: ProxyClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn client_id(&self) -> &str {
        &self.config.client_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.header("X-API-Key", key),
            None => req,
        }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let req = self.authorize(self.http.post(self.url(path)).json(body));
        decode(req.send().await?).await
    }
}

/// Maps non-2xx answers to [`TransportError::Rejected`] carrying the proxy's
/// `error` text.
async fn decode<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, TransportError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp.json::<R>().await?);
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            if text.is_empty() {
                status.canonical_reason().unwrap_or("request failed").to_string()
            } else {
                text
            }
        });
    Err(TransportError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ProxyTransport for ProxyClient {
    async fn connect(&self) -> Result<ConnectResponse, TransportError> {
        self.post_json("/api/connect", &ClientRequest::new(self.client_id()))
            .await
    }

    async fn disconnect(&self) -> Result<DisconnectResponse, TransportError> {
        self.post_json("/api/disconnect", &ClientRequest::new(self.client_id()))
            .await
    }

    async fn process_audio(&self, audio: Vec<u8>) -> Result<ProcessAudioResponse, TransportError> {
        let part = Part::bytes(audio)
            .file_name("audio.webm")
            .mime_str("audio/webm")?;
        let form = Form::new()
            .text("clientId", self.client_id().to_string())
            .part("audio", part);
        let req = self.authorize(self.http.post(self.url("/api/process-audio")).multipart(form));
        decode(req.send().await?).await
    }

    async fn execute_tool(
        &self,
        tool: &str,
        data: Value,
    ) -> Result<ExecuteToolResponse, TransportError> {
        let body = ExecuteToolRequest::new(self.client_id(), tool, data);
        self.post_json("/api/execute-tool", &body).await
    }
}
