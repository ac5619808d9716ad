#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response},
    Router,
};
use napier_db::{create_pool, run_migrations, DbPool, DbRuntimeSettings};
use napier_server::upstream::{AudioUpload, RelayCall, UpstreamError, VoiceUpstream};
use napier_server::{app, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const BOUNDARY: &str = "napier-test-boundary";

/// Records what the proxy forwards and answers with canned JSON.
#[derive(Default)]
pub struct FakeUpstream {
    pub fail: bool,
    pub audio_calls: Mutex<Vec<(String, AudioUpload)>>,
    pub relay_calls: Mutex<Vec<RelayCall>>,
}

impl FakeUpstream {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VoiceUpstream for FakeUpstream {
    async fn process_audio(
        &self,
        session_id: &str,
        audio: AudioUpload,
    ) -> Result<Value, UpstreamError> {
        let len = audio.bytes.len();
        self.audio_calls
            .lock()
            .unwrap()
            .push((session_id.to_string(), audio));
        if self.fail {
            return Err(UpstreamError::Status {
                status: 503,
                body: "overloaded".to_string(),
            });
        }
        Ok(json!({"transcript": "hello", "bytes": len}))
    }

    async fn relay(&self, call: RelayCall) -> Result<Value, UpstreamError> {
        let action = call.action.as_str();
        self.relay_calls.lock().unwrap().push(call);
        if self.fail {
            return Err(UpstreamError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        Ok(json!({"conversation": "c-1", "action": action}))
    }
}

pub fn memory_pool() -> DbPool {
    let pool = create_pool(":memory:", DbRuntimeSettings::default()).unwrap();
    run_migrations(&pool.get().unwrap()).unwrap();
    pool
}

pub struct TestApp {
    pub router: Router,
    pub pool: DbPool,
    pub upstream: Arc<FakeUpstream>,
}

pub fn test_app() -> TestApp {
    test_app_with(FakeUpstream::default(), |_| {})
}

pub fn test_app_with(upstream: FakeUpstream, configure: impl FnOnce(&mut AppState)) -> TestApp {
    let pool = memory_pool();
    let upstream = Arc::new(upstream);
    let mut state = AppState::new(pool.clone(), upstream.clone());
    configure(&mut state);
    TestApp {
        router: app(state),
        pool,
        upstream,
    }
}

fn with_peer(mut request: Request<Body>) -> Request<Body> {
    let addr = SocketAddr::from(([127, 0, 0, 1], 40000));
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn json_request(uri: &str, body: Value) -> Request<Body> {
    with_peer(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
}

pub fn json_request_with_key(uri: &str, body: Value, key: &str) -> Request<Body> {
    let mut request = json_request(uri, body);
    request
        .headers_mut()
        .insert("X-API-Key", key.parse().unwrap());
    request
}

pub fn get_request(uri: &str) -> Request<Body> {
    with_peer(Request::builder().uri(uri).body(Body::empty()).unwrap())
}

/// Builds a `multipart/form-data` upload with optional `clientId` and
/// `audio` parts.
pub fn audio_request(client_id: Option<&str>, audio: Option<&[u8]>) -> Request<Body> {
    audio_request_typed(client_id, audio, "audio/webm")
}

/// Like [`audio_request`], with the audio part's `Content-Type` given.
pub fn audio_request_typed(
    client_id: Option<&str>,
    audio: Option<&[u8]>,
    content_type: &str,
) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();
    if let Some(id) = client_id {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"clientId\"\r\n\r\n{id}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(bytes) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"clip.webm\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    with_peer(
        Request::builder()
            .method("POST")
            .uri("/api/process-audio")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap(),
    )
}

pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
