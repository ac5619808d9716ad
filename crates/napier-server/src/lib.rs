//! Napier proxy server library logic.
//!
//! Sits between embedded widgets and the upstream voice API: tracks proxy
//! sessions per client id, answers simulated device tools, forwards audio,
//! relays hosted-agent requests and serves the widget script.

pub mod api;
pub mod api_relay;
pub mod api_ws;
pub mod config;
pub mod connections;
pub mod middleware;
pub mod simulate;
pub mod store;
pub mod upstream;

use axum::{
    extract::DefaultBodyLimit,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use connections::ConnectionTable;
use middleware::RateLimiter;
use napier_db::DbPool;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use upstream::VoiceUpstream;

/// Maximum JSON request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Ceiling for one uploaded audio chunk (25 MiB).
const MAX_AUDIO_BODY_BYTES: usize = 25 * 1024 * 1024;

const WIDGET_JS: &str = include_str!("../assets/widget.js");

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Active proxy sessions.
    pub connections: ConnectionTable,
    /// Upstream voice API.
    pub upstream: Arc<dyn VoiceUpstream>,
    /// Rate limiter state.
    pub rate_limiter: RateLimiter,
    /// Requests per minute per client IP.
    pub rate_limit_per_minute: u32,
    /// Reject proxy requests without a valid API key.
    pub require_api_key: bool,
}

impl AppState {
    /// State with an empty session table, open API access and the default
    /// rate limit.
    pub fn new(pool: DbPool, upstream: Arc<dyn VoiceUpstream>) -> Self {
        Self {
            pool,
            connections: ConnectionTable::new(),
            upstream,
            rate_limiter: RateLimiter::new(),
            rate_limit_per_minute: config::default_rate_limit_per_minute(),
            require_api_key: false,
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Serves the embeddable widget script.
async fn widget_js() -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=300"),
        ],
        WIDGET_JS,
    )
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let proxy_routes = Router::new()
        .route("/api/connect", post(api::connect_handler))
        .route("/api/disconnect", post(api::disconnect_handler))
        .route("/api/execute-tool", post(api::execute_tool_handler))
        .layer(axum::middleware::from_fn(middleware::api_key_middleware));

    // Audio uploads need a larger body limit than JSON routes.
    let audio_routes = Router::new()
        .route("/api/process-audio", post(api::process_audio_handler))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::api_key_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/widget.js", get(widget_js))
        .route("/api/voice-chat", post(api_relay::voice_chat_handler))
        .route("/ws", get(api_ws::ws_handler))
        .merge(proxy_routes)
        .merge(audio_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(axum::middleware::from_fn(middleware::rate_limit_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
