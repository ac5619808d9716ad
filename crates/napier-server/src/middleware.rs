use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::api::ApiError;
use crate::store::keys::{self, ValidatedKey};
use crate::AppState;

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Entries kept before expired windows are evicted.
const RATE_EVICTION_THRESHOLD: usize = 10_000;

/// The API key a request was made with, if any. Inserted by
/// [`api_key_middleware`].
#[derive(Clone, Debug, Default)]
pub struct KeyContext(pub Option<ValidatedKey>);

impl KeyContext {
    pub fn key_id(&self) -> Option<i64> {
        self.0.as_ref().map(|k| k.key_id)
    }
}

/// Reads a presented key from `X-API-Key` or `Authorization: Bearer`.
pub fn presented_key(headers: &HeaderMap) -> Option<String> {
    if let Some(val) = headers.get("X-API-Key").and_then(|v| v.to_str().ok()) {
        return Some(val.trim().to_string()).filter(|k| !k.is_empty());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Resolves the request's API key into a [`KeyContext`].
///
/// When keys are required, a missing, unknown or revoked key is answered with
/// 401 `Invalid API key`. Otherwise an invalid key is treated as no key.
pub async fn api_key_middleware(mut req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or_else(|| ApiError::Internal("application state missing".to_string()))?
        .clone();

    let validated = match presented_key(req.headers()) {
        Some(raw) => {
            let pool = state.pool.clone();
            tokio::task::spawn_blocking(move || {
                let conn = pool.get().map_err(|e| ApiError::Internal(e.to_string()))?;
                keys::validate_key(&conn, &raw).map_err(|e| ApiError::Internal(e.to_string()))
            })
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))??
        }
        None => None,
    };

    if validated.is_none() && state.require_api_key {
        tracing::info!(path = %req.uri().path(), "rejected request without a valid API key");
        return Err(ApiError::Unauthorized("Invalid API key".to_string()));
    }

    req.extensions_mut().insert(KeyContext(validated));
    Ok(next.run(req).await)
}

/// In-memory rate limiter state.
///
/// Uses a simple fixed window counter per client IP.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    state: Arc<Mutex<HashMap<IpAddr, (u32, Instant)>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns `true` if the request is allowed, `false` if `limit` is
    /// exceeded for the current window.
    pub fn check(&self, ip: IpAddr, limit: u32) -> bool {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("rate limiter lock poisoned, recovering with stale state");
                poisoned.into_inner()
            }
        };
        let now = Instant::now();

        if state.len() > RATE_EVICTION_THRESHOLD {
            state.retain(|_, (_, start)| now.duration_since(*start) <= RATE_WINDOW);
        }

        let (count, start) = state.entry(ip).or_insert((0, now));

        if now.duration_since(*start) > RATE_WINDOW {
            *count = 1;
            *start = now;
            true
        } else {
            *count += 1;
            *count <= limit
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiting middleware. Requires `ConnectInfo<SocketAddr>`.
pub async fn rate_limit_middleware(req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let state = req
        .extensions()
        .get::<Arc<AppState>>()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?
        .clone();

    let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() else {
        tracing::error!("connect info missing; serve with into_make_service_with_connect_info");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    };

    if !state.rate_limiter.check(addr.ip(), state.rate_limit_per_minute) {
        tracing::info!(ip = %addr.ip(), "rate limit exceeded");
        let mut response = ApiError::TooManyRequests.into_response();
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static("60"));
        return Ok(response);
    }

    Ok(next.run(req).await)
}
