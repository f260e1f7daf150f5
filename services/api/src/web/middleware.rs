//! services/api/src/web/middleware.rs
//!
//! Request middleware: session-token authentication, the centralized error
//! responder, per-client rate limiting and the response-time header.

use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, Extensions, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{AppError, ErrorReport};
use crate::web::state::AppState;
use crate::web::token::Verification;

/// Header carrying the session token.
pub const AUTH_HEADER: &str = "x-auth";

/// How often the rate limiter sweeps stale client entries from its map.
const RATE_LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

//=========================================================================================
// Authentication
//=========================================================================================

/// Middleware that verifies the `x-auth` token and attaches its claim.
///
/// If valid, inserts the `SessionClaim` into request extensions for handlers to use.
/// If missing, forged, expired or not authorized, the request is rejected
/// with `Unauthenticated`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthenticated(format!("missing {} header", AUTH_HEADER)))?;

    let claim = match state.tokens.verify(token) {
        Verification::Valid(claim) => claim,
        Verification::Invalid(reason) => {
            debug!("Rejected session token: {}", reason);
            return Err(AppError::Unauthenticated(reason));
        }
    };

    req.extensions_mut().insert(claim);
    Ok(next.run(req).await)
}

//=========================================================================================
// Error Responder
//=========================================================================================

/// Re-renders error bodies with their detail when not running in production.
///
/// `AppError` responses already carry the safe `{message, error: {}}` body;
/// this only enriches it.
pub async fn render_errors(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    let mut response = next.run(req).await;
    if state.config.production {
        return response;
    }
    let report = response.extensions_mut().remove::<ErrorReport>();
    match report {
        Some(report) => (response.status(), Json(report.body(false))).into_response(),
        None => response,
    }
}

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound("Not found!".to_string())
}

//=========================================================================================
// Client Address
//=========================================================================================

/// The caller's address. The first `x-forwarded-for` hop is only believed
/// when `trust_proxy` is set; otherwise the peer address is used.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_proxy: bool) -> String {
    let forwarded = trust_proxy
        .then(|| headers.get("x-forwarded-for"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|info| info.0.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Extractor for [`client_ip`], honouring the configured proxy trust.
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(client_ip(
            &parts.headers,
            &parts.extensions,
            state.config.trust_proxy,
        )))
    }
}

//=========================================================================================
// Rate Limiting
//=========================================================================================

#[derive(Debug)]
struct ClientWindows {
    hits: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

/// Sliding-window request counter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    limit_per_window: u32,
    window: Duration,
    clients: Mutex<ClientWindows>,
}

impl RateLimiter {
    /// A limit of `0` disables limiting.
    pub fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit_per_window,
            window,
            clients: Mutex::new(ClientWindows {
                hits: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Records a request from `key` unless it already used up its window.
    pub fn allow(&self, key: &str) -> bool {
        if self.limit_per_window == 0 {
            return true;
        }

        let now = Instant::now();
        let window = self.window;
        let in_window = |hit: &Instant| now.duration_since(*hit) < window;

        let mut guard = self.clients.lock();
        let clients = &mut *guard;

        if now.duration_since(clients.last_sweep) >= RATE_LIMITER_SWEEP_INTERVAL {
            clients.hits.retain(|_, hits| {
                hits.retain(in_window);
                !hits.is_empty()
            });
            clients.last_sweep = now;
        }

        let hits = clients.hits.entry(key.to_owned()).or_default();
        while hits.front().is_some_and(|hit| !in_window(hit)) {
            hits.pop_front();
        }
        if hits.len() >= self.limit_per_window as usize {
            return false;
        }
        hits.push_back(now);
        true
    }
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = client_ip(req.headers(), req.extensions(), state.config.trust_proxy);
    if !state.rate_limiter.allow(&key) {
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}

//=========================================================================================
// Request Timeout
//=========================================================================================

/// Fails requests that run past the configured timeout with `Timeout`.
pub async fn request_timeout(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    tokio::time::timeout(state.config.request_timeout, next.run(req))
        .await
        .map_err(|_| AppError::Timeout)
}

//=========================================================================================
// Response Time
//=========================================================================================

/// Adds `x-response-time` with the handling time in milliseconds.
pub async fn response_time(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(req).await;
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    if let Ok(value) = HeaderValue::from_str(&format!("{:.3}ms", elapsed_ms)) {
        response.headers_mut().insert("x-response-time", value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ChannelNotifier, MemoryAdapter};
    use crate::config::Config;
    use axum::{body::Body, http::StatusCode, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[test]
    fn limiter_blocks_after_limit() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
        assert!(limiter.allow("10.0.0.2"));
    }

    #[test]
    fn zero_limit_disables_limiting() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..1000 {
            assert!(limiter.allow("10.0.0.1"));
        }
    }

    #[test]
    fn window_longer_than_uptime_still_counts() {
        let limiter = RateLimiter::new(1, Duration::from_secs(100 * 365 * 24 * 60 * 60));
        assert!(limiter.allow("10.0.0.1"));
        assert!(!limiter.allow("10.0.0.1"));
    }

    #[test]
    fn forwarded_for_is_only_believed_behind_a_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))));

        assert_eq!(client_ip(&headers, &extensions, true), "203.0.113.9");
        assert_eq!(client_ip(&headers, &extensions, false), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), &extensions, true), "127.0.0.1");
        assert_eq!(client_ip(&headers, &Extensions::new(), false), "unknown");
    }

    #[tokio::test]
    async fn slow_request_times_out_with_an_error_body() {
        let mut config = Config::from_lookup(|name| match name {
            "DATABASE_URL" => Some("memory://".to_string()),
            "JWT_SECRET" => Some("s3cret".to_string()),
            _ => None,
        })
        .unwrap();
        config.request_timeout = Duration::from_millis(50);
        let (notifier, _rx) = ChannelNotifier::new(1);
        let state = Arc::new(AppState::new(
            Arc::new(MemoryAdapter::new()),
            Arc::new(notifier),
            Arc::new(config),
        ));

        let app = Router::new()
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "done"
                }),
            )
            .layer(axum::middleware::from_fn_with_state(state.clone(), request_timeout))
            .layer(axum::middleware::from_fn_with_state(state.clone(), render_errors))
            .with_state(state);

        let request = axum::http::Request::builder()
            .uri("/slow")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Request timed out");
        assert_eq!(body["error"]["kind"], "Timeout");
    }
}
