use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tokio::sync::Mutex;

use crate::core::config::RateLimitConfig;
use crate::core::error::AppError;
use crate::core::extractor::client_ip;
use crate::features::auth::model::AuthenticatedUser;

#[derive(Debug, Clone, Copy)]
struct Window {
    requests: u32,
    reset_at_ms: i64,
}

/// Outcome of counting one request against its window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limit: u32,
    pub remaining: u32,
    /// Unix seconds (rounded up) when the window resets
    pub reset_secs: i64,
    /// Seconds until reset, present only when the request is rejected
    pub retry_after: Option<i64>,
}

impl RateLimitDecision {
    pub fn allowed(&self) -> bool {
        self.retry_after.is_none()
    }

    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", HeaderValue::from(self.limit));
        headers.insert("x-ratelimit-remaining", HeaderValue::from(self.remaining));
        headers.insert("x-ratelimit-reset", HeaderValue::from(self.reset_secs));
        if let Some(retry_after) = self.retry_after {
            headers.insert("retry-after", HeaderValue::from(retry_after));
        }
    }
}

/// Fixed-window in-memory request counter keyed by client identifier
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    store: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            max_requests: config.max_requests,
            window: config.window,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Count a request for `identifier` at `now_ms` (unix millis)
    pub async fn check(&self, identifier: &str, now_ms: i64) -> RateLimitDecision {
        let window_ms = self.window.as_millis() as i64;
        let mut store = self.store.lock().await;

        let entry = store.entry(identifier.to_string()).or_insert(Window {
            requests: 0,
            reset_at_ms: now_ms + window_ms,
        });

        if now_ms > entry.reset_at_ms {
            *entry = Window {
                requests: 0,
                reset_at_ms: now_ms + window_ms,
            };
        }

        entry.requests = entry.requests.saturating_add(1);

        let retry_after = if entry.requests > self.max_requests {
            Some(ceil_div(entry.reset_at_ms - now_ms, 1000))
        } else {
            None
        };

        RateLimitDecision {
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(entry.requests),
            reset_secs: ceil_div(entry.reset_at_ms, 1000),
            retry_after,
        }
    }

    /// Drop every window that has already expired, returning how many were removed
    pub async fn cleanup(&self, now_ms: i64) -> usize {
        let mut store = self.store.lock().await;
        let before = store.len();
        store.retain(|_, w| now_ms <= w.reset_at_ms);
        before - store.len()
    }

    #[cfg(test)]
    pub async fn tracked_clients(&self) -> usize {
        self.store.lock().await.len()
    }

    /// Spawn the periodic purge of expired windows
    pub fn spawn_cleanup_task(self: &Arc<Self>, every: Duration) -> tokio::task::JoinHandle<()> {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let cleaned = limiter.cleanup(Utc::now().timestamp_millis()).await;
                if cleaned > 0 {
                    tracing::debug!("Cleaned up {} expired rate limit entries", cleaned);
                }
            }
        })
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    (value + divisor - 1).div_euclid(divisor)
}

/// Identify the caller: authenticated user id first, then forwarded or peer IP
pub fn client_identifier(req: &Request) -> String {
    if let Some(user) = req.extensions().get::<AuthenticatedUser>() {
        return format!("user:{}", user.id);
    }

    let ip = client_ip(req.headers(), req.extensions());

    format!("ip:{}", ip.unwrap_or_else(|| "unknown".to_string()))
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let identifier = client_identifier(&req);
    let decision = limiter
        .check(&identifier, Utc::now().timestamp_millis())
        .await;

    if !decision.allowed() {
        tracing::warn!(
            identifier = %identifier,
            limit = decision.limit,
            uri = %req.uri(),
            user_agent = req
                .headers()
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-"),
            "SECURITY WARNING: Rate limit exceeded"
        );

        let mut response =
            AppError::RateLimitExceeded("Too many requests, please try again later".to_string())
                .into_response();
        decision.apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(req).await;
    decision.apply_headers(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use axum_test::TestServer;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(3600),
        })
    }

    #[tokio::test]
    async fn test_counts_within_window() {
        let limiter = limiter(2);
        let now = 1_700_000_000_000;

        let first = limiter.check("ip:1.1.1.1", now).await;
        assert!(first.allowed());
        assert_eq!(first.remaining, 1);
        assert_eq!(first.reset_secs, 1_700_000_060);

        let second = limiter.check("ip:1.1.1.1", now + 10).await;
        assert!(second.allowed());
        assert_eq!(second.remaining, 0);

        let third = limiter.check("ip:1.1.1.1", now + 1_500).await;
        assert!(!third.allowed());
        assert_eq!(third.remaining, 0);
        assert_eq!(third.retry_after, Some(59));
    }

    #[tokio::test]
    async fn test_window_resets_after_expiry() {
        let limiter = limiter(1);
        let now = 1_700_000_000_000;

        assert!(limiter.check("user:a", now).await.allowed());
        assert!(!limiter.check("user:a", now + 1).await.allowed());

        // Still inside the window at exactly reset time
        assert!(!limiter.check("user:a", now + 60_000).await.allowed());

        let after = limiter.check("user:a", now + 60_001).await;
        assert!(after.allowed());
        assert_eq!(after.remaining, 0);
    }

    #[tokio::test]
    async fn test_identifiers_are_independent() {
        let limiter = limiter(1);
        let now = 1_700_000_000_000;

        assert!(limiter.check("user:a", now).await.allowed());
        assert!(limiter.check("user:b", now).await.allowed());
        assert!(!limiter.check("user:a", now).await.allowed());
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_windows() {
        let limiter = limiter(5);
        let now = 1_700_000_000_000;

        limiter.check("ip:a", now).await;
        limiter.check("ip:b", now + 30_000).await;
        assert_eq!(limiter.tracked_clients().await, 2);

        assert_eq!(limiter.cleanup(now + 60_001).await, 1);
        assert_eq!(limiter.tracked_clients().await, 1);
        assert_eq!(limiter.cleanup(now + 90_001).await, 1);
        assert_eq!(limiter.tracked_clients().await, 0);
    }

    #[test]
    fn test_client_identifier_prefers_forwarded_ip() {
        let req = Request::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&req), "ip:203.0.113.7");

        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_identifier(&req), "ip:unknown");
    }

    #[tokio::test]
    async fn test_middleware_sets_headers_and_rejects() {
        let limiter = Arc::new(limiter(1));
        let app = Router::new()
            .route("/ping", get(|| async { "pong" }))
            .route_layer(axum::middleware::from_fn_with_state(
                limiter,
                rate_limit_middleware,
            ));
        let server = TestServer::new(app).unwrap();

        let ok = server.get("/ping").await;
        ok.assert_status_ok();
        assert_eq!(ok.header("x-ratelimit-limit"), "1");
        assert_eq!(ok.header("x-ratelimit-remaining"), "0");

        let limited = server.get("/ping").await;
        limited.assert_status(axum::http::StatusCode::TOO_MANY_REQUESTS);
        assert!(limited.maybe_header("retry-after").is_some());
        let body: serde_json::Value = limited.json();
        assert_eq!(body["code"], "RATE_LIMITED");
    }
}
