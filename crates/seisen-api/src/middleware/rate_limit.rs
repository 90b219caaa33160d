//! # Per-Client Rate Limiting
//!
//! Fixed-window counter keyed by client IP. In-memory, so limits are per
//! process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::Mutex;

use crate::error::ErrorBody;
use crate::extractors::ClientIp;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window.
    pub max_requests: u64,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct Window {
    count: u64,
    started: Instant,
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Count a request from `key`. `false` once the window is full.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        if windows.len() > 10_000 {
            let span = self.config.window;
            windows.retain(|_, w| now.duration_since(w.started) < span);
        }
        let window = windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });
        if now.duration_since(window.started) >= self.config.window {
            window.count = 0;
            window.started = now;
        }
        if window.count >= self.config.max_requests {
            false
        } else {
            window.count += 1;
            true
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    ip: ClientIp,
    request: Request,
    next: Next,
) -> Response {
    if !limiter.check(&ip.0) {
        tracing::warn!(ip = %ip.0, "rate limit exceeded");
        let body = ErrorBody::new("RATE_LIMITED", "Too many requests. Please slow down.");
        return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests: max,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_blocks_after_limit() {
        let l = limiter(2);
        let t = Instant::now();
        assert!(l.check_at("1.1.1.1", t));
        assert!(l.check_at("1.1.1.1", t));
        assert!(!l.check_at("1.1.1.1", t));
        assert!(l.check_at("2.2.2.2", t));
    }

    #[test]
    fn test_window_resets() {
        let l = limiter(1);
        let t = Instant::now();
        assert!(l.check_at("ip", t));
        assert!(!l.check_at("ip", t + Duration::from_secs(59)));
        assert!(l.check_at("ip", t + Duration::from_secs(60)));
    }
}
