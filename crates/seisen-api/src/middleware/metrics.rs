//! # Request Metrics
//!
//! Two views of the same traffic: in-process atomic counters
//! ([`ApiMetrics`]) reported by the readiness probe, and the
//! `seisen_http_requests_total` counter exported to Prometheus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    request_count: Arc<AtomicU64>,
    error_count: Arc<AtomicU64>,
}

impl ApiMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Responses with a 4xx or 5xx status.
    pub fn errors(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    fn record(&self, status: axum::http::StatusCode) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if status.is_client_error() || status.is_server_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().as_str().to_string();

    let response = next.run(request).await;

    let status = response.status();
    if let Some(m) = metrics {
        m.record(status);
    }
    ::metrics::counter!(
        "seisen_http_requests_total",
        "method" => method,
        "status" => status.as_u16().to_string()
    )
    .increment(1);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_errors_counted_separately() {
        let m = ApiMetrics::new();
        m.record(StatusCode::OK);
        m.record(StatusCode::NOT_FOUND);
        m.record(StatusCode::BAD_GATEWAY);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn test_clones_share_counters() {
        let a = ApiMetrics::new();
        let b = a.clone();
        b.record(StatusCode::CREATED);
        assert_eq!(a.requests(), 1);
    }
}
