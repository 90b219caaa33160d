//! # seisen-api: Seisen Hub HTTP Service
//!
//! Axum service behind the Seisen Hub shop. Routes delegate to the domain
//! crates: `seisen-state` decides entitlement outcomes, `seisen-store`
//! persists them, `seisen-client` talks to PayPal, Roblox, the key webhook
//! and Discord.
//!
//! ## Routes
//!
//! | prefix | module |
//! |---|---|
//! | `/api/health` | [`routes::health`] |
//! | `/api/paypal/*` | [`routes::paypal`] |
//! | `/api/roblox/verify-purchase` | [`routes::roblox`] |
//! | `/api/test/generate-key` | [`routes::test_keys`], only with `ENABLE_TEST_ENDPOINTS` |
//! | `/api/obfuscate` | [`routes::obfuscate`] |
//! | `/api/support/*` | [`routes::support`] |
//! | `/api/visitor-stats` | [`routes::visitors`] |
//! | `/api/admin/*` | [`routes::admin`], bearer token except login |
//! | `/openapi.json` | [`openapi`] |
//! | `/health/*`, `/metrics` | probes and Prometheus scrape, outside the rate limit |
//!
//! ## Middleware
//!
//! TraceLayer → Metrics → RateLimit → (admin auth) → Handler

pub mod auth;
pub mod error;
pub mod export;
pub mod extractors;
pub mod middleware;
pub mod notify;
pub mod obfuscator;
pub mod openapi;
pub mod reconcile;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use state::{AppConfig, AppState, Integrations, Stores};

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::extractors::TrustProxy;
use crate::middleware::metrics::ApiMetrics;
use crate::middleware::rate_limit::{rate_limit_middleware, RateLimiter};

/// Request bodies above this are rejected before reaching a handler.
/// Leaves headroom over the obfuscator's own source size cap.
pub const BODY_LIMIT_BYTES: usize = routes::obfuscate::MAX_CODE_BYTES + 1024 * 1024;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let metrics = ApiMetrics::new();
    let limiter = RateLimiter::new(state.config.rate_limit.clone());

    let mut api = Router::new()
        .merge(routes::health::router())
        .merge(routes::paypal::router())
        .merge(routes::roblox::router())
        .merge(routes::obfuscate::router())
        .merge(routes::support::router())
        .merge(routes::visitors::router())
        .merge(routes::admin::router(&state))
        .merge(openapi::router());

    if state.config.enable_test_endpoints {
        tracing::warn!("test key endpoint enabled");
        api = api.merge(routes::test_keys::router());
    }

    let api = api
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(from_fn_with_state(limiter, rate_limit_middleware))
        .layer(Extension(TrustProxy(state.config.trust_proxy)))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(Extension(metrics.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let probes = Router::new()
        .route("/health/liveness", get(routes::health::liveness))
        .route("/health/readiness", get(routes::health::readiness))
        .route("/metrics", get(prometheus_metrics))
        .layer(Extension(metrics))
        .with_state(state);

    Router::new().merge(probes).merge(api)
}

/// GET /metrics
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}
