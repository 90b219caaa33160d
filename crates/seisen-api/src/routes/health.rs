//! Health endpoints.
//!
//! `/api/health` reports which integrations are configured, for the shop
//! frontend. `/health/liveness` and `/health/readiness` are the plain
//! probes used by the container orchestrator.

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// `cli.lua` is present.
    pub prometheus: bool,
    pub paypal: bool,
    /// Key webhook configured.
    pub junkie: bool,
    pub discord: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub requests: u64,
    pub errors: u64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(api_health))
}

/// GET /api/health
#[utoipa::path(
    get,
    path = "/api/health",
    responses((status = 200, description = "Service status", body = HealthResponse)),
    tag = "health"
)]
pub async fn api_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: state.clock.now().to_rfc3339(),
        prometheus: state.obfuscator.is_installed(),
        paypal: state.paypal.is_some(),
        junkie: state.issuer.is_some(),
        discord: state.discord.is_enabled(),
    })
}

pub async fn liveness() -> &'static str {
    "ok"
}

pub async fn readiness(Extension(metrics): Extension<ApiMetrics>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ready",
        requests: metrics.requests(),
        errors: metrics.errors(),
    })
}
