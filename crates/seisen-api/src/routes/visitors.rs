//! Public visit counter for the landing page.

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::{routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AppError;
use crate::extractors::ClientIp;
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorCountResponse {
    pub success: bool,
    pub total_visits: u64,
    pub unique_visitors: usize,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/visitor-stats", get(visitor_stats))
}

/// GET /api/visitor-stats
///
/// Counts the caller as a visit, then reports the totals. Addresses are
/// only listed on the admin side.
#[utoipa::path(
    get,
    path = "/api/visitor-stats",
    responses((status = 200, description = "Visit totals", body = VisitorCountResponse)),
    tag = "visitors"
)]
pub async fn visitor_stats(
    State(state): State<AppState>,
    ip: ClientIp,
    headers: HeaderMap,
) -> Result<Json<VisitorCountResponse>, AppError> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());
    state
        .visitors
        .record_visit(&ip.0, user_agent, state.clock.now())?;
    let summary = state.visitors.summary();
    Ok(Json(VisitorCountResponse {
        success: true,
        total_visits: summary.total_visits,
        unique_visitors: summary.unique_visitors,
    }))
}
