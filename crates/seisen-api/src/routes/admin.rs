//! # Admin Dashboard API
//!
//! `POST /api/admin/login` is open; everything else under `/api/admin`
//! goes through [`crate::auth::require_admin`].
//!
//! | route | purpose |
//! |---|---|
//! | `GET /api/admin/payments` | ledger and totals |
//! | `GET /api/admin/payments/export` | ledger as CSV |
//! | `GET /api/admin/entitlements` | reconciliation records |
//! | `GET /api/admin/tickets` | ticket list, `?status=` filter |
//! | `POST /api/admin/ticket/{number}/reply` | staff reply |
//! | `PATCH /api/admin/ticket/{number}/status` | status change |
//! | `GET /api/admin/visitors` | per-address visit log |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use seisen_state::{EntitlementRecord, TicketStatus};
use seisen_store::{AuthorType, PaymentRecord, PaymentStats, TicketRecord, VisitorRecord};

use crate::auth;
use crate::error::AppError;
use crate::export;
use crate::extractors::{extract_json, extract_validated_json, non_blank, Validate};
use crate::notify;
use crate::routes::support::{ticket_number, validate_message, MessageResponse};
use crate::state::AppState;

/// Author name shown on staff replies.
pub const STAFF_AUTHOR: &str = "Support Team";

// ---- Request / Response types ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub success: bool,
    pub token: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentsResponse {
    pub success: bool,
    /// Newest first.
    #[schema(value_type = Vec<Object>)]
    pub payments: Vec<PaymentRecord>,
    #[schema(value_type = Object)]
    pub stats: PaymentStats,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EntitlementsResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub entitlements: Vec<EntitlementRecord>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TicketFilter {
    /// `open`, `in_progress` or `closed`; `all` or absent for every ticket.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketsResponse {
    pub success: bool,
    #[schema(value_type = Vec<Object>)]
    pub tickets: Vec<TicketRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminReplyRequest {
    pub message: Option<String>,
}

impl Validate for AdminReplyRequest {
    fn validate(&self) -> Result<(), String> {
        validate_message(&self.message)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct StatusRequest {
    pub status: Option<String>,
}

impl StatusRequest {
    fn parsed(&self) -> Result<TicketStatus, AppError> {
        non_blank(&self.status)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| AppError::BadRequest("Invalid status".into()))
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitorsResponse {
    pub success: bool,
    pub total_visits: u64,
    pub unique_visitors: usize,
    /// Most frequent visitor first.
    #[schema(value_type = Vec<Object>)]
    pub visitors: Vec<VisitorRecord>,
}

// ---- Router ----

pub fn router(state: &AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/api/admin/payments", get(list_payments))
        .route("/api/admin/payments/export", get(export_payments))
        .route("/api/admin/entitlements", get(list_entitlements))
        .route("/api/admin/tickets", get(list_tickets))
        .route("/api/admin/ticket/{number}/reply", post(admin_reply))
        .route("/api/admin/ticket/{number}/status", patch(update_status))
        .route("/api/admin/visitors", get(visitors))
        .route_layer(middleware::from_fn_with_state(
            state.admin.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/api/admin/login", post(login))
        .merge(guarded)
}

// ---- Handlers ----

/// POST /api/admin/login
#[utoipa::path(
    post,
    path = "/api/admin/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session token", body = LoginResponse),
        (status = 401, description = "Invalid password", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let req = extract_json(body)?;
    let password = req.password.unwrap_or_default();
    let token = state.admin.login(&password).ok_or_else(|| {
        tracing::warn!(configured = state.admin.is_configured(), "admin login failed");
        AppError::Unauthorized("Invalid password".into())
    })?;
    tracing::info!("admin logged in");
    Ok(Json(LoginResponse {
        success: true,
        token,
        message: "Login successful".to_string(),
    }))
}

/// GET /api/admin/payments
#[utoipa::path(
    get,
    path = "/api/admin/payments",
    responses(
        (status = 200, description = "Payment ledger", body = PaymentsResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_payments(State(state): State<AppState>) -> Json<PaymentsResponse> {
    Json(PaymentsResponse {
        success: true,
        payments: state.payments.list(),
        stats: state.payments.stats(),
    })
}

/// GET /api/admin/payments/export
#[utoipa::path(
    get,
    path = "/api/admin/payments/export",
    responses(
        (status = 200, description = "CSV attachment", content_type = "text/csv", body = String),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn export_payments(State(state): State<AppState>) -> Response {
    let payments = state.payments.list();
    let csv = export::payments_csv(&payments);
    let filename = export::export_filename(state.clock.now());
    tracing::info!(rows = payments.len(), %filename, "payments exported");
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={filename}"),
            ),
        ],
        csv,
    )
        .into_response()
}

/// GET /api/admin/entitlements
#[utoipa::path(
    get,
    path = "/api/admin/entitlements",
    responses(
        (status = 200, description = "Entitlement records", body = EntitlementsResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_entitlements(
    State(state): State<AppState>,
) -> Result<Json<EntitlementsResponse>, AppError> {
    let entitlements = state.reconcile.store().list().await?;
    Ok(Json(EntitlementsResponse {
        success: true,
        entitlements,
    }))
}

/// GET /api/admin/tickets
#[utoipa::path(
    get,
    path = "/api/admin/tickets",
    params(TicketFilter),
    responses(
        (status = 200, description = "Tickets, newest first", body = TicketsResponse),
        (status = 400, description = "Invalid status", body = crate::error::ErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    Query(filter): Query<TicketFilter>,
) -> Result<Json<TicketsResponse>, AppError> {
    let status = match non_blank(&filter.status) {
        None | Some("all") => None,
        Some(s) => Some(
            s.parse::<TicketStatus>()
                .map_err(|_| AppError::BadRequest("Invalid status".into()))?,
        ),
    };
    Ok(Json(TicketsResponse {
        success: true,
        tickets: state.tickets.list(status),
    }))
}

/// POST /api/admin/ticket/{number}/reply
#[utoipa::path(
    post,
    path = "/api/admin/ticket/{number}/reply",
    params(("number" = String, Path, description = "Ticket number")),
    request_body = AdminReplyRequest,
    responses(
        (status = 200, description = "Reply added", body = MessageResponse),
        (status = 400, description = "Empty message", body = crate::error::ErrorBody),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn admin_reply(
    State(state): State<AppState>,
    Path(number): Path<String>,
    body: Result<Json<AdminReplyRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let number = ticket_number(&number)?;
    let message = non_blank(&req.message).unwrap_or_default().to_string();

    let (reply, ticket) = state.tickets.add_reply(
        &number,
        AuthorType::Admin,
        STAFF_AUTHOR.to_string(),
        message,
        state.clock.now(),
    )?;
    tracing::info!(ticket = %number, status = %ticket.status, "staff replied");
    notify::dispatch(&state.discord, notify::admin_reply(&ticket, &reply));

    Ok(MessageResponse::ok("Reply added successfully"))
}

/// PATCH /api/admin/ticket/{number}/status
#[utoipa::path(
    patch,
    path = "/api/admin/ticket/{number}/status",
    params(("number" = String, Path, description = "Ticket number")),
    request_body = StatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MessageResponse),
        (status = 400, description = "Invalid status", body = crate::error::ErrorBody),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_status(
    State(state): State<AppState>,
    Path(number): Path<String>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_json(body)?;
    let status = req.parsed()?;
    let number = ticket_number(&number)?;
    let ticket = state
        .tickets
        .set_status(&number, status, state.clock.now())?;
    tracing::info!(ticket = %number, status = %ticket.status, "ticket status changed");
    Ok(MessageResponse::ok("Status updated successfully"))
}

/// GET /api/admin/visitors
#[utoipa::path(
    get,
    path = "/api/admin/visitors",
    responses(
        (status = 200, description = "Visit log", body = VisitorsResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ErrorBody),
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn visitors(State(state): State<AppState>) -> Json<VisitorsResponse> {
    let summary = state.visitors.summary();
    Json(VisitorsResponse {
        success: true,
        total_visits: summary.total_visits,
        unique_visitors: summary.unique_visitors,
        visitors: summary.visitors,
    })
}
