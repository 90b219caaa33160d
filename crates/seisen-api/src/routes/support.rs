//! # Support Desk (customer side)
//!
//! - `POST /api/support/ticket`: open a ticket.
//! - `GET /api/support/ticket/{number}`: ticket and thread.
//! - `POST /api/support/ticket/{number}/reply`: customer reply.
//!
//! Ticket numbers are the only credential here; customers keep theirs in
//! browser storage.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use seisen_core::TicketNumber;
use seisen_store::{AuthorType, NewTicket, ReplyRecord, TicketRecord};

use crate::error::AppError;
use crate::extractors::{extract_validated_json, non_blank, Validate};
use crate::notify;
use crate::state::AppState;

/// Longest accepted ticket description or reply.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

// ---- Request / Response types ----

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    pub user_name: Option<String>,
    pub user_email: Option<String>,
    pub category: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

impl Validate for CreateTicketRequest {
    fn validate(&self) -> Result<(), String> {
        let fields = [
            &self.user_name,
            &self.user_email,
            &self.category,
            &self.subject,
            &self.description,
        ];
        if fields.iter().any(|f| non_blank(f).is_none()) {
            return Err("All fields are required".to_string());
        }
        if self
            .description
            .as_deref()
            .is_some_and(|d| d.chars().count() > MAX_MESSAGE_CHARS)
        {
            return Err("Description is too long".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketResponse {
    pub success: bool,
    pub ticket_number: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TicketThreadResponse {
    pub success: bool,
    #[schema(value_type = Object)]
    pub ticket: TicketRecord,
    /// Oldest first.
    #[schema(value_type = Vec<Object>)]
    pub replies: Vec<ReplyRecord>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    /// Display name; defaults to the name on the ticket.
    pub user_name: Option<String>,
    pub message: Option<String>,
}

impl Validate for ReplyRequest {
    fn validate(&self) -> Result<(), String> {
        validate_message(&self.message)
    }
}

pub(crate) fn validate_message(message: &Option<String>) -> Result<(), String> {
    match non_blank(message) {
        None => Err("Message is required".to_string()),
        Some(m) if m.chars().count() > MAX_MESSAGE_CHARS => {
            Err("Message is too long".to_string())
        }
        Some(_) => Ok(()),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

/// A path segment that names a ticket. Malformed numbers are reported as
/// missing tickets.
pub(crate) fn ticket_number(raw: &str) -> Result<TicketNumber, AppError> {
    TicketNumber::parse(raw).map_err(|_| AppError::NotFound("Ticket not found".into()))
}

// ---- Router ----

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/support/ticket", post(create_ticket))
        .route("/api/support/ticket/{number}", get(get_ticket))
        .route("/api/support/ticket/{number}/reply", post(user_reply))
}

// ---- Handlers ----

/// POST /api/support/ticket
#[utoipa::path(
    post,
    path = "/api/support/ticket",
    request_body = CreateTicketRequest,
    responses(
        (status = 200, description = "Ticket opened", body = CreateTicketResponse),
        (status = 400, description = "Missing fields", body = crate::error::ErrorBody),
    ),
    tag = "support"
)]
pub async fn create_ticket(
    State(state): State<AppState>,
    body: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> Result<Json<CreateTicketResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let field = |f: &Option<String>| non_blank(f).unwrap_or_default().to_string();
    let new = NewTicket {
        user_name: field(&req.user_name),
        user_email: field(&req.user_email),
        category: field(&req.category),
        subject: field(&req.subject),
        description: field(&req.description),
    };

    let ticket = state
        .tickets
        .create(new, state.clock.now(), &mut rand::thread_rng())?;
    tracing::info!(ticket = %ticket.ticket_number, category = %ticket.category, "ticket opened");
    notify::dispatch(&state.discord, notify::new_ticket(&ticket));

    Ok(Json(CreateTicketResponse {
        success: true,
        ticket_number: ticket.ticket_number.to_string(),
        message: "Ticket submitted successfully".to_string(),
    }))
}

/// GET /api/support/ticket/{number}
#[utoipa::path(
    get,
    path = "/api/support/ticket/{number}",
    params(("number" = String, Path, description = "Ticket number, e.g. TKT-LS3N8Q00-AB12")),
    responses(
        (status = 200, description = "Ticket and replies", body = TicketThreadResponse),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorBody),
    ),
    tag = "support"
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<TicketThreadResponse>, AppError> {
    let number = ticket_number(&number)?;
    let thread = state
        .tickets
        .get(&number)
        .ok_or_else(|| AppError::NotFound("Ticket not found".into()))?;
    Ok(Json(TicketThreadResponse {
        success: true,
        ticket: thread.ticket,
        replies: thread.replies,
    }))
}

/// POST /api/support/ticket/{number}/reply
#[utoipa::path(
    post,
    path = "/api/support/ticket/{number}/reply",
    params(("number" = String, Path, description = "Ticket number")),
    request_body = ReplyRequest,
    responses(
        (status = 200, description = "Reply added", body = MessageResponse),
        (status = 400, description = "Empty message", body = crate::error::ErrorBody),
        (status = 404, description = "Ticket not found", body = crate::error::ErrorBody),
    ),
    tag = "support"
)]
pub async fn user_reply(
    State(state): State<AppState>,
    Path(number): Path<String>,
    body: Result<Json<ReplyRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let number = ticket_number(&number)?;
    let existing = state
        .tickets
        .get(&number)
        .ok_or_else(|| AppError::NotFound("Ticket not found".into()))?;

    let author = non_blank(&req.user_name)
        .map(str::to_string)
        .unwrap_or(existing.ticket.user_name);
    let message = non_blank(&req.message).unwrap_or_default().to_string();

    let (reply, ticket) = state.tickets.add_reply(
        &number,
        AuthorType::User,
        author,
        message,
        state.clock.now(),
    )?;
    tracing::info!(ticket = %number, status = %ticket.status, "customer replied");
    notify::dispatch(&state.discord, notify::user_reply(&ticket, &reply));

    Ok(MessageResponse::ok("Reply added successfully"))
}
