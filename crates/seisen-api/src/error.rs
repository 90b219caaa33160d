//! # API Error Types
//!
//! [`AppError`] renders as the JSON body the shop frontend reads:
//! `{ "success": false, "error": "<message>", "code": "<CODE>" }`. The
//! `error` string is what customers see, so messages are written for
//! them. Internal failures are logged and replaced with a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use seisen_state::ReconcileError;
use seisen_store::StoreError;

use crate::obfuscator::ObfuscateError;
use crate::reconcile::ClaimError;

/// Message returned when key issuance fails after a purchase was verified.
pub const KEY_GENERATION_FAILED: &str = "Key generation failed. Please contact support.";

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    /// Extra diagnostic text, only for failures the caller can act on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            code: code.to_string(),
            details: None,
        }
    }
}

/// Application-level error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// 404.
    #[error("not found: {0}")]
    NotFound(String),

    /// 400. Malformed or incomplete input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// 401.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// 409. The request conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// 503. A backing integration is not configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// 500 with a message safe to show, e.g. "Obfuscation failed".
    #[error("{message}")]
    Failed {
        message: String,
        details: Option<String>,
    },

    /// 500. Logged; the client sees a generic message.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// A 500 with a public message and no details.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            details: None,
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            Self::Failed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "OPERATION_FAILED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let (message, details) = match self {
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                ("An internal error occurred".to_string(), None)
            }
            Self::Failed { message, details } => {
                tracing::warn!(error = %message, details = ?details, "request failed");
                (message, details)
            }
            Self::NotFound(m)
            | Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Conflict(m)
            | Self::ServiceUnavailable(m) => (m, None),
        };

        let body = ErrorBody {
            details,
            ..ErrorBody::new(code, message)
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, .. } => Self::NotFound(not_found_message(kind)),
            StoreError::Conflict { .. } => Self::Conflict(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::OwnershipUnavailable { reason } => Self::BadRequest(reason),
            ReconcileError::IssuanceFailure { reason } => {
                tracing::error!(%reason, "license issuance failed");
                Self::failed(KEY_GENERATION_FAILED)
            }
            ReconcileError::InvalidPolicy { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<ClaimError> for AppError {
    fn from(err: ClaimError) -> Self {
        match err {
            ClaimError::Reconcile(e) => e.into(),
            ClaimError::Store(e) => e.into(),
        }
    }
}

impl From<ObfuscateError> for AppError {
    fn from(err: ObfuscateError) -> Self {
        match err {
            ObfuscateError::Failed { details } => Self::Failed {
                message: "Obfuscation failed".to_string(),
                details: Some(details),
            },
            ObfuscateError::NotInstalled(_) | ObfuscateError::MissingOutput => {
                Self::failed(err.to_string())
            }
            ObfuscateError::Io(e) => Self::Internal(format!("obfuscator I/O: {e}")),
        }
    }
}

/// `"ticket"` → `"Ticket not found"`.
fn not_found_message(kind: &str) -> String {
    let mut chars = kind.chars();
    match chars.next() {
        Some(first) => format!("{}{} not found", first.to_uppercase(), chars.as_str()),
        None => "Not found".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use seisen_core::Tier;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
            ),
            (AppError::failed("x"), StatusCode::INTERNAL_SERVER_ERROR, "OPERATION_FAILED"),
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code));
        }
    }

    #[tokio::test]
    async fn bad_request_body_carries_message_verbatim() {
        let (status, body) = body_json(AppError::BadRequest("Invalid tier".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid tier");
        assert_eq!(body["success"], false);
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let (_, body) = body_json(AppError::Internal("disk on fire".into())).await;
        assert_eq!(body["error"], "An internal error occurred");
        assert!(!body.to_string().contains("disk on fire"));
    }

    #[tokio::test]
    async fn failed_includes_details() {
        let (_, body) = body_json(AppError::Failed {
            message: "Obfuscation failed".into(),
            details: Some("syntax error near 'end'".into()),
        })
        .await;
        assert_eq!(body["error"], "Obfuscation failed");
        assert_eq!(body["details"], "syntax error near 'end'");
    }

    #[test]
    fn store_not_found_maps_to_readable_message() {
        let err: AppError = StoreError::NotFound {
            kind: "ticket",
            key: "TKT-1".into(),
        }
        .into();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Ticket not found"));
    }

    #[test]
    fn reconcile_errors_map() {
        let err: AppError = ReconcileError::OwnershipUnavailable {
            reason: "Roblox user not found".into(),
        }
        .into();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Roblox user not found"));

        let err: AppError = ReconcileError::IssuanceFailure {
            reason: "timeout".into(),
        }
        .into();
        assert!(matches!(err, AppError::Failed { ref message, .. } if message == KEY_GENERATION_FAILED));

        let err: AppError = ReconcileError::InvalidPolicy { tier: Tier::Weekly }.into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn obfuscator_failure_carries_stderr() {
        let err: AppError = ObfuscateError::Failed {
            details: "boom".into(),
        }
        .into();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Obfuscation failed");
        assert_eq!(body["details"], "boom");

        let err: AppError = ObfuscateError::MissingOutput.into();
        let (_, body) = body_json(err).await;
        assert_eq!(body["error"], "Obfuscation completed but output file not found");
    }
}
