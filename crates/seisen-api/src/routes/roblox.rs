//! # Roblox Purchase Verification
//!
//! `POST /api/roblox/verify-purchase` checks the buyer's inventory and
//! reconciles the claim. Keys are returned for a first claim, a renewal
//! (the item was deleted and bought again), or an active entitlement.
//! An expired entitlement on the same item is refused.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use seisen_core::Tier;
use seisen_state::OutcomeKind;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, non_blank, Validate};
use crate::notify::{self, RobloxSale};
use crate::reconcile::ClaimResult;
use crate::state::AppState;

pub const EXPIRED_MESSAGE: &str = "Your key has expired. To get a new key, please DELETE the item from your Roblox inventory and BUY it again.";

// ---- Request / Response types ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPurchaseRequest {
    pub username: Option<String>,
    /// Optional tier; selects the Roblox item sold for it.
    pub tier: Option<String>,
}

impl Validate for VerifyPurchaseRequest {
    fn validate(&self) -> Result<(), String> {
        if non_blank(&self.username).is_none() {
            return Err("Roblox username is required".to_string());
        }
        if let Some(tier) = non_blank(&self.tier) {
            tier.parse::<Tier>().map_err(|_| "Invalid tier".to_string())?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPurchaseResponse {
    pub success: bool,
    pub keys: Vec<String>,
    #[schema(value_type = String)]
    pub tier: Tier,
    pub message: String,
    pub user_id: u64,
    pub username: String,
    /// `null` for lifetime keys.
    pub expiry_date: Option<String>,
    /// Milliseconds until expiry, for an active key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_left: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_claimed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_renewal: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpiredResponse {
    pub success: bool,
    pub error: String,
    pub is_expired: bool,
    #[schema(value_type = String)]
    pub tier: Tier,
}

// ---- Router ----

pub fn router() -> Router<AppState> {
    Router::new().route("/api/roblox/verify-purchase", post(verify_purchase))
}

// ---- Handlers ----

/// POST /api/roblox/verify-purchase
#[utoipa::path(
    post,
    path = "/api/roblox/verify-purchase",
    request_body = VerifyPurchaseRequest,
    responses(
        (status = 200, description = "Keys issued, renewed, or still active", body = VerifyPurchaseResponse),
        (status = 400, description = "Not owned, expired, or bad input", body = ExpiredResponse),
        (status = 500, description = "Key generation failed", body = crate::error::ErrorBody),
    ),
    tag = "roblox"
)]
pub async fn verify_purchase(
    State(state): State<AppState>,
    body: Result<Json<VerifyPurchaseRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let req = extract_validated_json(body)?;
    let username = non_blank(&req.username).unwrap_or_default();
    let requested = non_blank(&req.tier).and_then(|t| t.parse::<Tier>().ok());

    let result = state.reconcile.verify_purchase(username, requested).await?;

    match result.outcome {
        OutcomeKind::RejectExpired => {
            tracing::info!(transaction_id = %result.transaction_id, "expired claim refused");
            let body = ExpiredResponse {
                success: false,
                error: EXPIRED_MESSAGE.to_string(),
                is_expired: true,
                tier: result.tier,
            };
            Ok((StatusCode::BAD_REQUEST, Json(body)).into_response())
        }
        OutcomeKind::ReturnActive => Ok(Json(active_response(result)).into_response()),
        OutcomeKind::IssueNew | OutcomeKind::Renew => {
            let is_renewal = result.outcome == OutcomeKind::Renew;
            let expiry_date = result.expiry.map(|e| e.to_rfc3339());
            notify::dispatch(
                &state.discord,
                notify::roblox_sale(
                    &state.discord,
                    &RobloxSale {
                        tier: result.tier,
                        username: &result.username,
                        user_id: result.user_id,
                        is_renewal,
                        expiry: expiry_date.clone(),
                        keys: &result.keys,
                    },
                ),
            );
            Ok(Json(VerifyPurchaseResponse {
                success: true,
                keys: result.keys,
                tier: result.tier,
                message: if is_renewal {
                    "Key renewed successfully!"
                } else {
                    "Purchase verified!"
                }
                .to_string(),
                user_id: result.user_id,
                username: result.username,
                expiry_date,
                time_left: None,
                already_claimed: None,
                is_active: None,
                is_renewal: Some(is_renewal),
            })
            .into_response())
        }
    }
}

fn active_response(result: ClaimResult) -> VerifyPurchaseResponse {
    let message = if result.expiry.is_none() {
        "You own a Lifetime key"
    } else {
        "Your key is still active"
    };
    VerifyPurchaseResponse {
        success: true,
        keys: result.keys,
        tier: result.tier,
        message: message.to_string(),
        user_id: result.user_id,
        username: result.username,
        expiry_date: result.expiry.map(|e| e.to_rfc3339()),
        time_left: result.time_remaining.map(|d| d.num_milliseconds()),
        already_claimed: Some(true),
        is_active: Some(true),
        is_renewal: None,
    }
}
