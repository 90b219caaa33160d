//! # Simulated Payment
//!
//! `POST /api/test/generate-key` records a `test_completed` payment and
//! runs real issuance without PayPal. When the key webhook fails a mock
//! key is stored instead so the purchase flow can still be exercised.
//! Mounted only with `ENABLE_TEST_ENDPOINTS=true`.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use seisen_client::{IssueRequest, PaymentRef, UserInfo};
use seisen_core::{to_base36, Tier, Timestamp, TransactionId, PRICE_CURRENCY};
use seisen_store::NewPayment;

use crate::error::AppError;
use crate::extractors::{extract_json, non_blank};
use crate::routes::paypal::issue_keys;
use crate::state::AppState;

const TEST_PAYER: &str = "TEST_PAYER";
const TEST_ROBLOX_USER: &str = "TestUser";

// ---- Request / Response types ----

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeyRequest {
    pub tier: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub email: Option<String>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKeyResponse {
    pub success: bool,
    pub keys: Vec<String>,
    #[schema(value_type = String)]
    pub tier: Tier,
    pub transaction_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_mock_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_error: Option<String>,
}

/// `SEISEN-TEST-<TIER>-<base36 millis>`, upper-cased.
pub fn mock_key(tier: Tier, now: Timestamp) -> String {
    let millis = u64::try_from(now.as_millis()).unwrap_or_default();
    format!(
        "SEISEN-TEST-{}-{}",
        tier.as_str().to_uppercase(),
        to_base36(millis).to_uppercase()
    )
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/test/generate-key", post(generate_key))
}

/// POST /api/test/generate-key
#[utoipa::path(
    post,
    path = "/api/test/generate-key",
    request_body = GenerateKeyRequest,
    responses(
        (status = 200, description = "Key issued, or a mock key stored", body = GenerateKeyResponse),
        (status = 400, description = "Invalid tier", body = crate::error::ErrorBody),
        (status = 409, description = "Transaction id already used", body = crate::error::ErrorBody),
    ),
    tag = "test"
)]
pub async fn generate_key(
    State(state): State<AppState>,
    body: Result<Json<GenerateKeyRequest>, JsonRejection>,
) -> Result<Json<GenerateKeyResponse>, AppError> {
    let req = extract_json(body)?;
    let tier: Tier = non_blank(&req.tier)
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| AppError::BadRequest("Invalid tier".into()))?;
    let now = state.clock.now();
    let amount = req
        .amount
        .unwrap_or_else(|| f64::from(tier.price_cents()) / 100.0);
    let currency = non_blank(&req.currency)
        .unwrap_or(PRICE_CURRENCY)
        .to_string();
    let email = non_blank(&req.email).map(str::to_string);
    let transaction_id = match non_blank(&req.transaction_id) {
        Some(id) => TransactionId::new(id).map_err(|e| AppError::BadRequest(e.to_string()))?,
        None => TransactionId::new(format!(
            "TEST-{}",
            to_base36(u64::try_from(now.as_millis()).unwrap_or_default()).to_uppercase()
        ))
        .map_err(|e| AppError::Internal(e.to_string()))?,
    };

    tracing::info!(transaction_id = %transaction_id, tier = %tier, "simulated payment");
    state.payments.save(
        NewPayment {
            transaction_id: transaction_id.clone(),
            payer_email: email.clone(),
            payer_id: Some(TEST_PAYER.to_string()),
            roblox_username: Some(TEST_ROBLOX_USER.to_string()),
            roblox_uaid: None,
            tier,
            amount,
            currency: currency.clone(),
            status: "test_completed".to_string(),
        },
        now,
    )?;

    let request = IssueRequest {
        tier,
        validity_hours: state.reconcile.policy().validity_hours(tier)?,
        quantity: 1,
        user_info: UserInfo {
            email,
            payer_id: Some(TEST_PAYER.to_string()),
            roblox_username: Some(TEST_ROBLOX_USER.to_string()),
        },
        payment_info: PaymentRef {
            amount,
            currency,
            transaction_id: transaction_id.to_string(),
        },
    };

    let response = match issue_keys(&state, &request).await {
        Ok(keys) => {
            state
                .payments
                .update_keys(&transaction_id, keys.clone(), now)?;
            GenerateKeyResponse {
                success: true,
                keys,
                tier,
                transaction_id: transaction_id.to_string(),
                message: "Test payment processed successfully".to_string(),
                is_mock_key: false,
                issuer_error: None,
            }
        }
        Err(reason) => {
            tracing::warn!(transaction_id = %transaction_id, %reason, "issuer failed, storing mock key");
            let key = mock_key(tier, now);
            state
                .payments
                .update_keys(&transaction_id, vec![key.clone()], now)?;
            GenerateKeyResponse {
                success: true,
                keys: vec![key],
                tier,
                transaction_id: transaction_id.to_string(),
                message: "Test mode: Mock key generated (key webhook failed)".to_string(),
                is_mock_key: true,
                issuer_error: Some(reason),
            }
        }
    };
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_key_format() {
        let now = Timestamp::from_millis(1_700_000_000_000);
        assert_eq!(mock_key(Tier::Weekly, now), "SEISEN-TEST-WEEKLY-LOYW3V28");
        assert_eq!(mock_key(Tier::Lifetime, now), "SEISEN-TEST-LIFETIME-LOYW3V28");
    }
}
