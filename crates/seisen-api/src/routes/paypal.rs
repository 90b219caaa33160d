//! # PayPal Checkout
//!
//! - `POST /api/paypal/create-order`: start checkout for a tier.
//! - `POST /api/paypal/capture-order`: capture after buyer approval,
//!   record the payment, issue a key.
//!
//! A capture id is a one-shot payment. Capturing it again returns the
//! keys already stored for it; a stored row without keys (an earlier
//! issuance failed) is issued again.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use seisen_client::{IssueRequest, OrderRequest, PayPalClient, PaymentRef, UserInfo};
use seisen_core::Tier;
use seisen_store::NewPayment;

use crate::error::AppError;
use crate::extractors::{extract_validated_json, non_blank, Validate};
use crate::notify::{self, PayPalSale};
use crate::state::AppState;

// ---- Request / Response types ----

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub tier: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub approval_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOrderRequest {
    pub order_id: Option<String>,
}

impl Validate for CaptureOrderRequest {
    fn validate(&self) -> Result<(), String> {
        match non_blank(&self.order_id) {
            Some(_) => Ok(()),
            None => Err("Order ID required".to_string()),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOrderResponse {
    pub success: bool,
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub tier: Option<Tier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---- Router ----

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/paypal/create-order", post(create_order))
        .route("/api/paypal/capture-order", post(capture_order))
}

fn client(state: &AppState) -> Result<&PayPalClient, AppError> {
    state
        .paypal
        .as_deref()
        .ok_or_else(|| AppError::ServiceUnavailable("PayPal is not configured".into()))
}

/// Where PayPal sends the buyer back: `FRONTEND_URL`, else this host.
fn frontend_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config.frontend_url {
        return url.clone();
    }
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let proto = header("x-forwarded-proto").unwrap_or("http");
    let host = header("host").unwrap_or("localhost");
    format!("{proto}://{host}")
}

/// Issue keys for a paid order. `Err` carries the diagnostic.
pub(crate) async fn issue_keys(
    state: &AppState,
    request: &IssueRequest,
) -> Result<Vec<String>, String> {
    let Some(issuer) = &state.issuer else {
        return Err("license issuer is not configured".to_string());
    };
    issuer
        .issue(request)
        .await
        .map(|issued| issued.keys)
        .map_err(|err| err.to_string())
}

// ---- Handlers ----

/// POST /api/paypal/create-order
#[utoipa::path(
    post,
    path = "/api/paypal/create-order",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order awaiting approval", body = CreateOrderResponse),
        (status = 400, description = "Invalid tier", body = crate::error::ErrorBody),
        (status = 500, description = "PayPal rejected the order", body = crate::error::ErrorBody),
    ),
    tag = "paypal"
)]
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<Json<CreateOrderResponse>, AppError> {
    let req = crate::extractors::extract_json(body)?;
    let tier: Tier = non_blank(&req.tier)
        .and_then(|t| t.parse().ok())
        .ok_or_else(|| AppError::BadRequest("Invalid tier".into()))?;
    let paypal = client(&state)?;

    let page = format!("{}/premium.html", frontend_base(&state, &headers));
    let order = paypal
        .create_order(&OrderRequest {
            tier,
            return_url: page.clone(),
            cancel_url: page,
        })
        .await
        .map_err(|err| {
            tracing::error!(tier = %tier, error = %err, "PayPal order creation failed");
            AppError::failed("Failed to create order")
        })?;

    tracing::info!(order_id = %order.order_id, tier = %tier, "PayPal order created");
    Ok(Json(CreateOrderResponse {
        order_id: order.order_id,
        approval_url: order.approval_url,
    }))
}

/// POST /api/paypal/capture-order
#[utoipa::path(
    post,
    path = "/api/paypal/capture-order",
    request_body = CaptureOrderRequest,
    responses(
        (status = 200, description = "Payment captured and key issued", body = CaptureOrderResponse),
        (status = 400, description = "Missing order id", body = crate::error::ErrorBody),
        (status = 500, description = "Capture or issuance failed", body = crate::error::ErrorBody),
    ),
    tag = "paypal"
)]
pub async fn capture_order(
    State(state): State<AppState>,
    body: Result<Json<CaptureOrderRequest>, JsonRejection>,
) -> Result<Json<CaptureOrderResponse>, AppError> {
    let req = extract_validated_json(body)?;
    let order_id = non_blank(&req.order_id).unwrap_or_default().to_string();
    let paypal = client(&state)?;

    let info = paypal
        .capture_order(&order_id)
        .await
        .and_then(|capture| capture.payment_info())
        .map_err(|err| {
            tracing::error!(%order_id, error = %err, "PayPal capture failed");
            AppError::failed("Failed to capture payment")
        })?;

    let id = info.transaction_id.clone();
    let _guard = state.locks.lock(id.as_str()).await;

    match state.payments.get(&id) {
        Some(existing) if !existing.generated_keys.is_empty() => {
            tracing::info!(transaction_id = %id, "duplicate capture, returning stored keys");
            return Ok(Json(CaptureOrderResponse {
                success: true,
                keys: existing.generated_keys,
                tier: None,
                transaction_id: None,
                email: None,
                amount: None,
                message: Some("Payment already processed".to_string()),
            }));
        }
        Some(_) => {
            tracing::warn!(transaction_id = %id, "captured payment has no keys, issuing again");
        }
        None => {
            state.payments.save(
                NewPayment {
                    transaction_id: id.clone(),
                    payer_email: info.payer_email.clone(),
                    payer_id: info.payer_id.clone(),
                    roblox_username: None,
                    roblox_uaid: None,
                    tier: info.tier,
                    amount: info.amount,
                    currency: info.currency.clone(),
                    status: "completed".to_string(),
                },
                state.clock.now(),
            )?;
        }
    }

    let validity_hours = state.reconcile.policy().validity_hours(info.tier)?;
    let request = IssueRequest {
        tier: info.tier,
        validity_hours,
        quantity: 1,
        user_info: UserInfo {
            email: info.payer_email.clone(),
            payer_id: info.payer_id.clone(),
            roblox_username: None,
        },
        payment_info: PaymentRef {
            amount: info.amount,
            currency: info.currency.clone(),
            transaction_id: id.to_string(),
        },
    };
    let keys = issue_keys(&state, &request).await.map_err(|reason| {
        tracing::error!(transaction_id = %id, %reason, "key generation failed after capture");
        metrics::counter!("seisen_issuance_failures_total", "source" => "paypal").increment(1);
        AppError::failed("Key generation failed")
    })?;

    state
        .payments
        .update_keys(&id, keys.clone(), state.clock.now())?;
    metrics::counter!("seisen_keys_issued_total", "tier" => info.tier.as_str(), "source" => "paypal")
        .increment(keys.len() as u64);
    tracing::info!(transaction_id = %id, tier = %info.tier, "PayPal payment processed");

    notify::dispatch(
        &state.discord,
        notify::paypal_sale(
            &state.discord,
            &PayPalSale {
                tier: info.tier,
                amount: info.amount,
                currency: &info.currency,
                transaction_id: id.as_str(),
                email: info.payer_email.as_deref(),
                keys: &keys,
            },
        ),
    );

    Ok(Json(CaptureOrderResponse {
        success: true,
        keys,
        tier: Some(info.tier),
        transaction_id: Some(id.to_string()),
        email: info.payer_email,
        amount: Some(info.amount),
        message: None,
    }))
}
