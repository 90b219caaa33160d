//! PayPal Orders v2 client.
//!
//! Covers the three calls the checkout flow needs: OAuth client
//! credentials, order creation and order capture. The access token is
//! cached and refreshed under a lock so concurrent checkouts share one
//! token request.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;
use zeroize::Zeroizing;

use seisen_core::{Tier, TransactionId, PRICE_CURRENCY};

use crate::config::{ConfigError, PayPalConfig};
use crate::error::{check_status, ClientError};
use crate::retry::{send_unrepeatable, send_with_retry, RetryPolicy};
use crate::token_cache::{Clock, SystemClock, TokenCache};

const BRAND_NAME: &str = "Seisen Hub";
const ORDER_DESCRIPTION: &str = "Seisen Hub Premium Key";

// ---- Request / response types ----

/// What the buyer is about to pay for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub tier: Tier,
    pub return_url: String,
    pub cancel_url: String,
}

/// An order awaiting buyer approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedOrder {
    pub order_id: String,
    pub approval_url: String,
}

/// Payment details pulled out of a completed capture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentInfo {
    pub order_id: String,
    pub transaction_id: TransactionId,
    pub amount: f64,
    pub currency: String,
    pub tier: Tier,
    pub status: String,
    pub payer_email: Option<String>,
    pub payer_name: Option<String>,
    pub payer_id: Option<String>,
    pub create_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
    rel: String,
}

/// Subset of the capture response body that we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CaptureResponse {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
    #[serde(default)]
    pub payer: Option<Payer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseUnit {
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub payments: Option<Payments>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Capture {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    pub amount: Money,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub payer_id: Option<String>,
    #[serde(default)]
    pub name: Option<PayerName>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PayerName {
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
}

impl CaptureResponse {
    /// Flatten the first capture of the first purchase unit.
    ///
    /// The tier comes from the purchase unit's `custom_id`, then the
    /// capture's, defaulting to weekly.
    pub fn payment_info(&self) -> Result<PaymentInfo, ClientError> {
        const ENDPOINT: &str = "paypal capture";
        let unit = self
            .purchase_units
            .first()
            .ok_or_else(|| ClientError::protocol(ENDPOINT, "no purchase units"))?;
        let capture = unit
            .payments
            .as_ref()
            .and_then(|p| p.captures.first())
            .ok_or_else(|| ClientError::protocol(ENDPOINT, "no captures"))?;

        let transaction_id = TransactionId::new(&capture.id)
            .map_err(|e| ClientError::protocol(ENDPOINT, e.to_string()))?;
        let amount: f64 = capture.amount.value.trim().parse().map_err(|_| {
            ClientError::protocol(
                ENDPOINT,
                format!("amount {:?} is not a number", capture.amount.value),
            )
        })?;

        let tier = match unit.custom_id.as_deref().or(capture.custom_id.as_deref()) {
            None => Tier::Weekly,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(custom_id = raw, order_id = %self.id, "unknown tier in custom_id, defaulting to weekly");
                Tier::Weekly
            }),
        };

        let payer = self.payer.as_ref();
        let payer_name = payer.and_then(|p| p.name.as_ref()).and_then(|n| {
            let full = [n.given_name.as_deref(), n.surname.as_deref()]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ");
            (!full.is_empty()).then_some(full)
        });

        Ok(PaymentInfo {
            order_id: self.id.clone(),
            transaction_id,
            amount,
            currency: capture.amount.currency_code.clone(),
            tier,
            status: capture
                .status
                .clone()
                .or_else(|| self.status.clone())
                .unwrap_or_default(),
            payer_email: payer.and_then(|p| p.email_address.clone()),
            payer_name,
            payer_id: payer.and_then(|p| p.payer_id.clone()),
            create_time: capture.create_time.clone(),
        })
    }
}

// ---- Client ----

/// PayPal REST client.
pub struct PayPalClient {
    http: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: Zeroizing<String>,
    tokens: TokenCache,
    refresh: tokio::sync::Mutex<()>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for PayPalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalClient")
            .field("base_url", &self.base_url)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl PayPalClient {
    pub fn new(config: PayPalConfig) -> Result<Self, ClientError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build a client whose token cache reads time from `clock`.
    pub fn with_clock(config: PayPalConfig, clock: Arc<dyn Clock>) -> Result<Self, ClientError> {
        let http = crate::http_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            http,
            base_url: config.base_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            tokens: TokenCache::new(clock),
            refresh: tokio::sync::Mutex::new(()),
            retry: RetryPolicy::STANDARD,
        })
    }

    /// Replace the transport retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ConfigError::InvalidUrl("PAYPAL_BASE_URL".into(), e.to_string()).into())
    }

    /// A valid access token, fetching a new one when the cache is empty.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.tokens.get() {
            return Ok(token);
        }
        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.tokens.get() {
            return Ok(token);
        }

        let endpoint = "paypal oauth";
        let url = self.endpoint("v1/oauth2/token")?;
        let resp = send_with_retry(self.retry, endpoint, || {
            self.http
                .post(url.clone())
                .basic_auth(&self.client_id, Some(self.client_secret.as_str()))
                .form(&[("grant_type", "client_credentials")])
                .send()
        })
        .await
        .map_err(|source| ClientError::Http {
            endpoint: endpoint.into(),
            source,
        })?;
        let resp = check_status(endpoint, resp).await?;
        let token: TokenResponse =
            resp.json()
                .await
                .map_err(|source| ClientError::Deserialization {
                    endpoint: endpoint.into(),
                    source,
                })?;

        tracing::debug!(expires_in = token.expires_in, "fetched PayPal access token");
        self.tokens
            .store(token.access_token.clone(), token.expires_in);
        Ok(token.access_token)
    }

    /// POST with a bearer token. A 401 drops the cached token and the
    /// request is retried once with a fresh one. When `repeatable` is
    /// false, transport retries are limited to connect failures.
    async fn authorized_post(
        &self,
        endpoint: &str,
        url: Url,
        body: &serde_json::Value,
        repeatable: bool,
    ) -> Result<reqwest::Response, ClientError> {
        let mut refreshed = false;
        loop {
            let token = self.access_token().await?;
            let send = || {
                self.http
                    .post(url.clone())
                    .bearer_auth(&token)
                    .json(body)
                    .send()
            };
            let sent = if repeatable {
                send_with_retry(self.retry, endpoint, send).await
            } else {
                send_unrepeatable(self.retry, endpoint, send).await
            };
            let resp = sent.map_err(|source| ClientError::Http {
                endpoint: endpoint.into(),
                source,
            })?;

            if resp.status() == reqwest::StatusCode::UNAUTHORIZED && !refreshed {
                tracing::warn!(endpoint, "PayPal rejected cached token, refreshing");
                self.tokens.invalidate();
                refreshed = true;
                continue;
            }
            return check_status(endpoint, resp).await;
        }
    }

    /// Create an order for one key of `request.tier`.
    pub async fn create_order(&self, request: &OrderRequest) -> Result<CreatedOrder, ClientError> {
        let endpoint = "paypal create order";
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": PRICE_CURRENCY,
                    "value": request.tier.price_string(),
                },
                "description": format!("{ORDER_DESCRIPTION} - {}", request.tier.label()),
                "custom_id": request.tier.as_str(),
            }],
            "application_context": {
                "return_url": request.return_url,
                "cancel_url": request.cancel_url,
                "brand_name": BRAND_NAME,
                "user_action": "PAY_NOW",
            },
        });

        let resp = self
            .authorized_post(endpoint, self.endpoint("v2/checkout/orders")?, &body, true)
            .await?;
        let order: OrderResponse =
            resp.json()
                .await
                .map_err(|source| ClientError::Deserialization {
                    endpoint: endpoint.into(),
                    source,
                })?;

        let approval_url = order
            .links
            .into_iter()
            .find(|l| l.rel == "approve")
            .map(|l| l.href)
            .ok_or_else(|| ClientError::protocol(endpoint, "order has no approve link"))?;

        tracing::info!(order_id = %order.id, tier = %request.tier, "PayPal order created");
        Ok(CreatedOrder {
            order_id: order.id,
            approval_url,
        })
    }

    /// Capture an approved order.
    pub async fn capture_order(&self, order_id: &str) -> Result<CaptureResponse, ClientError> {
        let endpoint = "paypal capture order";
        let order_id = validate_order_id(order_id)?;
        let url = self.endpoint(&format!("v2/checkout/orders/{order_id}/capture"))?;
        let resp = self.authorized_post(endpoint, url, &json!({}), false).await?;
        resp.json()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.into(),
                source,
            })
    }
}

/// PayPal order ids are short alphanumeric strings. Anything else would
/// be interpolated into the request path, so it is refused.
fn validate_order_id(order_id: &str) -> Result<&str, ClientError> {
    let trimmed = order_id.trim();
    let valid = !trimmed.is_empty()
        && trimmed.len() <= 64
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(trimmed)
    } else {
        Err(ClientError::InvalidArgument(format!(
            "malformed order id {order_id:?}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_json() -> serde_json::Value {
        json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "payer": {
                "email_address": "buyer@example.com",
                "payer_id": "QYR5Z8XDVJNXQ",
                "name": { "given_name": "Ada", "surname": "Lovelace" }
            },
            "purchase_units": [{
                "custom_id": "monthly",
                "payments": { "captures": [{
                    "id": "3C679366HH908993F",
                    "status": "COMPLETED",
                    "amount": { "currency_code": "EUR", "value": "5.00" },
                    "create_time": "2024-03-01T12:00:00Z"
                }]}
            }]
        })
    }

    #[test]
    fn test_payment_info_extracts_first_capture() {
        let capture: CaptureResponse = serde_json::from_value(capture_json()).unwrap();
        let info = capture.payment_info().unwrap();
        assert_eq!(info.order_id, "5O190127TN364715T");
        assert_eq!(info.transaction_id.as_str(), "3C679366HH908993F");
        assert_eq!(info.amount, 5.0);
        assert_eq!(info.currency, "EUR");
        assert_eq!(info.tier, Tier::Monthly);
        assert_eq!(info.status, "COMPLETED");
        assert_eq!(info.payer_email.as_deref(), Some("buyer@example.com"));
        assert_eq!(info.payer_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(info.payer_id.as_deref(), Some("QYR5Z8XDVJNXQ"));
    }

    #[test]
    fn test_payment_info_tier_falls_back() {
        let mut raw = capture_json();
        raw["purchase_units"][0]
            .as_object_mut()
            .unwrap()
            .remove("custom_id");
        let capture: CaptureResponse = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(capture.payment_info().unwrap().tier, Tier::Weekly);

        raw["purchase_units"][0]["payments"]["captures"][0]["custom_id"] = json!("lifetime");
        let capture: CaptureResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(capture.payment_info().unwrap().tier, Tier::Lifetime);
    }

    #[test]
    fn test_payment_info_without_captures_is_protocol_error() {
        let capture: CaptureResponse = serde_json::from_value(json!({
            "id": "X",
            "purchase_units": [{ "payments": { "captures": [] } }]
        }))
        .unwrap();
        assert!(matches!(
            capture.payment_info(),
            Err(ClientError::Protocol { .. })
        ));
    }

    #[test]
    fn test_payment_info_rejects_non_numeric_amount() {
        let mut raw = capture_json();
        raw["purchase_units"][0]["payments"]["captures"][0]["amount"]["value"] = json!("five");
        let capture: CaptureResponse = serde_json::from_value(raw).unwrap();
        assert!(capture.payment_info().is_err());
    }

    #[test]
    fn test_validate_order_id() {
        assert_eq!(validate_order_id(" 5O190127TN364715T ").unwrap(), "5O190127TN364715T");
        assert!(validate_order_id("").is_err());
        assert!(validate_order_id("../../v1/oauth2/token").is_err());
        assert!(validate_order_id("abc?x=1").is_err());
    }
}
