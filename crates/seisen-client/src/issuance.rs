//! License key issuance through the key webhook.
//!
//! The webhook is a small external service that mints license keys. Each
//! tier may have its own endpoint. Requests are signed with HMAC-SHA256
//! over the exact body bytes when a secret is configured.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use seisen_core::{Tier, Timestamp};

use crate::config::IssuanceConfig;
use crate::error::{check_status, ClientError};
use crate::retry::{send_unrepeatable, RetryPolicy};

/// Header carrying `sha256=<hex>` of the request body.
pub const SIGNATURE_HEADER: &str = "X-Signature";
/// Header carrying the request time in unix milliseconds.
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";

/// Who the key is for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roblox_username: Option<String>,
}

/// The payment the key is issued against.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRef {
    pub amount: f64,
    pub currency: String,
    pub transaction_id: String,
}

/// One issuance call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub tier: Tier,
    /// Key lifetime in hours; 0 means it never expires.
    #[serde(rename = "validity")]
    pub validity_hours: u32,
    pub quantity: u32,
    pub user_info: UserInfo,
    pub payment_info: PaymentRef,
}

/// Keys returned by the issuer, plus the raw response for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedKeys {
    pub keys: Vec<String>,
    pub raw: serde_json::Value,
}

/// Mints license keys.
#[async_trait]
pub trait LicenseIssuer: Send + Sync {
    /// Issue keys. An `Ok` always carries at least one key.
    async fn issue(&self, request: &IssueRequest) -> Result<IssuedKeys, ClientError>;
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    provider: &'a str,
    service: &'a str,
    #[serde(flatten)]
    request: &'a IssueRequest,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl WebhookResponse {
    fn into_keys(self) -> Result<Vec<String>, String> {
        if self.success == Some(false) {
            return Err(self
                .error
                .unwrap_or_else(|| "issuer reported failure".to_string()));
        }
        let keys: Vec<String> = if self.keys.is_empty() {
            self.key.into_iter().collect()
        } else {
            self.keys
        };
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            Err("response contained no keys".to_string())
        } else {
            Ok(keys)
        }
    }
}

type HmacSha256 = Hmac<Sha256>;

/// `sha256=<hex>` HMAC of `body` under `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, ClientError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| ClientError::InvalidArgument(format!("HMAC key: {e}")))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// [`LicenseIssuer`] backed by the key webhook.
#[derive(Debug, Clone)]
pub struct KeyWebhookClient {
    http: reqwest::Client,
    config: IssuanceConfig,
    retry: RetryPolicy,
}

impl KeyWebhookClient {
    pub fn new(config: IssuanceConfig) -> Result<Self, ClientError> {
        let http = crate::http_client(Duration::from_secs(config.timeout_secs))?;
        Ok(Self {
            http,
            config,
            retry: RetryPolicy::STANDARD,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl LicenseIssuer for KeyWebhookClient {
    async fn issue(&self, request: &IssueRequest) -> Result<IssuedKeys, ClientError> {
        let endpoint = "key webhook";
        let url = self.config.url_for(request.tier).cloned().ok_or_else(|| {
            ClientError::protocol(endpoint, format!("no webhook URL for tier {}", request.tier))
        })?;

        let body = serde_json::to_vec(&WebhookBody {
            provider: &self.config.provider,
            service: &self.config.service,
            request,
        })
        .map_err(|e| ClientError::protocol(endpoint, e.to_string()))?;
        let signature = self
            .config
            .hmac_secret
            .as_ref()
            .map(|secret| sign(secret.as_bytes(), &body))
            .transpose()?;
        let timestamp = Timestamp::now().as_millis().to_string();

        // Each POST may mint keys, so only unsent requests are retried.
        let resp = send_unrepeatable(self.retry, endpoint, || {
            let mut req = self
                .http
                .post(url.clone())
                .header(CONTENT_TYPE, "application/json")
                .header(TIMESTAMP_HEADER, &timestamp)
                .body(body.clone());
            if let Some(sig) = &signature {
                req = req.header(SIGNATURE_HEADER, sig);
            }
            req.send()
        })
        .await
        .map_err(|source| ClientError::Http {
            endpoint: endpoint.into(),
            source,
        })?;

        let raw: serde_json::Value = check_status(endpoint, resp)
            .await?
            .json()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.into(),
                source,
            })?;
        let parsed: WebhookResponse = serde_json::from_value(raw.clone())
            .map_err(|e| ClientError::protocol(endpoint, e.to_string()))?;
        let keys = parsed
            .into_keys()
            .map_err(|reason| ClientError::protocol(endpoint, reason))?;

        tracing::info!(
            tier = %request.tier,
            transaction_id = %request.payment_info.transaction_id,
            count = keys.len(),
            "license keys issued"
        );
        Ok(IssuedKeys { keys, raw })
    }
}
