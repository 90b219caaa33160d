//! Roblox ownership source.
//!
//! Resolves a username to a user id, then reads the user's inventory for
//! the product. The newest owned instance becomes the ownership
//! observation fed to reconciliation: its `instanceId` is the signal and
//! its `created` time (when Roblox reports one) the observed creation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use seisen_core::{Timestamp, TransactionId};
use seisen_state::OwnershipObservation;

use crate::config::{ConfigError, RobloxConfig};
use crate::error::{check_status, ClientError};
use crate::retry::{send_with_retry, RetryPolicy};

/// Why ownership could not be established. The `Display` text is shown
/// to the customer as-is.
#[derive(Debug, thiserror::Error)]
pub enum OwnershipError {
    #[error("Roblox user not found")]
    UserNotFound { username: String },

    #[error("You do not own the required item")]
    NotOwned { user_id: u64, product_id: u64 },

    #[error("Your inventory is private. Please make your inventory public in Roblox privacy settings and try again.")]
    InventoryPrivate { user_id: u64 },

    #[error("Unable to reach Roblox right now. Please try again later.")]
    Upstream(#[source] ClientError),
}

impl From<ClientError> for OwnershipError {
    fn from(e: ClientError) -> Self {
        Self::Upstream(e)
    }
}

/// A confirmed ownership of `product_id` by a Roblox user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipReport {
    pub user_id: u64,
    /// Canonical username as Roblox spells it.
    pub username: String,
    pub product_id: u64,
    pub observation: OwnershipObservation,
}

impl OwnershipReport {
    /// Ledger key for this user and product.
    pub fn transaction_id(&self) -> TransactionId {
        TransactionId::roblox(self.user_id, self.product_id)
    }
}

/// Anything that can tell whether a user currently owns a product.
#[async_trait]
pub trait OwnershipSource: Send + Sync {
    async fn observe(
        &self,
        username: &str,
        product_id: u64,
    ) -> Result<OwnershipReport, OwnershipError>;
}

#[derive(Debug, Deserialize)]
struct UsersResponse {
    #[serde(default)]
    data: Vec<RobloxUser>,
}

#[derive(Debug, Deserialize)]
struct RobloxUser {
    id: u64,
    name: String,
}

#[derive(Debug, Deserialize)]
struct InventoryResponse {
    #[serde(default)]
    data: Vec<InventoryItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InventoryItem {
    instance_id: u64,
    #[serde(default)]
    created: Option<String>,
}

impl InventoryItem {
    fn created_at(&self) -> Option<Timestamp> {
        self.created.as_deref().and_then(|c| Timestamp::parse(c).ok())
    }
}

/// HTTP implementation of [`OwnershipSource`] against the public users
/// and inventory APIs.
#[derive(Debug, Clone)]
pub struct RobloxClient {
    http: reqwest::Client,
    users_url: Url,
    inventory_url: Url,
    retry: RetryPolicy,
}

impl RobloxClient {
    pub fn new(config: &RobloxConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(key.as_str()).map_err(|_| {
                ConfigError::InvalidValue("ROBLOX_API_KEY".into(), "not a valid header value".into())
            })?;
            value.set_sensitive(true);
            headers.insert("x-api-key", value);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|source| ClientError::Http {
                endpoint: "client builder".into(),
                source,
            })?;
        Ok(Self {
            http,
            users_url: config.users_url.clone(),
            inventory_url: config.inventory_url.clone(),
            retry: RetryPolicy::STANDARD,
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Look up the id and canonical name for `username`.
    pub async fn resolve_user(&self, username: &str) -> Result<Option<(u64, String)>, ClientError> {
        let endpoint = "roblox users";
        let url = join(&self.users_url, "v1/usernames/users")?;
        let body = json!({ "usernames": [username], "excludeBannedUsers": true });
        let resp = send_with_retry(self.retry, endpoint, || {
            self.http.post(url.clone()).json(&body).send()
        })
        .await
        .map_err(|source| ClientError::Http {
            endpoint: endpoint.into(),
            source,
        })?;
        let users: UsersResponse = check_status(endpoint, resp)
            .await?
            .json()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.into(),
                source,
            })?;
        Ok(users.data.into_iter().next().map(|u| (u.id, u.name)))
    }

    async fn inventory(&self, user_id: u64, product_id: u64) -> Result<InventoryResponse, OwnershipError> {
        let endpoint = "roblox inventory";
        let url = join(
            &self.inventory_url,
            &format!("v1/users/{user_id}/items/Asset/{product_id}"),
        )?;
        let resp = send_with_retry(self.retry, endpoint, || self.http.get(url.clone()).send())
            .await
            .map_err(|source| ClientError::Http {
                endpoint: endpoint.into(),
                source,
            })?;
        if resp.status() == reqwest::StatusCode::FORBIDDEN {
            return Err(OwnershipError::InventoryPrivate { user_id });
        }
        let inventory = check_status(endpoint, resp)
            .await?
            .json()
            .await
            .map_err(|source| ClientError::Deserialization {
                endpoint: endpoint.into(),
                source,
            })?;
        Ok(inventory)
    }
}

#[async_trait]
impl OwnershipSource for RobloxClient {
    async fn observe(
        &self,
        username: &str,
        product_id: u64,
    ) -> Result<OwnershipReport, OwnershipError> {
        let (user_id, canonical) =
            self.resolve_user(username)
                .await?
                .ok_or_else(|| OwnershipError::UserNotFound {
                    username: username.to_string(),
                })?;

        let inventory = self.inventory(user_id, product_id).await?;
        let newest = inventory
            .data
            .iter()
            .max_by_key(|item| (item.created_at(), item.instance_id))
            .ok_or(OwnershipError::NotOwned {
                user_id,
                product_id,
            })?;

        tracing::debug!(
            user_id,
            product_id,
            instance_id = newest.instance_id,
            owned = inventory.data.len(),
            "Roblox ownership observed"
        );

        Ok(OwnershipReport {
            user_id,
            username: canonical,
            product_id,
            observation: OwnershipObservation {
                observed_signal: Some(newest.instance_id.to_string()),
                observed_created: newest.created_at(),
            },
        })
    }
}

fn join(base: &Url, path: &str) -> Result<Url, ClientError> {
    base.join(path)
        .map_err(|e| ConfigError::InvalidUrl(base.to_string(), e.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inventory_item_created_parses_or_ignores() {
        let item: InventoryItem = serde_json::from_value(json!({
            "instanceId": 42,
            "created": "2024-05-01T10:00:00.000Z"
        }))
        .unwrap();
        assert_eq!(
            item.created_at(),
            Some(Timestamp::parse("2024-05-01T10:00:00Z").unwrap())
        );

        let item: InventoryItem =
            serde_json::from_value(json!({ "instanceId": 42, "created": "yesterday" })).unwrap();
        assert_eq!(item.created_at(), None);
    }

    #[test]
    fn test_ownership_error_messages_are_customer_facing() {
        let e = OwnershipError::UserNotFound {
            username: "nobody".into(),
        };
        assert_eq!(e.to_string(), "Roblox user not found");
        let e = OwnershipError::NotOwned {
            user_id: 1,
            product_id: 2,
        };
        assert_eq!(e.to_string(), "You do not own the required item");
    }

    #[test]
    fn test_report_transaction_id() {
        let report = OwnershipReport {
            user_id: 7,
            username: "Builder".into(),
            product_id: 99,
            observation: OwnershipObservation::default(),
        };
        assert_eq!(report.transaction_id().as_str(), "ROBLOX_7_99");
    }
}
