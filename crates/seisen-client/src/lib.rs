//! # seisen-client -- typed clients for the services behind the shop
//!
//! - **PayPal** Orders v2: OAuth token, order creation, capture.
//! - **Roblox** users and inventory: ownership observations for the
//!   reconciliation decision, behind the [`OwnershipSource`] trait.
//! - **Key webhook**: license key issuance behind [`LicenseIssuer`].
//! - **Discord**: best-effort sales and support notifications.
//!
//! Every outbound call goes through [`retry`] and reports failures as
//! [`ClientError`]. Configuration is loaded from the environment by the
//! structs in [`config`] and passed to each constructor.

pub mod config;
pub mod discord;
pub mod error;
pub mod issuance;
pub mod paypal;
pub mod retry;
pub mod roblox;
pub mod token_cache;

pub use config::{ConfigError, DiscordConfig, IssuanceConfig, PayPalConfig, RobloxConfig};
pub use discord::{spoiler, DiscordNotifier, Embed};
pub use error::ClientError;
pub use issuance::{IssueRequest, IssuedKeys, KeyWebhookClient, LicenseIssuer, PaymentRef, UserInfo};
pub use paypal::{CaptureResponse, CreatedOrder, OrderRequest, PayPalClient, PaymentInfo};
pub use retry::RetryPolicy;
pub use roblox::{OwnershipError, OwnershipReport, OwnershipSource, RobloxClient};
pub use token_cache::{Clock, SystemClock, TokenCache};

use std::time::Duration;

/// Shared `reqwest` client builder settings.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("seisen-backend/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| ClientError::Http {
            endpoint: "client builder".into(),
            source,
        })
}
