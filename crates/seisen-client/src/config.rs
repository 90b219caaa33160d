//! Client configuration.
//!
//! Each upstream has its own config struct, loaded from the environment
//! once at startup and handed to the client constructor. Secrets live in
//! [`Zeroizing`] buffers and are redacted from `Debug` output.

use std::collections::BTreeMap;

use seisen_core::Tier;
use url::Url;
use zeroize::Zeroizing;

/// Roblox product sold as the lifetime license.
pub const DEFAULT_ROBLOX_PRODUCT_ID: u64 = 16906166414;

const PAYPAL_SANDBOX_URL: &str = "https://api-m.sandbox.paypal.com";
const PAYPAL_LIVE_URL: &str = "https://api-m.paypal.com";

// ---------------------------------------------------------------------------
// PayPal
// ---------------------------------------------------------------------------

/// PayPal REST credentials and endpoint.
#[derive(Clone)]
pub struct PayPalConfig {
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: Zeroizing<String>,
    /// REST base URL (sandbox or live).
    pub base_url: Url,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for PayPalConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayPalConfig")
            .field("client_id", &redact_id(&self.client_id))
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl PayPalConfig {
    /// Load from the environment.
    ///
    /// Variables:
    /// - `PAYPAL_CLIENT_ID`, `PAYPAL_CLIENT_SECRET` (required, trimmed)
    /// - `PAYPAL_SANDBOX` (`true` selects the sandbox)
    /// - `PAYPAL_BASE_URL` (overrides both)
    /// - `PAYPAL_TIMEOUT_SECS` (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        let client_id = env_required("PAYPAL_CLIENT_ID")?;
        let client_secret = Zeroizing::new(env_required("PAYPAL_CLIENT_SECRET")?);
        let default_url = if env_bool("PAYPAL_SANDBOX") {
            PAYPAL_SANDBOX_URL
        } else {
            PAYPAL_LIVE_URL
        };
        Ok(Self {
            client_id,
            client_secret,
            base_url: env_url("PAYPAL_BASE_URL", default_url)?,
            timeout_secs: env_parse("PAYPAL_TIMEOUT_SECS", 30),
        })
    }

    /// Whether this config targets the sandbox.
    pub fn is_sandbox(&self) -> bool {
        self.base_url.as_str().starts_with(PAYPAL_SANDBOX_URL)
    }
}

// ---------------------------------------------------------------------------
// Roblox
// ---------------------------------------------------------------------------

/// Roblox users and inventory endpoints, and the products that map to
/// license tiers.
#[derive(Clone)]
pub struct RobloxConfig {
    /// Users API base, for username → id lookup.
    pub users_url: Url,
    /// Inventory API base, for ownership checks.
    pub inventory_url: Url,
    /// Optional Open Cloud key, sent as `x-api-key`.
    pub api_key: Option<Zeroizing<String>>,
    /// Product used when the caller does not ask for a tier.
    pub default_product_id: u64,
    /// Product id → tier.
    pub products: BTreeMap<u64, Tier>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for RobloxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobloxConfig")
            .field("users_url", &self.users_url)
            .field("inventory_url", &self.inventory_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("default_product_id", &self.default_product_id)
            .field("products", &self.products)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl RobloxConfig {
    /// Load from the environment. Every variable is optional.
    ///
    /// - `ROBLOX_USERS_URL` (default: `https://users.roblox.com`)
    /// - `ROBLOX_INVENTORY_URL` (default: `https://inventory.roblox.com`)
    /// - `ROBLOX_API_KEY`
    /// - `ROBLOX_PRODUCT_ID` (default: 16906166414, sold as lifetime)
    /// - `ROBLOX_PRODUCT_WEEKLY`, `ROBLOX_PRODUCT_MONTHLY`
    /// - `ROBLOX_TIMEOUT_SECS` (default: 15)
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_product_id = env_parse("ROBLOX_PRODUCT_ID", DEFAULT_ROBLOX_PRODUCT_ID);
        let mut products = BTreeMap::new();
        products.insert(default_product_id, Tier::Lifetime);
        for (var, tier) in [
            ("ROBLOX_PRODUCT_WEEKLY", Tier::Weekly),
            ("ROBLOX_PRODUCT_MONTHLY", Tier::Monthly),
        ] {
            if let Some(id) = std::env::var(var).ok().and_then(|s| s.trim().parse().ok()) {
                products.insert(id, tier);
            }
        }
        Ok(Self {
            users_url: env_url("ROBLOX_USERS_URL", "https://users.roblox.com")?,
            inventory_url: env_url("ROBLOX_INVENTORY_URL", "https://inventory.roblox.com")?,
            api_key: env_optional("ROBLOX_API_KEY").map(Zeroizing::new),
            default_product_id,
            products,
            timeout_secs: env_parse("ROBLOX_TIMEOUT_SECS", 15),
        })
    }

    /// Single-product config pointing both APIs at `base` (for testing).
    pub fn local_mock(base: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl("local_mock".to_string(), e.to_string()))?;
        Ok(Self {
            users_url: url.clone(),
            inventory_url: url,
            api_key: None,
            default_product_id: DEFAULT_ROBLOX_PRODUCT_ID,
            products: BTreeMap::from([(DEFAULT_ROBLOX_PRODUCT_ID, Tier::Lifetime)]),
            timeout_secs: 5,
        })
    }

    /// Product and tier to verify. With no requested tier the default
    /// product is used; a requested tier must have a configured product.
    pub fn resolve_product(&self, requested: Option<Tier>) -> Option<(u64, Tier)> {
        match requested {
            None => Some((
                self.default_product_id,
                self.products
                    .get(&self.default_product_id)
                    .copied()
                    .unwrap_or(Tier::Lifetime),
            )),
            Some(tier) => self
                .products
                .iter()
                .find(|(_, t)| **t == tier)
                .map(|(id, t)| (*id, *t)),
        }
    }
}

// ---------------------------------------------------------------------------
// License key webhook
// ---------------------------------------------------------------------------

/// Key-issuing webhook endpoints and signing secret.
#[derive(Clone)]
pub struct IssuanceConfig {
    /// Fallback endpoint for tiers without their own.
    pub default_url: Option<Url>,
    /// Per-tier endpoints.
    pub tier_urls: BTreeMap<Tier, Url>,
    /// HMAC-SHA256 secret for the `X-Signature` header.
    pub hmac_secret: Option<Zeroizing<String>>,
    /// Provider name sent with each request.
    pub provider: String,
    /// Service name sent with each request.
    pub service: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl std::fmt::Debug for IssuanceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuanceConfig")
            .field("default_url", &self.default_url)
            .field("tier_urls", &self.tier_urls)
            .field("hmac_secret", &self.hmac_secret.as_ref().map(|_| "[REDACTED]"))
            .field("provider", &self.provider)
            .field("service", &self.service)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl IssuanceConfig {
    /// Load from the environment.
    ///
    /// - `JUNKIE_WEBHOOK_URL` (fallback)
    /// - `JUNKIE_WEBHOOK_URL_WEEKLY`, `_MONTHLY`, `_LIFETIME`
    /// - `JUNKIE_HMAC_SECRET`
    /// - `JUNKIE_PROVIDER` (default: `seisenhub`)
    /// - `JUNKIE_SERVICE` (default: `Premium Key`)
    /// - `JUNKIE_TIMEOUT_SECS` (default: 30)
    ///
    /// At least one URL must be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let default_url = env_url_optional("JUNKIE_WEBHOOK_URL")?;
        let mut tier_urls = BTreeMap::new();
        for (var, tier) in [
            ("JUNKIE_WEBHOOK_URL_WEEKLY", Tier::Weekly),
            ("JUNKIE_WEBHOOK_URL_MONTHLY", Tier::Monthly),
            ("JUNKIE_WEBHOOK_URL_LIFETIME", Tier::Lifetime),
        ] {
            if let Some(url) = env_url_optional(var)? {
                tier_urls.insert(tier, url);
            }
        }
        if default_url.is_none() && tier_urls.is_empty() {
            return Err(ConfigError::Missing("JUNKIE_WEBHOOK_URL".to_string()));
        }
        Ok(Self {
            default_url,
            tier_urls,
            hmac_secret: env_optional("JUNKIE_HMAC_SECRET").map(Zeroizing::new),
            provider: env_optional("JUNKIE_PROVIDER").unwrap_or_else(|| "seisenhub".to_string()),
            service: env_optional("JUNKIE_SERVICE").unwrap_or_else(|| "Premium Key".to_string()),
            timeout_secs: env_parse("JUNKIE_TIMEOUT_SECS", 30),
        })
    }

    /// Endpoint for `tier`, falling back to the default.
    pub fn url_for(&self, tier: Tier) -> Option<&Url> {
        self.tier_urls.get(&tier).or(self.default_url.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Discord
// ---------------------------------------------------------------------------

/// Discord webhook used for sales and support notifications.
#[derive(Clone)]
pub struct DiscordConfig {
    /// Webhook URL. Contains a secret token, so it is redacted in `Debug`.
    pub webhook_url: Url,
    /// Mention prefixed to sales notifications, e.g. `<@1234>`.
    pub mention: Option<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("webhook_url", &"[REDACTED]")
            .field("mention", &self.mention)
            .finish()
    }
}

impl DiscordConfig {
    /// Load from `DISCORD_WEBHOOK_URL` (required) and `DISCORD_MENTION`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let raw = env_required("DISCORD_WEBHOOK_URL")?;
        let webhook_url = Url::parse(&raw)
            .map_err(|e| ConfigError::InvalidUrl("DISCORD_WEBHOOK_URL".to_string(), e.to_string()))?;
        Ok(Self {
            webhook_url,
            mention: env_optional("DISCORD_MENTION"),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn redact_id(id: &str) -> String {
    match (id.get(..4), id.len().checked_sub(4).and_then(|i| id.get(i..))) {
        (Some(head), Some(tail)) if id.len() > 8 => format!("{head}…{tail}"),
        _ => "[REDACTED]".to_string(),
    }
}

fn env_optional(var: &str) -> Option<String> {
    std::env::var(var)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_required(var: &str) -> Result<String, ConfigError> {
    env_optional(var).ok_or_else(|| ConfigError::Missing(var.to_string()))
}

fn env_bool(var: &str) -> bool {
    env_optional(var).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    env_optional(var).and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_url(var: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = env_optional(var).unwrap_or_else(|| default.to_string());
    Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
}

fn env_url_optional(var: &str) -> Result<Option<Url>, ConfigError> {
    env_optional(var)
        .map(|raw| {
            Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl(var.to_string(), e.to_string()))
        })
        .transpose()
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(String),
    #[error("invalid URL for {0}: {1}")]
    InvalidUrl(String, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),
}
