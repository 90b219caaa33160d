//! # Application State
//!
//! [`AppConfig`] is read from the environment once at startup. [`AppState`]
//! bundles the stores, the outbound clients, and the services built on
//! them; it is cloned into every handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use zeroize::Zeroizing;

use seisen_client::{
    Clock, DiscordNotifier, LicenseIssuer, OwnershipSource, PayPalClient, RobloxConfig,
    SystemClock,
};
use seisen_state::TierValidityPolicy;
use seisen_store::{
    EntitlementStore, JsonEntitlementStore, JsonStore, KeyedLocks, PaymentLedger, StoreError,
    TicketStore, VisitorStats,
};

use crate::auth::AdminAuth;
use crate::middleware::rate_limit::RateLimitConfig;
use crate::obfuscator::{Obfuscator, ObfuscatorConfig};
use crate::reconcile::ReconcileService;

// -- Configuration ------------------------------------------------------------

/// Server configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// Dashboard password. `None` disables every admin route.
    pub admin_password: Option<Zeroizing<String>>,
    /// Base URL of the shop frontend, for PayPal return links.
    pub frontend_url: Option<String>,
    /// Mount `/api/test/generate-key`.
    pub enable_test_endpoints: bool,
    /// Believe `X-Forwarded-For` when deriving client addresses.
    pub trust_proxy: bool,
    pub entitlements_path: PathBuf,
    pub payments_path: PathBuf,
    pub tickets_path: PathBuf,
    pub stats_path: PathBuf,
    pub rate_limit: RateLimitConfig,
    pub obfuscator: ObfuscatorConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "[REDACTED]"),
            )
            .field("frontend_url", &self.frontend_url)
            .field("enable_test_endpoints", &self.enable_test_endpoints)
            .field("trust_proxy", &self.trust_proxy)
            .field("entitlements_path", &self.entitlements_path)
            .field("payments_path", &self.payments_path)
            .field("tickets_path", &self.tickets_path)
            .field("stats_path", &self.stats_path)
            .field("rate_limit", &self.rate_limit)
            .field("obfuscator", &self.obfuscator)
            .finish()
    }
}

impl AppConfig {
    /// Read every setting from the environment, with defaults:
    ///
    /// | variable | default |
    /// |---|---|
    /// | `PORT` | 3000 |
    /// | `DATA_DIR` | `./data` |
    /// | `ENTITLEMENT_DB_PATH` | `$DATA_DIR/entitlements.json` |
    /// | `PAYMENT_DB_PATH` | `$DATA_DIR/payments.json` |
    /// | `TICKET_DB_PATH` | `$DATA_DIR/tickets.json` |
    /// | `STATS_DB_PATH` | `$DATA_DIR/visitor-stats.json` |
    /// | `RATE_LIMIT_PER_MINUTE` | 120 |
    /// | `ENABLE_TEST_ENDPOINTS` | false |
    /// | `TRUST_PROXY` | false |
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(env_or("DATA_DIR", "./data"));
        let path = |var: &str, file: &str| {
            env_nonblank(var)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(file))
        };
        Self {
            port: env_nonblank("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            admin_password: env_nonblank("ADMIN_PASSWORD").map(Zeroizing::new),
            frontend_url: env_nonblank("FRONTEND_URL")
                .map(|u| u.trim_end_matches('/').to_string()),
            enable_test_endpoints: env_flag("ENABLE_TEST_ENDPOINTS"),
            trust_proxy: env_flag("TRUST_PROXY"),
            entitlements_path: path("ENTITLEMENT_DB_PATH", "entitlements.json"),
            payments_path: path("PAYMENT_DB_PATH", "payments.json"),
            tickets_path: path("TICKET_DB_PATH", "tickets.json"),
            stats_path: path("STATS_DB_PATH", "visitor-stats.json"),
            rate_limit: RateLimitConfig {
                max_requests: env_nonblank("RATE_LIMIT_PER_MINUTE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(120),
                window: Duration::from_secs(60),
            },
            obfuscator: ObfuscatorConfig::from_env(),
        }
    }

    /// In-memory friendly defaults rooted at `root`, used by tests and
    /// local tooling.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            port: 0,
            admin_password: None,
            frontend_url: None,
            enable_test_endpoints: false,
            trust_proxy: false,
            entitlements_path: root.join("entitlements.json"),
            payments_path: root.join("payments.json"),
            tickets_path: root.join("tickets.json"),
            stats_path: root.join("visitor-stats.json"),
            rate_limit: RateLimitConfig::default(),
            obfuscator: ObfuscatorConfig {
                prometheus_path: root.join("Prometheus"),
                lua_executable: "lua".to_string(),
                temp_dir: root.join("temp"),
                timeout: Duration::from_secs(120),
            },
        }
    }
}

fn env_nonblank(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or(name: &str, default: &str) -> String {
    env_nonblank(name).unwrap_or_else(|| default.to_string())
}

fn env_flag(name: &str) -> bool {
    env_nonblank(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

// -- Wiring -------------------------------------------------------------------

/// The four document stores.
#[derive(Clone)]
pub struct Stores {
    pub entitlements: Arc<dyn EntitlementStore>,
    pub payments: PaymentLedger,
    pub tickets: TicketStore,
    pub visitors: VisitorStats,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            entitlements: Arc::new(JsonEntitlementStore::in_memory()),
            payments: PaymentLedger::in_memory(),
            tickets: TicketStore::in_memory(),
            visitors: VisitorStats::in_memory(),
        }
    }

    /// Open the snapshot-backed stores named in `config`.
    pub fn open(config: &AppConfig) -> Result<Self, StoreError> {
        Ok(Self {
            entitlements: Arc::new(JsonEntitlementStore::new(JsonStore::open(
                &config.entitlements_path,
            )?)),
            payments: PaymentLedger::new(JsonStore::open(&config.payments_path)?),
            tickets: TicketStore::new(JsonStore::open(&config.tickets_path)?),
            visitors: VisitorStats::new(JsonStore::open(&config.stats_path)?),
        })
    }
}

/// Outbound integrations. Optional ones are `None` when not configured.
#[derive(Clone)]
pub struct Integrations {
    pub paypal: Option<Arc<PayPalClient>>,
    pub issuer: Option<Arc<dyn LicenseIssuer>>,
    pub ownership: Arc<dyn OwnershipSource>,
    pub roblox: RobloxConfig,
    pub discord: DiscordNotifier,
    pub clock: Arc<dyn Clock>,
}

impl Integrations {
    /// Only the Roblox source; payments, issuance and Discord disabled.
    pub fn minimal(ownership: Arc<dyn OwnershipSource>, roblox: RobloxConfig) -> Self {
        Self {
            paypal: None,
            issuer: None,
            ownership,
            roblox,
            discord: DiscordNotifier::disabled(),
            clock: Arc::new(SystemClock),
        }
    }
}

// -- AppState -----------------------------------------------------------------

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub reconcile: ReconcileService,
    pub payments: PaymentLedger,
    pub tickets: TicketStore,
    pub visitors: VisitorStats,
    /// Per-transaction locks, shared by Roblox claims and PayPal captures.
    pub locks: KeyedLocks,
    pub paypal: Option<Arc<PayPalClient>>,
    pub issuer: Option<Arc<dyn LicenseIssuer>>,
    pub discord: DiscordNotifier,
    pub admin: AdminAuth,
    pub obfuscator: Obfuscator,
    pub clock: Arc<dyn Clock>,
    pub prometheus: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("paypal", &self.paypal.is_some())
            .field("issuer", &self.issuer.is_some())
            .field("discord", &self.discord.is_enabled())
            .field("prometheus", &self.prometheus.is_some())
            .finish()
    }
}

impl AppState {
    pub fn new(config: AppConfig, stores: Stores, integrations: Integrations) -> Self {
        let locks = KeyedLocks::new();
        let reconcile = ReconcileService::new(
            stores.entitlements,
            stores.payments.clone(),
            integrations.issuer.clone(),
            integrations.ownership,
            integrations.roblox,
            TierValidityPolicy::standard(),
            locks.clone(),
            integrations.clock.clone(),
        );
        Self {
            admin: AdminAuth::new(config.admin_password.clone()),
            obfuscator: Obfuscator::new(config.obfuscator.clone()),
            config: Arc::new(config),
            reconcile,
            payments: stores.payments,
            tickets: stores.tickets,
            visitors: stores.visitors,
            locks,
            paypal: integrations.paypal,
            issuer: integrations.issuer,
            discord: integrations.discord,
            clock: integrations.clock,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
