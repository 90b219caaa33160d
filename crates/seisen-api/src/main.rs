//! # seisen-api: Binary Entry Point
//!
//! Reads configuration from the environment, opens the document stores,
//! connects whichever integrations are configured, and serves on `PORT`
//! (default 3000).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use seisen_api::obfuscator::{sweep, TEMP_MAX_AGE};
use seisen_api::state::{AppConfig, AppState, Integrations, Stores};
use seisen_client::{
    DiscordConfig, DiscordNotifier, IssuanceConfig, KeyWebhookClient, LicenseIssuer,
    PayPalClient, PayPalConfig, RobloxClient, RobloxConfig, SystemClock,
};

/// How often stale obfuscator temp files are removed.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = AppConfig::from_env();
    tracing::debug!(?config, "configuration loaded");
    if config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD not set. Admin routes will reject every request.");
    }

    let stores = Stores::open(&config).map_err(|e| {
        tracing::error!("Failed to open data stores: {e}");
        e
    })?;

    let paypal = match PayPalConfig::from_env() {
        Ok(cfg) => Some(Arc::new(PayPalClient::new(cfg)?)),
        Err(e) => {
            tracing::warn!("PayPal not configured: {e}. Checkout endpoints will return 503.");
            None
        }
    };

    let issuer: Option<Arc<dyn LicenseIssuer>> = match IssuanceConfig::from_env() {
        Ok(cfg) => Some(Arc::new(KeyWebhookClient::new(cfg)?)),
        Err(e) => {
            tracing::warn!("Key webhook not configured: {e}. Purchases cannot be fulfilled.");
            None
        }
    };

    let discord = match DiscordConfig::from_env() {
        Ok(cfg) => DiscordNotifier::new(cfg)?,
        Err(e) => {
            tracing::warn!("Discord not configured: {e}. Notifications disabled.");
            DiscordNotifier::disabled()
        }
    };

    let roblox = RobloxConfig::from_env()?;
    let ownership = Arc::new(RobloxClient::new(&roblox)?);
    tracing::info!(products = roblox.products.len(), "Roblox catalogue loaded");

    let integrations = Integrations {
        paypal,
        issuer,
        ownership,
        roblox,
        discord,
        clock: Arc::new(SystemClock),
    };

    let mut state = AppState::new(config.clone(), stores, integrations);
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => state = state.with_prometheus(handle),
        Err(e) => tracing::warn!("Prometheus recorder not installed: {e}"),
    }

    let temp_dir = config.obfuscator.temp_dir.clone();
    if let Err(e) = sweep(&temp_dir, TEMP_MAX_AGE).await {
        tracing::warn!(dir = %temp_dir.display(), "temp sweep failed: {e}");
    }
    let locks = state.locks.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = sweep(&temp_dir, TEMP_MAX_AGE).await {
                tracing::warn!(dir = %temp_dir.display(), "temp sweep failed: {e}");
            }
            let pruned = locks.prune();
            if pruned > 0 {
                tracing::debug!(pruned, "pruned idle transaction locks");
            }
        }
    });

    let app = seisen_api::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Seisen Hub API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
