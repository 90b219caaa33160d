//! # seisen-cli: Operator Toolchain
//!
//! Subcommands work directly on the data files the server uses, located
//! the same way (`DATA_DIR` and the `*_DB_PATH` variables) unless
//! `--data-dir` is given.
//!
//! - `payments`: CSV export and totals.
//! - `entitlement`: inspect a record, dry-run a reconciliation decision.
//! - `temp`: remove stale obfuscator files.
//! - `tickets`: list support tickets.

pub mod entitlement;
pub mod payments;
pub mod temp;
pub mod tickets;

use std::path::Path;

use anyhow::{Context, Result};
use seisen_api::state::{AppConfig, Stores};

/// Server configuration, re-rooted at `data_dir` when one is given.
pub fn load_config(data_dir: Option<&Path>) -> AppConfig {
    match data_dir {
        Some(dir) => AppConfig::rooted_at(dir),
        None => AppConfig::from_env(),
    }
}

/// Open the server's stores read-write.
pub fn open_stores(config: &AppConfig) -> Result<Stores> {
    Stores::open(config).context("failed to open data stores")
}

/// Single-threaded runtime for the async store and filesystem calls.
pub(crate) fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}
