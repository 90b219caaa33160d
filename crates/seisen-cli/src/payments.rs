//! # Payments Subcommand
//!
//! - `export`: the admin dashboard CSV, to a file or stdout.
//! - `stats`: purchase counts and revenue as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use seisen_api::export::{export_filename, payments_csv};
use seisen_api::state::Stores;
use seisen_core::Timestamp;

/// Arguments for the `seisen payments` subcommand.
#[derive(Args, Debug)]
pub struct PaymentsArgs {
    #[command(subcommand)]
    pub command: PaymentsCommand,
}

#[derive(Subcommand, Debug)]
pub enum PaymentsCommand {
    /// Write the payments ledger as CSV.
    Export {
        /// Output file. `-` writes to stdout. Defaults to
        /// `seisen-payments-YYYY-MM-DD.csv` in the current directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print purchase totals.
    Stats,
}

pub fn run_payments(args: &PaymentsArgs, stores: &Stores) -> Result<u8> {
    match &args.command {
        PaymentsCommand::Export { out } => cmd_export(stores, out.as_deref()),
        PaymentsCommand::Stats => {
            let stats = stores.payments.stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(0)
        }
    }
}

fn cmd_export(stores: &Stores, out: Option<&std::path::Path>) -> Result<u8> {
    let payments = stores.payments.list();
    let csv = payments_csv(&payments);
    match out {
        Some(path) if path.as_os_str() == "-" => println!("{csv}"),
        _ => {
            let path = out
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(export_filename(Timestamp::now())));
            std::fs::write(&path, format!("{csv}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(rows = payments.len(), path = %path.display(), "payments exported");
            println!("Exported {} payments to {}", payments.len(), path.display());
        }
    }
    Ok(0)
}
