//! # seisen CLI Entry Point
//!
//! Parses arguments, opens the data stores, and dispatches to the
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use seisen_cli::entitlement::{run_entitlement, EntitlementArgs};
use seisen_cli::payments::{run_payments, PaymentsArgs};
use seisen_cli::temp::{run_temp, TempArgs};
use seisen_cli::tickets::{run_tickets, TicketsArgs};
use seisen_cli::{load_config, open_stores};

/// Seisen Hub operator CLI.
///
/// Works on the same data files as the API server.
#[derive(Parser, Debug)]
#[command(name = "seisen", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding the data files. Overrides `DATA_DIR` and the
    /// per-store path variables.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Payments ledger export and totals.
    Payments(PaymentsArgs),

    /// Inspect entitlements and dry-run reconciliation.
    Entitlement(EntitlementArgs),

    /// Obfuscator temp directory maintenance.
    Temp(TempArgs),

    /// Support tickets.
    Tickets(TicketsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.data_dir.as_deref());
    tracing::debug!(?config, "configuration resolved");

    let result = match &cli.command {
        Commands::Temp(args) => run_temp(args, &config.obfuscator.temp_dir),
        Commands::Payments(args) => open_stores(&config).and_then(|s| run_payments(args, &s)),
        Commands::Entitlement(args) => {
            open_stores(&config).and_then(|s| run_entitlement(args, &s))
        }
        Commands::Tickets(args) => open_stores(&config).and_then(|s| run_tickets(args, &s)),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_payments_export() {
        let cli = Cli::try_parse_from(["seisen", "payments", "export", "--out", "-"]).unwrap();
        assert!(matches!(cli.command, Commands::Payments(_)));
    }

    #[test]
    fn cli_parse_entitlement_decide() {
        let cli = Cli::try_parse_from([
            "seisen",
            "-vv",
            "entitlement",
            "decide",
            "ROBLOX_1_2",
            "--signal",
            "uaid-9",
            "--created",
            "2024-01-01T00:00:00Z",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Entitlement(_)));
    }

    #[test]
    fn cli_parse_global_data_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["seisen", "tickets", "list", "--data-dir", "/srv/data"])
            .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/srv/data")));
    }

    #[test]
    fn cli_decide_requires_signal() {
        assert!(Cli::try_parse_from(["seisen", "entitlement", "decide", "ROBLOX_1_2"]).is_err());
    }

    #[test]
    fn cli_temp_sweep_default_age() {
        let cli = Cli::try_parse_from(["seisen", "temp", "sweep"]).unwrap();
        match cli.command {
            Commands::Temp(TempArgs {
                command: seisen_cli::temp::TempCommand::Sweep { max_age_secs, dir },
            }) => {
                assert_eq!(max_age_secs, 300);
                assert!(dir.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
