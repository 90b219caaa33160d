//! # Temp Subcommand
//!
//! `sweep` removes obfuscator work files older than the cutoff, the same
//! sweep the server runs every five minutes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use seisen_api::obfuscator::{sweep, TEMP_MAX_AGE};

use crate::block_on;

/// Arguments for the `seisen temp` subcommand.
#[derive(Args, Debug)]
pub struct TempArgs {
    #[command(subcommand)]
    pub command: TempCommand,
}

#[derive(Subcommand, Debug)]
pub enum TempCommand {
    /// Delete stale files from the obfuscator temp directory.
    Sweep {
        /// Directory to sweep. Defaults to the configured `TEMP_DIR`.
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Files at least this old are removed.
        #[arg(long, default_value_t = TEMP_MAX_AGE.as_secs())]
        max_age_secs: u64,
    },
}

pub fn run_temp(args: &TempArgs, default_dir: &Path) -> Result<u8> {
    match &args.command {
        TempCommand::Sweep { dir, max_age_secs } => {
            let dir = dir.as_deref().unwrap_or(default_dir);
            let removed = block_on(sweep(dir, Duration::from_secs(*max_age_secs)))?
                .with_context(|| format!("failed to sweep {}", dir.display()))?;
            println!("Removed {removed} file(s) from {}", dir.display());
            Ok(0)
        }
    }
}
