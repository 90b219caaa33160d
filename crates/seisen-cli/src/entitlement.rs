//! # Entitlement Subcommand
//!
//! - `show`: print the stored record and its state now.
//! - `decide`: run the reconciliation decision against the stored record
//!   for a hypothetical observation. Nothing is written.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use seisen_api::state::Stores;
use seisen_core::{Timestamp, TransactionId};
use seisen_state::{decide, EntitlementState, Outcome, OwnershipObservation, TierValidityPolicy};

use crate::block_on;

/// Arguments for the `seisen entitlement` subcommand.
#[derive(Args, Debug)]
pub struct EntitlementArgs {
    #[command(subcommand)]
    pub command: EntitlementCommand,
}

#[derive(Subcommand, Debug)]
pub enum EntitlementCommand {
    /// Print a stored entitlement.
    Show {
        /// Transaction id, e.g. `ROBLOX_12345_16906166414`.
        transaction_id: String,
    },
    /// Dry-run a claim for a hypothetical observation.
    Decide {
        transaction_id: String,
        /// Observed ownership signal (the item instance id).
        #[arg(long)]
        signal: String,
        /// Observed item creation time, RFC 3339.
        #[arg(long)]
        created: String,
        /// Evaluation instant, RFC 3339. Defaults to now.
        #[arg(long)]
        now: Option<String>,
    },
}

pub fn run_entitlement(args: &EntitlementArgs, stores: &Stores) -> Result<u8> {
    match &args.command {
        EntitlementCommand::Show { transaction_id } => cmd_show(stores, transaction_id),
        EntitlementCommand::Decide {
            transaction_id,
            signal,
            created,
            now,
        } => cmd_decide(stores, transaction_id, signal, created, now.as_deref()),
    }
}

fn cmd_show(stores: &Stores, transaction_id: &str) -> Result<u8> {
    let id = TransactionId::new(transaction_id)?;
    let Some(record) = block_on(stores.entitlements.get(&id))?? else {
        eprintln!("No entitlement for {id}");
        return Ok(1);
    };
    let state = EntitlementState::of(Some(&record), &TierValidityPolicy::standard(), Timestamp::now())?;
    let out = json!({ "record": record, "state": state });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(0)
}

fn cmd_decide(
    stores: &Stores,
    transaction_id: &str,
    signal: &str,
    created: &str,
    now: Option<&str>,
) -> Result<u8> {
    let id = TransactionId::new(transaction_id)?;
    let created = Timestamp::parse(created).context("--created must be RFC 3339")?;
    let now = match now {
        Some(raw) => Timestamp::parse(raw).context("--now must be RFC 3339")?,
        None => Timestamp::now(),
    };
    let existing = block_on(stores.entitlements.get(&id))??;
    let observation = OwnershipObservation::new(signal, created);
    let outcome = decide(
        existing.as_ref(),
        &observation,
        &TierValidityPolicy::standard(),
        now,
    )?;
    println!("{}", describe(&outcome));
    Ok(0)
}

/// One-line summary of a decision.
pub fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::IssueNew => "issue_new: no record, keys would be issued".to_string(),
        Outcome::Renew => "renew: new purchase detected, keys would be reissued".to_string(),
        Outcome::ReturnActive { expiry: None, .. } => {
            "return_active: unlimited entitlement".to_string()
        }
        Outcome::ReturnActive {
            expiry: Some(expiry),
            time_remaining,
        } => format!(
            "return_active: valid until {} ({}h left)",
            expiry.to_rfc3339(),
            time_remaining.map_or(0, |d| d.num_hours())
        ),
        Outcome::RejectExpired { expired_at } => {
            format!("reject_expired: expired at {}", expired_at.to_rfc3339())
        }
    }
}
