//! # Tickets Subcommand
//!
//! `list` prints one line per ticket, newest first.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use seisen_api::state::Stores;
use seisen_state::TicketStatus;
use seisen_store::TicketRecord;

/// Arguments for the `seisen tickets` subcommand.
#[derive(Args, Debug)]
pub struct TicketsArgs {
    #[command(subcommand)]
    pub command: TicketsCommand,
}

#[derive(Subcommand, Debug)]
pub enum TicketsCommand {
    /// List tickets.
    List {
        /// Only tickets in this status: open, in_progress, closed.
        #[arg(long)]
        status: Option<String>,
    },
}

pub fn run_tickets(args: &TicketsArgs, stores: &Stores) -> Result<u8> {
    match &args.command {
        TicketsCommand::List { status } => {
            let status = status
                .as_deref()
                .map(str::parse::<TicketStatus>)
                .transpose()
                .context("unknown --status")?;
            let tickets = stores.tickets.list(status);
            for ticket in &tickets {
                println!("{}", format_row(ticket));
            }
            if tickets.is_empty() {
                eprintln!("No tickets");
            }
            Ok(0)
        }
    }
}

/// `number  status  created  category  subject <email>`
pub fn format_row(t: &TicketRecord) -> String {
    format!(
        "{:<20} {:<12} {} {:<10} {} <{}>",
        t.ticket_number.as_str(),
        t.status.as_str(),
        t.created_at.to_rfc3339(),
        t.category,
        t.subject,
        t.user_email
    )
}
