//! # Support Ticket Status
//!
//! ```text
//!   open ──staff reply──▶ in_progress
//!    ▲
//!    └──customer reply── closed
//! ```
//!
//! Replies move the status implicitly: a customer reply reopens a closed
//! ticket, a staff reply picks up an open one. Staff can also set any
//! status directly, so there is no forbidden move.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ticket status errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    /// Not one of `open`, `in_progress`, `closed`.
    #[error("invalid status \"{0}\"; expected open, in_progress, or closed")]
    UnknownStatus(String),
}

/// Lifecycle status of a support ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Waiting for staff.
    #[default]
    Open,
    /// Staff has responded.
    InProgress,
    /// Resolved.
    Closed,
}

impl TicketStatus {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Closed => "closed",
        }
    }

    /// Status after the customer replies.
    pub fn after_customer_reply(self) -> TicketStatus {
        match self {
            TicketStatus::Closed => TicketStatus::Open,
            other => other,
        }
    }

    /// Status after staff replies.
    pub fn after_staff_reply(self) -> TicketStatus {
        match self {
            TicketStatus::Open => TicketStatus::InProgress,
            other => other,
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = TicketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(TicketError::UnknownStatus(other.to_string())),
        }
    }
}
