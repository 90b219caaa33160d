//! # Error Hierarchy
//!
//! Validation failures for the foundational types. Higher layers wrap these
//! in their own `thiserror` enums.

use thiserror::Error;

/// Errors raised while constructing or parsing core types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The tier string is not one of `weekly`, `monthly`, `lifetime`.
    #[error("unknown tier \"{0}\"; expected weekly, monthly, or lifetime")]
    UnknownTier(String),

    /// A transaction identifier was empty or whitespace.
    #[error("transaction id must not be empty")]
    EmptyTransactionId,

    /// A ticket number did not have the `TKT-` shape.
    #[error("invalid ticket number \"{0}\"")]
    InvalidTicketNumber(String),

    /// A timestamp string could not be parsed as RFC 3339.
    #[error("invalid timestamp \"{value}\": {reason}")]
    InvalidTimestamp {
        /// The rejected input.
        value: String,
        /// Parser diagnostic.
        reason: String,
    },
}
