#![deny(missing_docs)]

//! # seisen-core: Foundational Types for the Seisen Hub Backend
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** A [`TransactionId`] cannot be
//!    passed where a [`TicketNumber`] is expected.
//!
//! 2. **One [`Tier`] enum.** Pricing, validity policy, and wire strings all
//!    hang off the same three variants, matched exhaustively.
//!
//! 3. **Time is a value.** [`Timestamp`] is `Copy` and carries its own
//!    arithmetic. Business logic receives "now" as an argument instead of
//!    reading the clock.
//!
//! 4. **[`CoreError`] hierarchy.** Structured errors with `thiserror`, no
//!    `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod temporal;
pub mod tier;

pub use error::CoreError;
pub use identity::{to_base36, TicketNumber, TransactionId};
pub use temporal::Timestamp;
pub use tier::{Tier, PRICE_CURRENCY, ROBUX_CURRENCY};
