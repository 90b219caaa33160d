//! # seisen-store: Document Stores
//!
//! Persistence for the backend, built on one primitive: [`JsonStore`], a
//! concurrent string-keyed map that mirrors itself to a JSON snapshot.
//!
//! | Store | Key | Used by |
//! |---|---|---|
//! | [`JsonEntitlementStore`] | transaction id | Roblox purchase reconciliation |
//! | [`PaymentLedger`] | transaction id | PayPal capture, admin dashboard, CSV export |
//! | [`TicketStore`] | ticket number | support desk |
//! | [`VisitorStats`] | client IP | landing page counter |
//!
//! [`KeyedLocks`] provides the per-transaction async mutex that callers hold
//! across the outbound issuance call.

pub mod entitlements;
pub mod error;
pub mod json_store;
pub mod locks;
pub mod payments;
pub mod tickets;
pub mod visitors;

pub use entitlements::{EntitlementStore, JsonEntitlementStore};
pub use error::StoreError;
pub use json_store::{Document, JsonStore};
pub use locks::{KeyedGuard, KeyedLocks};
pub use payments::{NewPayment, PaymentLedger, PaymentRecord, PaymentStats};
pub use tickets::{AuthorType, NewTicket, ReplyRecord, TicketRecord, TicketStore, TicketThread};
pub use visitors::{VisitorRecord, VisitorStats, VisitorSummary};
