//! # seisen-state: Entitlement and Ticket State
//!
//! Pure state logic with no I/O:
//!
//! - [`reconcile`]: the decision function that compares a stored
//!   [`EntitlementRecord`] with a fresh [`OwnershipObservation`] and picks
//!   one of issue / renew / return-active / reject-expired.
//! - [`policy`]: the tier → validity-hours table.
//! - [`ticket`]: support ticket status and reply-driven moves.
//!
//! Callers own storage, locking, and the outbound issuance call.

pub mod entitlement;
pub mod policy;
pub mod reconcile;
pub mod ticket;

pub use entitlement::{EntitlementRecord, OwnershipObservation};
pub use policy::TierValidityPolicy;
pub use reconcile::{
    decide, grace, EntitlementState, Outcome, OutcomeKind, ReconcileError, GRACE_MINUTES,
};
pub use ticket::{TicketError, TicketStatus};
