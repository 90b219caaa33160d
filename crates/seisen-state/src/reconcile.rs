//! # Entitlement Reconciliation
//!
//! Decides what to do when a user claims a license for an inventory-backed
//! purchase. The inputs are the stored record (if any), a fresh observation
//! from the ownership source, the tier policy, and the current instant.
//!
//! ## Decision order
//!
//! 1. No record → [`Outcome::IssueNew`].
//! 2. The observed item was created more than [`GRACE_MINUTES`] after the record's
//!    `updated_at`, or both signals are present and differ →
//!    [`Outcome::Renew`]. Timestamp evidence wins even when the signal is
//!    unchanged, since the source may cache or reuse signals.
//! 3. Otherwise the validity window decides: Lifetime and `now < expiry`
//!    are [`Outcome::ReturnActive`], anything else is
//!    [`Outcome::RejectExpired`].
//!
//! Mere expiry never renews. The user has to delete and rebuy the item so
//! that a new observation appears.
//!
//! ## Per-transaction state
//!
//! ```text
//!   Unclaimed ──IssueNew──▶ Active ──(time)──▶ Expired
//!                            ▲  │                 │
//!                            │  └─ReturnActive─┘  │
//!                            └──────Renew─────────┘
//! ```
//!
//! [`EntitlementState::of`] evaluates that state as a predicate.

use chrono::Duration;
use seisen_core::{Tier, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entitlement::{EntitlementRecord, OwnershipObservation};
use crate::policy::TierValidityPolicy;

/// Tolerance, in minutes, between writing a record and the ownership
/// source reporting the item that caused the write.
pub const GRACE_MINUTES: i64 = 5;

/// [`GRACE_MINUTES`] as a duration.
pub fn grace() -> Duration {
    Duration::minutes(GRACE_MINUTES)
}

// ─── Errors ─────────────────────────────────────────────────────────

/// Failure taxonomy for a reconciliation request.
///
/// Only [`ReconcileError::InvalidPolicy`] can come out of [`decide`]. The
/// other two are raised by the I/O around it and share this enum so the
/// HTTP layer maps one type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// The record's tier has no policy entry. Data corruption; never
    /// defaulted.
    #[error("no validity policy entry for tier {tier}")]
    InvalidPolicy {
        /// The tier that had no entry.
        tier: Tier,
    },

    /// The ownership lookup failed. `reason` is shown to the user.
    #[error("{reason}")]
    OwnershipUnavailable {
        /// User-actionable explanation.
        reason: String,
    },

    /// License issuance failed after a mutating decision. The stored
    /// record was left unchanged.
    #[error("license issuance failed: {reason}")]
    IssuanceFailure {
        /// Diagnostic for logs.
        reason: String,
    },
}

// ─── Outcome ────────────────────────────────────────────────────────

/// Result of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// First claim for this transaction.
    IssueNew,
    /// The item was rebought. Start a new period at `now`.
    Renew,
    /// The existing keys are still valid.
    ReturnActive {
        /// End of the window. `None` for unlimited tiers.
        expiry: Option<Timestamp>,
        /// `expiry - now`. `None` for unlimited tiers.
        time_remaining: Option<Duration>,
    },
    /// Same item, window elapsed.
    RejectExpired {
        /// When the window closed.
        expired_at: Timestamp,
    },
}

/// Fieldless view of [`Outcome`], for logging and metrics labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// See [`Outcome::IssueNew`].
    IssueNew,
    /// See [`Outcome::Renew`].
    Renew,
    /// See [`Outcome::ReturnActive`].
    ReturnActive,
    /// See [`Outcome::RejectExpired`].
    RejectExpired,
}

impl OutcomeKind {
    /// Snake-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::IssueNew => "issue_new",
            OutcomeKind::Renew => "renew",
            OutcomeKind::ReturnActive => "return_active",
            OutcomeKind::RejectExpired => "reject_expired",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Outcome {
    /// The variant without its payload.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::IssueNew => OutcomeKind::IssueNew,
            Outcome::Renew => OutcomeKind::Renew,
            Outcome::ReturnActive { .. } => OutcomeKind::ReturnActive,
            Outcome::RejectExpired { .. } => OutcomeKind::RejectExpired,
        }
    }

    /// Whether acting on this outcome writes the store and calls the issuer.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Outcome::IssueNew | Outcome::Renew)
    }
}

// ─── Decision ───────────────────────────────────────────────────────

/// Decide the next licensing action. Pure and deterministic.
pub fn decide(
    existing: Option<&EntitlementRecord>,
    observation: &OwnershipObservation,
    policy: &TierValidityPolicy,
    now: Timestamp,
) -> Result<Outcome, ReconcileError> {
    let Some(record) = existing else {
        return Ok(Outcome::IssueNew);
    };

    let observed_created = observation.observed_created.unwrap_or_else(Timestamp::epoch);
    let is_newer_purchase = observed_created > record.updated_at.plus(grace());

    let is_signal_changed = match (&observation.observed_signal, &record.ownership_signal) {
        (Some(observed), Some(stored)) => observed != stored,
        _ => false,
    };

    if is_newer_purchase || is_signal_changed {
        return Ok(Outcome::Renew);
    }

    let hours = policy.validity_hours(record.tier)?;
    if hours == 0 {
        return Ok(Outcome::ReturnActive {
            expiry: None,
            time_remaining: None,
        });
    }

    let expiry = record.updated_at.plus_hours(hours);
    if now < expiry {
        Ok(Outcome::ReturnActive {
            expiry: Some(expiry),
            time_remaining: Some(expiry.since(&now)),
        })
    } else {
        Ok(Outcome::RejectExpired { expired_at: expiry })
    }
}

// ─── State predicate ────────────────────────────────────────────────

/// Conceptual state of one transaction at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntitlementState {
    /// No record yet.
    Unclaimed,
    /// Inside the validity window, or unlimited.
    Active,
    /// Window elapsed. Only a renewal leaves this state.
    Expired,
}

impl EntitlementState {
    /// Evaluate the state of `existing` at `now`, ignoring any observation.
    pub fn of(
        existing: Option<&EntitlementRecord>,
        policy: &TierValidityPolicy,
        now: Timestamp,
    ) -> Result<Self, ReconcileError> {
        let Some(record) = existing else {
            return Ok(EntitlementState::Unclaimed);
        };
        let hours = policy.validity_hours(record.tier)?;
        if hours == 0 || now < record.updated_at.plus_hours(hours) {
            Ok(EntitlementState::Active)
        } else {
            Ok(EntitlementState::Expired)
        }
    }
}

impl std::fmt::Display for EntitlementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntitlementState::Unclaimed => write!(f, "UNCLAIMED"),
            EntitlementState::Active => write!(f, "ACTIVE"),
            EntitlementState::Expired => write!(f, "EXPIRED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use seisen_core::TransactionId;

    fn now() -> Timestamp {
        Timestamp::parse("2026-06-01T12:00:00Z").unwrap()
    }

    fn hours_ago(h: i64) -> Timestamp {
        now().plus(Duration::hours(-h))
    }

    fn record(tier: Tier, updated_at: Timestamp, signal: Option<&str>) -> EntitlementRecord {
        EntitlementRecord {
            transaction_id: TransactionId::roblox(7, 16906166414),
            tier,
            ownership_signal: signal.map(str::to_string),
            created_at: updated_at,
            updated_at,
            license_keys: vec!["SEISEN-KEY".into()],
        }
    }

    /// Observation of the same item the record was issued for.
    fn same_item(r: &EntitlementRecord) -> OwnershipObservation {
        OwnershipObservation {
            observed_signal: r.ownership_signal.clone(),
            observed_created: Some(r.created_at.plus(Duration::minutes(-30))),
        }
    }

    // ── Decisions ──────────────────────────────────────────────────

    #[test]
    fn test_absent_record_issues_new() {
        let obs = OwnershipObservation::new("uaid-1", now());
        let out = decide(None, &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out, Outcome::IssueNew);
    }

    #[test]
    fn test_weekly_inside_window_returns_active() {
        let r = record(Tier::Weekly, hours_ago(100), Some("uaid-1"));
        let out = decide(Some(&r), &same_item(&r), &TierValidityPolicy::standard(), now()).unwrap();
        match out {
            Outcome::ReturnActive {
                expiry: Some(expiry),
                time_remaining: Some(left),
            } => {
                assert_eq!(left, Duration::hours(68));
                assert_eq!(expiry, r.updated_at.plus_hours(168));
            }
            other => panic!("expected ReturnActive, got {other:?}"),
        }
    }

    #[test]
    fn test_weekly_past_window_rejects() {
        let r = record(Tier::Weekly, hours_ago(200), Some("uaid-1"));
        let out = decide(Some(&r), &same_item(&r), &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(
            out,
            Outcome::RejectExpired {
                expired_at: r.updated_at.plus_hours(168)
            }
        );
    }

    #[test]
    fn test_signal_change_renews_inside_window() {
        let r = record(Tier::Monthly, hours_ago(10), Some("uaid-1"));
        let obs = OwnershipObservation {
            observed_signal: Some("uaid-2".into()),
            observed_created: Some(r.updated_at.plus(Duration::minutes(-1))),
        };
        let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out, Outcome::Renew);
    }

    #[test]
    fn test_lifetime_never_expires() {
        let r = record(Tier::Lifetime, hours_ago(100_000), Some("uaid-1"));
        let out = decide(Some(&r), &same_item(&r), &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(
            out,
            Outcome::ReturnActive {
                expiry: None,
                time_remaining: None
            }
        );
    }

    // ── Edges ──────────────────────────────────────────────────────

    #[test]
    fn test_newer_creation_with_same_signal_renews() {
        let r = record(Tier::Weekly, hours_ago(200), Some("uaid-1"));
        let obs = OwnershipObservation::new("uaid-1", hours_ago(1));
        let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out, Outcome::Renew);
    }

    #[test]
    fn test_creation_inside_grace_is_not_newer() {
        let r = record(Tier::Weekly, hours_ago(200), Some("uaid-1"));
        let obs = OwnershipObservation::new("uaid-1", r.updated_at.plus(grace()));
        let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out.kind(), OutcomeKind::RejectExpired);
    }

    #[test]
    fn test_creation_just_past_grace_is_newer() {
        let r = record(Tier::Weekly, hours_ago(200), Some("uaid-1"));
        let just_past = r.updated_at.plus(grace() + Duration::milliseconds(1));
        let obs = OwnershipObservation::new("uaid-1", just_past);
        let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out, Outcome::Renew);
    }

    #[test]
    fn test_unset_creation_treated_as_epoch() {
        let r = record(Tier::Weekly, hours_ago(1), Some("uaid-1"));
        let obs = OwnershipObservation {
            observed_signal: Some("uaid-1".into()),
            observed_created: None,
        };
        let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out.kind(), OutcomeKind::ReturnActive);
    }

    #[test]
    fn test_missing_signal_on_either_side_is_not_a_change() {
        let r = record(Tier::Weekly, hours_ago(200), None);
        let obs = OwnershipObservation {
            observed_signal: Some("uaid-9".into()),
            observed_created: None,
        };
        let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out.kind(), OutcomeKind::RejectExpired);

        let r = record(Tier::Weekly, hours_ago(200), Some("uaid-1"));
        let out = decide(
            Some(&r),
            &OwnershipObservation::default(),
            &TierValidityPolicy::standard(),
            now(),
        )
        .unwrap();
        assert_eq!(out.kind(), OutcomeKind::RejectExpired);
    }

    #[test]
    fn test_exact_expiry_instant_is_expired() {
        let r = record(Tier::Weekly, hours_ago(168), Some("uaid-1"));
        let out = decide(Some(&r), &same_item(&r), &TierValidityPolicy::standard(), now()).unwrap();
        assert_eq!(out.kind(), OutcomeKind::RejectExpired);
    }

    #[test]
    fn test_missing_policy_entry_errors() {
        let r = record(Tier::Monthly, hours_ago(1), Some("uaid-1"));
        let policy = TierValidityPolicy::from_entries([(Tier::Weekly, 168)]);
        let err = decide(Some(&r), &same_item(&r), &policy, now()).unwrap_err();
        assert_eq!(err, ReconcileError::InvalidPolicy { tier: Tier::Monthly });
    }

    #[test]
    fn test_renew_does_not_consult_policy() {
        let r = record(Tier::Monthly, hours_ago(1), Some("uaid-1"));
        let policy = TierValidityPolicy::from_entries([]);
        let obs = OwnershipObservation::new("uaid-2", hours_ago(2));
        assert_eq!(decide(Some(&r), &obs, &policy, now()).unwrap(), Outcome::Renew);
    }

    #[test]
    fn test_outcome_kind_names() {
        assert_eq!(Outcome::IssueNew.kind().as_str(), "issue_new");
        assert!(Outcome::Renew.is_mutating());
        assert!(!Outcome::RejectExpired { expired_at: now() }.is_mutating());
    }

    #[test]
    fn test_state_predicate() {
        let policy = TierValidityPolicy::standard();
        assert_eq!(
            EntitlementState::of(None, &policy, now()).unwrap(),
            EntitlementState::Unclaimed
        );
        let active = record(Tier::Weekly, hours_ago(10), None);
        assert_eq!(
            EntitlementState::of(Some(&active), &policy, now()).unwrap(),
            EntitlementState::Active
        );
        let expired = record(Tier::Weekly, hours_ago(500), None);
        assert_eq!(
            EntitlementState::of(Some(&expired), &policy, now()).unwrap(),
            EntitlementState::Expired
        );
        assert_eq!(EntitlementState::Expired.to_string(), "EXPIRED");
    }

    // ── Properties ─────────────────────────────────────────────────

    fn arb_tier() -> impl Strategy<Value = Tier> {
        prop_oneof![Just(Tier::Weekly), Just(Tier::Monthly), Just(Tier::Lifetime)]
    }

    fn arb_signal() -> impl Strategy<Value = Option<String>> {
        proptest::option::of("[a-z0-9]{1,6}")
    }

    fn arb_instant() -> impl Strategy<Value = Timestamp> {
        (0i64..4_000_000_000_000).prop_map(Timestamp::from_millis)
    }

    proptest! {
        #[test]
        fn absent_record_always_issues_new(
            signal in arb_signal(),
            created in proptest::option::of(arb_instant()),
            at in arb_instant(),
        ) {
            let obs = OwnershipObservation { observed_signal: signal, observed_created: created };
            let out = decide(None, &obs, &TierValidityPolicy::standard(), at).unwrap();
            prop_assert_eq!(out, Outcome::IssueNew);
        }

        #[test]
        fn lifetime_never_rejects(
            updated in arb_instant(),
            stored in arb_signal(),
            observed in arb_signal(),
            created in proptest::option::of(arb_instant()),
            at in arb_instant(),
        ) {
            let mut r = record(Tier::Lifetime, updated, None);
            r.ownership_signal = stored;
            let obs = OwnershipObservation { observed_signal: observed, observed_created: created };
            let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), at).unwrap();
            prop_assert_ne!(out.kind(), OutcomeKind::RejectExpired);
        }

        #[test]
        fn decide_is_idempotent(
            tier in arb_tier(),
            updated in arb_instant(),
            stored in arb_signal(),
            observed in arb_signal(),
            created in proptest::option::of(arb_instant()),
            at in arb_instant(),
        ) {
            let mut r = record(tier, updated, None);
            r.ownership_signal = stored;
            let obs = OwnershipObservation { observed_signal: observed, observed_created: created };
            let policy = TierValidityPolicy::standard();
            prop_assert_eq!(
                decide(Some(&r), &obs, &policy, at),
                decide(Some(&r), &obs, &policy, at)
            );
        }

        #[test]
        fn expiry_has_single_crossing_point(
            tier in prop_oneof![Just(Tier::Weekly), Just(Tier::Monthly)],
            updated in 1_000_000_000_000i64..2_000_000_000_000,
            offset_ms in -2_000_000_000i64..4_000_000_000,
        ) {
            let r = record(tier, Timestamp::from_millis(updated), Some("same"));
            let obs = same_item(&r);
            let policy = TierValidityPolicy::standard();
            let crossing = r.updated_at.plus_hours(policy.validity_hours(tier).unwrap());
            let at = crossing.plus(Duration::milliseconds(offset_ms));
            let kind = decide(Some(&r), &obs, &policy, at).unwrap().kind();
            if at < crossing {
                prop_assert_eq!(kind, OutcomeKind::ReturnActive);
            } else {
                prop_assert_eq!(kind, OutcomeKind::RejectExpired);
            }
        }

        #[test]
        fn changed_signal_beats_active_window(
            tier in arb_tier(),
            hours_in in 0i64..160,
        ) {
            let r = record(tier, hours_ago(hours_in), Some("before"));
            let obs = OwnershipObservation {
                observed_signal: Some("after".into()),
                observed_created: None,
            };
            let out = decide(Some(&r), &obs, &TierValidityPolicy::standard(), now()).unwrap();
            prop_assert_eq!(out, Outcome::Renew);
        }
    }
}
