//! # Reconciliation Service
//!
//! Wraps [`seisen_state::decide`] with the I/O around a Roblox purchase
//! claim: the ownership lookup, the per-transaction write lock, license
//! issuance, and the conditional store write.
//!
//! ```text
//! observe ─▶ decide ──ReturnActive/RejectExpired──▶ result (no lock, no write)
//!               │
//!               └─IssueNew/Renew─▶ lock ─▶ re-decide ─▶ issue ─▶ put_if_unchanged ─▶ mirror
//! ```
//!
//! A failed issuance leaves the stored record untouched, so the next
//! claim re-enters the same decision.

use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use seisen_client::{
    Clock, IssueRequest, LicenseIssuer, OwnershipReport, OwnershipSource, PaymentRef,
    RobloxConfig, UserInfo,
};
use seisen_core::{Tier, Timestamp, TransactionId, ROBUX_CURRENCY};
use seisen_state::{
    decide, EntitlementRecord, Outcome, OutcomeKind, ReconcileError, TierValidityPolicy,
};
use seisen_store::{EntitlementStore, KeyedLocks, NewPayment, PaymentLedger, StoreError};

/// Failure of a claim.
#[derive(Debug, Error)]
pub enum ClaimError {
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the caller gets back from a claim.
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimResult {
    pub outcome: OutcomeKind,
    pub transaction_id: TransactionId,
    pub tier: Tier,
    /// Keys for the current period. Empty only for `RejectExpired`.
    pub keys: Vec<String>,
    /// End of the validity window. `None` for unlimited tiers.
    pub expiry: Option<Timestamp>,
    pub time_remaining: Option<Duration>,
    /// Set for `RejectExpired`.
    pub expired_at: Option<Timestamp>,
    pub user_id: u64,
    pub username: String,
}

/// Everything a claim needs, wired once at startup.
#[derive(Clone)]
pub struct ReconcileService {
    store: Arc<dyn EntitlementStore>,
    ledger: PaymentLedger,
    issuer: Option<Arc<dyn LicenseIssuer>>,
    ownership: Arc<dyn OwnershipSource>,
    catalog: RobloxConfig,
    policy: TierValidityPolicy,
    locks: KeyedLocks,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ReconcileService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileService")
            .field("issuer_configured", &self.issuer.is_some())
            .field("policy", &self.policy)
            .field("locks", &self.locks.len())
            .finish()
    }
}

impl ReconcileService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        ledger: PaymentLedger,
        issuer: Option<Arc<dyn LicenseIssuer>>,
        ownership: Arc<dyn OwnershipSource>,
        catalog: RobloxConfig,
        policy: TierValidityPolicy,
        locks: KeyedLocks,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            ledger,
            issuer,
            ownership,
            catalog,
            policy,
            locks,
            clock,
        }
    }

    pub fn policy(&self) -> &TierValidityPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<dyn EntitlementStore> {
        &self.store
    }

    /// Look up the buyer's inventory and reconcile the claim.
    ///
    /// `requested` selects a configured product for that tier; `None`
    /// uses the default product.
    pub async fn verify_purchase(
        &self,
        username: &str,
        requested: Option<Tier>,
    ) -> Result<ClaimResult, ClaimError> {
        let (product_id, tier) = self.catalog.resolve_product(requested).ok_or_else(|| {
            ReconcileError::OwnershipUnavailable {
                reason: "No Roblox item is sold for this tier".to_string(),
            }
        })?;

        let report = self
            .ownership
            .observe(username, product_id)
            .await
            .map_err(|err| {
                tracing::info!(username, product_id, error = ?err, "ownership not established");
                ReconcileError::OwnershipUnavailable {
                    reason: err.to_string(),
                }
            })?;

        self.reconcile(&report, tier).await
    }

    /// Reconcile an established ownership against the stored record.
    pub async fn reconcile(
        &self,
        report: &OwnershipReport,
        tier: Tier,
    ) -> Result<ClaimResult, ClaimError> {
        let id = report.transaction_id();

        let existing = self.store.get(&id).await?;
        let outcome = self.decide(existing.as_ref(), report)?;
        if !outcome.is_mutating() {
            return Ok(self.settled(outcome, existing, report, tier));
        }

        let _guard = self.locks.lock(id.as_str()).await;

        // Another claim may have written while we waited.
        let existing = self.store.get(&id).await?;
        let outcome = self.decide(existing.as_ref(), report)?;
        if !outcome.is_mutating() {
            return Ok(self.settled(outcome, existing, report, tier));
        }

        let tier = existing.as_ref().map_or(tier, |r| r.tier);
        let hours = self.policy.validity_hours(tier)?;
        let keys = self.issue(&id, tier, hours, report).await?;

        let now = self.clock.now();
        let signal = report.observation.observed_signal.clone();
        let record = match &existing {
            None => EntitlementRecord::issued(id.clone(), tier, signal.clone(), keys.clone(), now),
            Some(prev) => prev.renewed(signal.clone(), keys.clone(), now),
        };
        self.store
            .put_if_unchanged(record, existing.as_ref().map(|r| r.updated_at))
            .await?;

        let mirrored = self.ledger.mirror_roblox(
            NewPayment {
                transaction_id: id.clone(),
                payer_email: None,
                payer_id: None,
                roblox_username: Some(report.username.clone()),
                roblox_uaid: signal,
                tier,
                amount: 0.0,
                currency: ROBUX_CURRENCY.to_string(),
                status: "completed".to_string(),
            },
            keys.clone(),
            now,
        );
        if let Err(err) = mirrored {
            tracing::warn!(transaction_id = %id, error = %err, "ledger mirror failed");
        }

        let kind = outcome.kind();
        record_outcome(kind);
        metrics::counter!("seisen_keys_issued_total", "tier" => tier.as_str(), "source" => "roblox")
            .increment(keys.len() as u64);
        tracing::info!(transaction_id = %id, tier = %tier, outcome = %kind, "entitlement written");

        Ok(ClaimResult {
            outcome: kind,
            transaction_id: id,
            tier,
            keys,
            expiry: (hours > 0).then(|| now.plus_hours(hours)),
            time_remaining: (hours > 0).then(|| Duration::hours(i64::from(hours))),
            expired_at: None,
            user_id: report.user_id,
            username: report.username.clone(),
        })
    }

    fn decide(
        &self,
        existing: Option<&EntitlementRecord>,
        report: &OwnershipReport,
    ) -> Result<Outcome, ReconcileError> {
        decide(existing, &report.observation, &self.policy, self.clock.now()).map_err(|err| {
            tracing::error!(transaction_id = %report.transaction_id(), error = %err, "reconciliation policy error");
            err
        })
    }

    async fn issue(
        &self,
        id: &TransactionId,
        tier: Tier,
        validity_hours: u32,
        report: &OwnershipReport,
    ) -> Result<Vec<String>, ReconcileError> {
        let Some(issuer) = &self.issuer else {
            return Err(ReconcileError::IssuanceFailure {
                reason: "license issuer is not configured".to_string(),
            });
        };
        let request = IssueRequest {
            tier,
            validity_hours,
            quantity: 1,
            user_info: UserInfo {
                roblox_username: Some(report.username.clone()),
                ..UserInfo::default()
            },
            payment_info: PaymentRef {
                amount: 0.0,
                currency: ROBUX_CURRENCY.to_string(),
                transaction_id: id.to_string(),
            },
        };
        match issuer.issue(&request).await {
            Ok(issued) => Ok(issued.keys),
            Err(err) => {
                tracing::error!(transaction_id = %id, tier = %tier, error = %err, "license issuance failed");
                metrics::counter!("seisen_issuance_failures_total", "source" => "roblox").increment(1);
                Err(ReconcileError::IssuanceFailure {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Result for a non-mutating outcome.
    fn settled(
        &self,
        outcome: Outcome,
        existing: Option<EntitlementRecord>,
        report: &OwnershipReport,
        requested_tier: Tier,
    ) -> ClaimResult {
        let kind = outcome.kind();
        record_outcome(kind);
        let (tier, keys) = existing
            .map(|r| (r.tier, r.license_keys))
            .unwrap_or((requested_tier, Vec::new()));
        let mut result = ClaimResult {
            outcome: kind,
            transaction_id: report.transaction_id(),
            tier,
            keys,
            expiry: None,
            time_remaining: None,
            expired_at: None,
            user_id: report.user_id,
            username: report.username.clone(),
        };
        match outcome {
            Outcome::ReturnActive {
                expiry,
                time_remaining,
            } => {
                result.expiry = expiry;
                result.time_remaining = time_remaining;
            }
            Outcome::RejectExpired { expired_at } => {
                result.keys = Vec::new();
                result.expired_at = Some(expired_at);
            }
            Outcome::IssueNew | Outcome::Renew => {}
        }
        tracing::info!(transaction_id = %result.transaction_id, outcome = %kind, "claim settled without write");
        result
    }
}

fn record_outcome(kind: OutcomeKind) {
    metrics::counter!("seisen_reconcile_outcomes_total", "outcome" => kind.as_str()).increment(1);
}
