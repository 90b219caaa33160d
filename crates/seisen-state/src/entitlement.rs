//! # Entitlement Records
//!
//! The persisted claim state for one transaction, and the ephemeral
//! observation fetched from the ownership source on every request.

use seisen_core::{Tier, Timestamp, TransactionId};
use serde::{Deserialize, Serialize};

/// One claimed transaction.
///
/// Created once on the first successful claim and afterwards replaced
/// whole on renewal. `license_keys` is empty until the issuer has returned
/// keys; it is never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Store key.
    pub transaction_id: TransactionId,
    /// Plan the entitlement was issued under.
    pub tier: Tier,
    /// Opaque version marker from the ownership source, compared for
    /// equality only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership_signal: Option<String>,
    /// First claim, or the start of the current renewal period.
    pub created_at: Timestamp,
    /// Start of the current validity window.
    pub updated_at: Timestamp,
    /// Keys issued for the current period.
    #[serde(default)]
    pub license_keys: Vec<String>,
}

impl EntitlementRecord {
    /// A record for a claim that has just been issued at `now`.
    pub fn issued(
        transaction_id: TransactionId,
        tier: Tier,
        ownership_signal: Option<String>,
        license_keys: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            transaction_id,
            tier,
            ownership_signal,
            created_at: now,
            updated_at: now,
            license_keys,
        }
    }

    /// The record that replaces `self` after a successful renewal: new
    /// signal, new keys, and a validity window anchored at `now`.
    pub fn renewed(
        &self,
        ownership_signal: Option<String>,
        license_keys: Vec<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            transaction_id: self.transaction_id.clone(),
            tier: self.tier,
            ownership_signal: ownership_signal.or_else(|| self.ownership_signal.clone()),
            created_at: now,
            updated_at: now,
            license_keys,
        }
    }

    /// `updated_at >= created_at`.
    pub fn is_well_formed(&self) -> bool {
        self.updated_at >= self.created_at
    }
}

/// What the ownership source reports right now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipObservation {
    /// Current version marker of the owned item, if the source has one.
    #[serde(default)]
    pub observed_signal: Option<String>,
    /// When the source believes the owned item was created. `None` is read
    /// as the epoch.
    #[serde(default)]
    pub observed_created: Option<Timestamp>,
}

impl OwnershipObservation {
    /// Observation with both fields set.
    pub fn new(signal: impl Into<String>, created: Timestamp) -> Self {
        Self {
            observed_signal: Some(signal.into()),
            observed_created: Some(created),
        }
    }
}
