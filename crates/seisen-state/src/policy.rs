//! # Tier Validity Policy
//!
//! Static mapping from [`Tier`] to validity in hours. `0` means the license
//! never expires.

use std::collections::BTreeMap;

use seisen_core::Tier;
use serde::{Deserialize, Serialize};

use crate::reconcile::ReconcileError;

/// Validity window per tier.
///
/// [`TierValidityPolicy::standard`] covers every tier. A policy assembled
/// from a partial table is allowed to exist so that corrupted configuration
/// surfaces as [`ReconcileError::InvalidPolicy`] at lookup time instead of
/// being silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierValidityPolicy {
    hours: BTreeMap<Tier, u32>,
}

impl TierValidityPolicy {
    /// Weekly 168h, Monthly 720h, Lifetime unlimited.
    pub fn standard() -> Self {
        Self::from_entries([(Tier::Weekly, 168), (Tier::Monthly, 720), (Tier::Lifetime, 0)])
    }

    /// Build a policy from explicit entries. Later entries overwrite earlier
    /// ones for the same tier.
    pub fn from_entries(entries: impl IntoIterator<Item = (Tier, u32)>) -> Self {
        Self {
            hours: entries.into_iter().collect(),
        }
    }

    /// Validity hours for `tier`. `Ok(0)` means unlimited.
    pub fn validity_hours(&self, tier: Tier) -> Result<u32, ReconcileError> {
        self.hours
            .get(&tier)
            .copied()
            .ok_or(ReconcileError::InvalidPolicy { tier })
    }

    /// Whether every tier has an entry.
    pub fn is_complete(&self) -> bool {
        Tier::ALL.iter().all(|t| self.hours.contains_key(t))
    }
}

impl Default for TierValidityPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table() {
        let p = TierValidityPolicy::standard();
        assert_eq!(p.validity_hours(Tier::Weekly).unwrap(), 168);
        assert_eq!(p.validity_hours(Tier::Monthly).unwrap(), 720);
        assert_eq!(p.validity_hours(Tier::Lifetime).unwrap(), 0);
        assert!(p.is_complete());
    }

    #[test]
    fn test_missing_entry_is_invalid_policy() {
        let p = TierValidityPolicy::from_entries([(Tier::Weekly, 168)]);
        assert!(!p.is_complete());
        assert_eq!(
            p.validity_hours(Tier::Monthly),
            Err(ReconcileError::InvalidPolicy { tier: Tier::Monthly })
        );
    }

    #[test]
    fn test_later_entry_overrides() {
        let p = TierValidityPolicy::from_entries([(Tier::Weekly, 1), (Tier::Weekly, 2)]);
        assert_eq!(p.validity_hours(Tier::Weekly).unwrap(), 2);
    }
}
