//! # Entitlement Store
//!
//! Durable map from [`TransactionId`] to [`EntitlementRecord`]. The trait
//! is the seam the reconciliation service depends on; [`JsonEntitlementStore`]
//! is the production implementation.

use async_trait::async_trait;
use seisen_core::{Timestamp, TransactionId};
use seisen_state::EntitlementRecord;

use crate::error::StoreError;
use crate::json_store::JsonStore;

/// Storage contract for entitlement records.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Record for `id`, if claimed.
    async fn get(&self, id: &TransactionId) -> Result<Option<EntitlementRecord>, StoreError>;

    /// Create or replace. Callers serialize writes per key.
    async fn put(&self, record: EntitlementRecord) -> Result<(), StoreError>;

    /// Create or replace only if the stored `updated_at` still equals
    /// `expected_updated_at` (`None` meaning "no record yet"). Fails with
    /// [`StoreError::Conflict`] otherwise.
    async fn put_if_unchanged(
        &self,
        record: EntitlementRecord,
        expected_updated_at: Option<Timestamp>,
    ) -> Result<(), StoreError>;

    /// Every record.
    async fn list(&self) -> Result<Vec<EntitlementRecord>, StoreError>;
}

/// [`EntitlementStore`] over a [`JsonStore`].
#[derive(Debug, Clone)]
pub struct JsonEntitlementStore {
    docs: JsonStore<EntitlementRecord>,
}

impl JsonEntitlementStore {
    /// Wrap an opened document store.
    pub fn new(docs: JsonStore<EntitlementRecord>) -> Self {
        Self { docs }
    }

    /// In-memory store for tests and ephemeral deployments.
    pub fn in_memory() -> Self {
        Self::new(JsonStore::in_memory())
    }
}

#[async_trait]
impl EntitlementStore for JsonEntitlementStore {
    async fn get(&self, id: &TransactionId) -> Result<Option<EntitlementRecord>, StoreError> {
        Ok(self.docs.get(id.as_str()))
    }

    async fn put(&self, record: EntitlementRecord) -> Result<(), StoreError> {
        let key = record.transaction_id.as_str().to_string();
        self.docs.upsert(key, record)?;
        Ok(())
    }

    async fn put_if_unchanged(
        &self,
        record: EntitlementRecord,
        expected_updated_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        let key = record.transaction_id.as_str().to_string();
        let swapped = self.docs.compare_and_swap(
            &key,
            |current| current.map(|r| r.updated_at) == expected_updated_at,
            record,
        )?;
        if swapped {
            Ok(())
        } else {
            Err(StoreError::Conflict {
                key,
                reason: match expected_updated_at {
                    Some(ts) => format!("record changed since {ts}"),
                    None => "record was created concurrently".to_string(),
                },
            })
        }
    }

    async fn list(&self) -> Result<Vec<EntitlementRecord>, StoreError> {
        let mut all = self.docs.values();
        all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(all)
    }
}
