//! # Payments Ledger
//!
//! One row per captured PayPal payment or claimed Roblox purchase. Rows
//! serialize in the snake_case shape the admin dashboard reads.
//!
//! Roblox rows mirror the entitlement store. They carry `ROBUX` as the
//! currency and a zero amount, and are excluded from revenue.

use seisen_core::{Tier, Timestamp, TransactionId, ROBUX_CURRENCY};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::json_store::JsonStore;

/// A ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub transaction_id: TransactionId,
    #[serde(default)]
    pub payer_email: Option<String>,
    #[serde(default)]
    pub payer_id: Option<String>,
    #[serde(default)]
    pub roblox_username: Option<String>,
    #[serde(default)]
    pub roblox_uaid: Option<String>,
    pub tier: Tier,
    pub amount: f64,
    pub currency: String,
    /// `completed`, `test_completed`, or the processor's capture status.
    pub payment_status: String,
    #[serde(default)]
    pub generated_keys: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentRecord {
    /// Whether this row came from the Roblox marketplace.
    pub fn is_roblox(&self) -> bool {
        self.currency == ROBUX_CURRENCY
    }
}

/// Fields supplied when recording a new payment.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPayment {
    pub transaction_id: TransactionId,
    pub payer_email: Option<String>,
    pub payer_id: Option<String>,
    pub roblox_username: Option<String>,
    pub roblox_uaid: Option<String>,
    pub tier: Tier,
    pub amount: f64,
    pub currency: String,
    pub status: String,
}

/// Dashboard aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStats {
    pub total_purchases: usize,
    pub paypal_purchases: usize,
    pub roblox_purchases: usize,
    /// Sum of non-Roblox amounts, rounded to cents.
    pub total_revenue: f64,
}

/// The payments ledger.
#[derive(Debug, Clone)]
pub struct PaymentLedger {
    docs: JsonStore<PaymentRecord>,
}

impl PaymentLedger {
    /// Wrap an opened document store.
    pub fn new(docs: JsonStore<PaymentRecord>) -> Self {
        Self { docs }
    }

    /// In-memory ledger.
    pub fn in_memory() -> Self {
        Self::new(JsonStore::in_memory())
    }

    /// Whether a row exists for `id`.
    pub fn exists(&self, id: &TransactionId) -> bool {
        self.docs.contains(id.as_str())
    }

    /// Row for `id`.
    pub fn get(&self, id: &TransactionId) -> Option<PaymentRecord> {
        self.docs.get(id.as_str())
    }

    /// Record a new payment with no keys yet. Fails with
    /// [`StoreError::Conflict`] if the id is already present.
    pub fn save(&self, payment: NewPayment, now: Timestamp) -> Result<PaymentRecord, StoreError> {
        let record = PaymentRecord {
            transaction_id: payment.transaction_id,
            payer_email: payment.payer_email,
            payer_id: payment.payer_id,
            roblox_username: payment.roblox_username,
            roblox_uaid: payment.roblox_uaid,
            tier: payment.tier,
            amount: payment.amount,
            currency: payment.currency,
            payment_status: payment.status,
            generated_keys: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.docs
            .insert_new(record.transaction_id.as_str(), record.clone())?;
        Ok(record)
    }

    /// Replace the keys on an existing row.
    pub fn update_keys(
        &self,
        id: &TransactionId,
        keys: Vec<String>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        self.docs
            .update(id.as_str(), |p| {
                p.generated_keys = keys;
                p.updated_at = now;
            })?
            .ok_or_else(|| StoreError::NotFound {
                kind: "payment",
                key: id.to_string(),
            })
    }

    /// Insert or refresh the ledger row for a Roblox entitlement. On
    /// renewal the row is re-anchored at `now` with the new signal.
    pub fn mirror_roblox(
        &self,
        payment: NewPayment,
        keys: Vec<String>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let key = payment.transaction_id.as_str().to_string();
        let updated = self.docs.update(&key, |p| {
            p.roblox_uaid = payment.roblox_uaid.clone();
            p.roblox_username = payment.roblox_username.clone();
            p.generated_keys = keys.clone();
            p.created_at = now;
            p.updated_at = now;
        })?;
        if updated.is_none() {
            let mut record = self.save(payment, now)?;
            record.generated_keys = keys;
            self.docs.upsert(key, record)?;
        }
        Ok(())
    }

    /// All rows, newest first.
    pub fn list(&self) -> Vec<PaymentRecord> {
        let mut all = self.docs.values();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// Aggregate counts and revenue.
    pub fn stats(&self) -> PaymentStats {
        let all = self.docs.values();
        let roblox = all.iter().filter(|p| p.is_roblox()).count();
        let revenue_cents: i64 = all
            .iter()
            .filter(|p| !p.is_roblox())
            .map(|p| (p.amount * 100.0).round() as i64)
            .sum();
        PaymentStats {
            total_purchases: all.len(),
            paypal_purchases: all.len() - roblox,
            roblox_purchases: roblox,
            total_revenue: revenue_cents as f64 / 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paypal(id: &str, tier: Tier, amount: f64) -> NewPayment {
        NewPayment {
            transaction_id: TransactionId::new(id).unwrap(),
            payer_email: Some("buyer@example.com".into()),
            payer_id: Some("PAYER1".into()),
            roblox_username: None,
            roblox_uaid: None,
            tier,
            amount,
            currency: "EUR".into(),
            status: "completed".into(),
        }
    }

    fn roblox(user: u64) -> NewPayment {
        NewPayment {
            transaction_id: TransactionId::roblox(user, 16906166414),
            payer_email: None,
            payer_id: Some(format!("ROBLOX_{user}")),
            roblox_username: Some("builderman".into()),
            roblox_uaid: Some("111".into()),
            tier: Tier::Lifetime,
            amount: 0.0,
            currency: ROBUX_CURRENCY.into(),
            status: "completed".into(),
        }
    }

    fn at(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_save_rejects_duplicate() {
        let ledger = PaymentLedger::in_memory();
        ledger
            .save(paypal("CAP-1", Tier::Weekly, 3.0), at("2026-01-01T00:00:00Z"))
            .unwrap();
        assert!(ledger.exists(&TransactionId::new("CAP-1").unwrap()));
        let err = ledger
            .save(paypal("CAP-1", Tier::Weekly, 3.0), at("2026-01-01T00:00:01Z"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn test_update_keys() {
        let ledger = PaymentLedger::in_memory();
        let id = TransactionId::new("CAP-2").unwrap();
        ledger
            .save(paypal("CAP-2", Tier::Monthly, 5.0), at("2026-01-01T00:00:00Z"))
            .unwrap();
        ledger
            .update_keys(&id, vec!["KEY-A".into()], at("2026-01-01T00:00:05Z"))
            .unwrap();
        let row = ledger.get(&id).unwrap();
        assert_eq!(row.generated_keys, vec!["KEY-A".to_string()]);
        assert_eq!(row.updated_at, at("2026-01-01T00:00:05Z"));
    }

    #[test]
    fn test_update_keys_missing_row() {
        let ledger = PaymentLedger::in_memory();
        let err = ledger
            .update_keys(&TransactionId::new("nope").unwrap(), vec![], Timestamp::now())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { kind: "payment", .. }));
    }

    #[test]
    fn test_stats_exclude_robux_revenue() {
        let ledger = PaymentLedger::in_memory();
        let t = at("2026-01-01T00:00:00Z");
        ledger.save(paypal("A", Tier::Weekly, 3.0), t).unwrap();
        ledger.save(paypal("B", Tier::Lifetime, 10.0), t).unwrap();
        ledger.save(paypal("C", Tier::Monthly, 5.1), t).unwrap();
        ledger.save(roblox(1), t).unwrap();
        let stats = ledger.stats();
        assert_eq!(stats.total_purchases, 4);
        assert_eq!(stats.paypal_purchases, 3);
        assert_eq!(stats.roblox_purchases, 1);
        assert!((stats.total_revenue - 18.1).abs() < 1e-9);
    }

    #[test]
    fn test_list_newest_first() {
        let ledger = PaymentLedger::in_memory();
        ledger
            .save(paypal("old", Tier::Weekly, 3.0), at("2026-01-01T00:00:00Z"))
            .unwrap();
        ledger
            .save(paypal("new", Tier::Weekly, 3.0), at("2026-02-01T00:00:00Z"))
            .unwrap();
        let ids: Vec<String> = ledger
            .list()
            .into_iter()
            .map(|p| p.transaction_id.to_string())
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_mirror_roblox_inserts_then_refreshes() {
        let ledger = PaymentLedger::in_memory();
        let id = TransactionId::roblox(5, 16906166414);
        ledger
            .mirror_roblox(roblox(5), vec!["K1".into()], at("2026-01-01T00:00:00Z"))
            .unwrap();
        let mut renewal = roblox(5);
        renewal.roblox_uaid = Some("222".into());
        ledger
            .mirror_roblox(renewal, vec!["K2".into()], at("2026-03-01T00:00:00Z"))
            .unwrap();
        let row = ledger.get(&id).unwrap();
        assert_eq!(row.roblox_uaid.as_deref(), Some("222"));
        assert_eq!(row.generated_keys, vec!["K2".to_string()]);
        assert_eq!(row.created_at, at("2026-03-01T00:00:00Z"));
        assert_eq!(ledger.list().len(), 1);
    }

    #[test]
    fn test_row_serializes_snake_case() {
        let ledger = PaymentLedger::in_memory();
        let row = ledger
            .save(paypal("S", Tier::Weekly, 3.0), at("2026-01-01T00:00:00Z"))
            .unwrap();
        let v = serde_json::to_value(&row).unwrap();
        assert_eq!(v["transaction_id"], "S");
        assert_eq!(v["payer_email"], "buyer@example.com");
        assert_eq!(v["generated_keys"], serde_json::json!([]));
        let stats = serde_json::to_value(ledger.stats()).unwrap();
        assert_eq!(stats["totalPurchases"], 1);
    }
}
