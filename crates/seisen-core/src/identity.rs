//! # Identifier Newtypes
//!
//! [`TransactionId`] keys both the payments ledger and the entitlement
//! store. PayPal supplies capture ids; Roblox ids are derived from the
//! `(user, product)` pair so that the same purchase always maps to the same
//! record.
//!
//! [`TicketNumber`] is the customer-facing support ticket handle,
//! `TKT-<base36 millis>-<4 random>`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::temporal::Timestamp;

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase base-36 rendering of an unsigned integer.
pub fn to_base36(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    digits.reverse();
    String::from_utf8_lossy(&digits).into_owned()
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Unique key of a payment or entitlement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap an externally supplied identifier. Surrounding whitespace is
    /// trimmed; empty input is rejected.
    pub fn new(value: impl Into<String>) -> Result<Self, CoreError> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyTransactionId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Deterministic id for a Roblox marketplace purchase.
    pub fn roblox(user_id: u64, product_id: u64) -> Self {
        Self(format!("ROBLOX_{user_id}_{product_id}"))
    }

    /// Borrow the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TicketNumber
// ---------------------------------------------------------------------------

/// Support ticket handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketNumber(String);

impl TicketNumber {
    /// Mint a fresh ticket number for `now`.
    pub fn generate<R: Rng + ?Sized>(now: Timestamp, rng: &mut R) -> Self {
        let millis = u64::try_from(now.as_millis()).unwrap_or(0);
        let suffix: String = (0..4)
            .map(|_| BASE36[rng.gen_range(0..36)] as char)
            .collect();
        Self(format!("TKT-{}-{}", to_base36(millis), suffix).to_uppercase())
    }

    /// Parse user input. Case is normalized; the `TKT-` prefix is required.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let normalized = value.trim().to_uppercase();
        let valid = normalized
            .strip_prefix("TKT-")
            .map(|rest| {
                !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            })
            .unwrap_or(false);
        if !valid {
            return Err(CoreError::InvalidTicketNumber(value.to_string()));
        }
        Ok(Self(normalized))
    }

    /// Borrow the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TicketNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_transaction_id_trims() {
        let id = TransactionId::new("  CAP-123 ").unwrap();
        assert_eq!(id.as_str(), "CAP-123");
    }

    #[test]
    fn test_transaction_id_rejects_blank() {
        assert_eq!(TransactionId::new("   "), Err(CoreError::EmptyTransactionId));
    }

    #[test]
    fn test_roblox_transaction_id_is_deterministic() {
        assert_eq!(
            TransactionId::roblox(42, 16906166414).as_str(),
            "ROBLOX_42_16906166414"
        );
        assert_eq!(TransactionId::roblox(1, 2), TransactionId::roblox(1, 2));
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn test_ticket_number_shape() {
        let mut rng = StepRng::new(0, 1);
        let now = Timestamp::from_millis(1_700_000_000_000);
        let n = TicketNumber::generate(now, &mut rng);
        let s = n.as_str();
        assert!(s.starts_with("TKT-"));
        assert_eq!(s, s.to_uppercase());
        let parts: Vec<&str> = s.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1], to_base36(1_700_000_000_000).to_uppercase());
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn test_ticket_number_parse_normalizes_case() {
        let n = TicketNumber::parse(" tkt-lx1-ab12 ").unwrap();
        assert_eq!(n.as_str(), "TKT-LX1-AB12");
    }

    #[test]
    fn test_ticket_number_parse_rejects_foreign() {
        assert!(TicketNumber::parse("ORDER-1").is_err());
        assert!(TicketNumber::parse("TKT-").is_err());
        assert!(TicketNumber::parse("TKT-../etc").is_err());
    }

    proptest! {
        #[test]
        fn generated_ticket_numbers_parse(millis in 0i64..4_000_000_000_000, seed in any::<u64>()) {
            let mut rng = StepRng::new(seed, 7);
            let n = TicketNumber::generate(Timestamp::from_millis(millis), &mut rng);
            prop_assert_eq!(TicketNumber::parse(n.as_str()).unwrap(), n);
        }
    }
}
