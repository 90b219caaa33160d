//! # License Tiers
//!
//! The three plans sold by the shop. The wire form is lowercase
//! (`"weekly"`), the display label is capitalized (`"Weekly"`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Currency for PayPal prices.
pub const PRICE_CURRENCY: &str = "EUR";

/// Currency marker on payments settled through the Roblox marketplace.
/// These rows carry no fiat revenue.
pub const ROBUX_CURRENCY: &str = "ROBUX";

/// A license plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Seven-day license.
    Weekly,
    /// Thirty-day license.
    Monthly,
    /// License that never expires.
    Lifetime,
}

impl Tier {
    /// Every tier, in price order.
    pub const ALL: [Tier; 3] = [Tier::Weekly, Tier::Monthly, Tier::Lifetime];

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Weekly => "weekly",
            Tier::Monthly => "monthly",
            Tier::Lifetime => "lifetime",
        }
    }

    /// Capitalized label used in order descriptions and notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Weekly => "Weekly",
            Tier::Monthly => "Monthly",
            Tier::Lifetime => "Lifetime",
        }
    }

    /// Price in euro cents.
    pub fn price_cents(&self) -> u32 {
        match self {
            Tier::Weekly => 300,
            Tier::Monthly => 500,
            Tier::Lifetime => 1000,
        }
    }

    /// Price as a two-decimal string (`"5.00"`), the format PayPal expects.
    pub fn price_string(&self) -> String {
        let cents = self.price_cents();
        format!("{}.{:02}", cents / 100, cents % 100)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(Tier::Weekly),
            "monthly" => Ok(Tier::Monthly),
            "lifetime" => Ok(Tier::Lifetime),
            _ => Err(CoreError::UnknownTier(s.to_string())),
        }
    }
}
