//! Per-IP visit counters for the landing page.

use seisen_core::Timestamp;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::json_store::JsonStore;

/// Visits from one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    pub ip: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub first_visit: Timestamp,
    pub last_visit: Timestamp,
    pub visit_count: u64,
}

/// Aggregate returned by the stats endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorSummary {
    pub total_visits: u64,
    pub unique_visitors: usize,
    /// Most frequent visitors first.
    pub visitors: Vec<VisitorRecord>,
}

/// Visitor counters keyed by IP address.
#[derive(Debug, Clone)]
pub struct VisitorStats {
    docs: JsonStore<VisitorRecord>,
}

impl VisitorStats {
    /// Wrap an opened document store.
    pub fn new(docs: JsonStore<VisitorRecord>) -> Self {
        Self { docs }
    }

    /// In-memory counters.
    pub fn in_memory() -> Self {
        Self::new(JsonStore::in_memory())
    }

    /// Count one visit from `ip`.
    pub fn record_visit(
        &self,
        ip: &str,
        user_agent: Option<&str>,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        let fresh = VisitorRecord {
            ip: ip.to_string(),
            user_agent: user_agent.map(str::to_string),
            first_visit: now,
            last_visit: now,
            visit_count: 1,
        };
        let bumped = self.docs.update(ip, |v| {
            v.visit_count += 1;
            v.last_visit = now;
            if let Some(ua) = user_agent {
                v.user_agent = Some(ua.to_string());
            }
        })?;
        if bumped.is_none() {
            // Lost a race with a concurrent first visit; count it on the winner.
            match self.docs.insert_new(ip, fresh) {
                Err(StoreError::Conflict { .. }) => {
                    self.docs.update(ip, |v| {
                        v.visit_count += 1;
                        v.last_visit = now;
                    })?;
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Totals and per-IP breakdown.
    pub fn summary(&self) -> VisitorSummary {
        let mut visitors = self.docs.values();
        visitors.sort_by(|a, b| b.visit_count.cmp(&a.visit_count).then(a.ip.cmp(&b.ip)));
        VisitorSummary {
            total_visits: visitors.iter().map(|v| v.visit_count).sum(),
            unique_visitors: visitors.len(),
            visitors,
        }
    }
}
