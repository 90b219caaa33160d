//! # Temporal Types
//!
//! UTC-only timestamp type. All instants in the backend are UTC and
//! serialize as RFC 3339 with a `Z` suffix. Local-time rendering is a
//! presentation concern of the frontend.
//!
//! `Timestamp` is `Copy` so it can be threaded through pure decision
//! functions by value. Nothing in the business logic calls
//! [`Timestamp::now`]; only the outermost request handlers do.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC instant with millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self::from_millis(Utc::now().timestamp_millis())
    }

    /// The Unix epoch. Used as the stand-in for "unknown, assume old".
    pub fn epoch() -> Self {
        Self(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create a timestamp from Unix milliseconds. Out-of-range values clamp
    /// to the epoch.
    pub fn from_millis(millis: i64) -> Self {
        match Utc.timestamp_millis_opt(millis).single() {
            Some(dt) => Self(dt),
            None => Self::epoch(),
        }
    }

    /// Parse an RFC 3339 string. A bare `YYYY-MM-DDTHH:MM:SS` without offset
    /// is accepted and read as UTC.
    pub fn parse(value: &str) -> Result<Self, CoreError> {
        let trimmed = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(Self(dt.with_timezone(&Utc)));
        }
        chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self(naive.and_utc()))
            .map_err(|e| CoreError::InvalidTimestamp {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix milliseconds.
    pub fn as_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// This instant shifted forward by `duration`. Saturates instead of
    /// overflowing.
    pub fn plus(&self, duration: Duration) -> Self {
        self.0
            .checked_add_signed(duration)
            .map(Self)
            .unwrap_or(Self(DateTime::<Utc>::MAX_UTC))
    }

    /// This instant shifted forward by a whole number of hours.
    pub fn plus_hours(&self, hours: u32) -> Self {
        self.plus(Duration::hours(i64::from(hours)))
    }

    /// Signed duration from `earlier` to `self`.
    pub fn since(&self, earlier: &Timestamp) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }

    /// RFC 3339 with millisecond precision and `Z` suffix, as the frontend
    /// expects from `Date.prototype.toISOString`.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Calendar date in `YYYY-MM-DD` form.
    pub fn date_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
