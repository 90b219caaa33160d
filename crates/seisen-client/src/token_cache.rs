//! OAuth access-token cache.
//!
//! Tokens are treated as expired [`EXPIRY_MARGIN_SECS`] before the
//! upstream says they are, so a token is never presented in its last
//! few minutes of life.

use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use seisen_core::Timestamp;

/// Seconds shaved off every token lifetime.
pub const EXPIRY_MARGIN_SECS: i64 = 300;

/// Source of the current time. Injected so expiry can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    usable_until: Timestamp,
}

/// Single-slot token cache shared by all requests of one client.
pub struct TokenCache {
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("TokenCache")
            .field("cached", &slot.is_some())
            .field("usable_until", &slot.as_ref().map(|t| t.usable_until))
            .finish()
    }
}

impl TokenCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: Mutex::new(None),
        }
    }

    /// The cached token, if it is still usable.
    pub fn get(&self) -> Option<String> {
        let now = self.clock.now();
        let slot = self.slot.lock();
        slot.as_ref()
            .filter(|t| now < t.usable_until)
            .map(|t| t.token.clone())
    }

    /// Cache `token`, which the upstream says lives `expires_in_secs`.
    pub fn store(&self, token: String, expires_in_secs: i64) {
        let lifetime = (expires_in_secs - EXPIRY_MARGIN_SECS).max(0);
        let usable_until = self.clock.now().plus(Duration::seconds(lifetime));
        *self.slot.lock() = Some(CachedToken {
            token,
            usable_until,
        });
    }

    /// Drop the cached token, e.g. after the upstream rejected it.
    pub fn invalidate(&self) {
        *self.slot.lock() = None;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClock(Mutex<Timestamp>);

    impl FixedClock {
        fn advance(&self, secs: i64) {
            let mut now = self.0.lock();
            *now = now.plus(Duration::seconds(secs));
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            *self.0.lock()
        }
    }

    fn fixed() -> Arc<FixedClock> {
        Arc::new(FixedClock(Mutex::new(Timestamp::from_millis(1_700_000_000_000))))
    }

    #[test]
    fn empty_cache_returns_none() {
        assert!(TokenCache::default().get().is_none());
    }

    #[test]
    fn token_usable_until_margin() {
        let clock = fixed();
        let cache = TokenCache::new(clock.clone());
        cache.store("A21".into(), 32_400);

        clock.advance(32_400 - EXPIRY_MARGIN_SECS - 1);
        assert_eq!(cache.get().as_deref(), Some("A21"));

        clock.advance(1);
        assert!(cache.get().is_none());
    }

    #[test]
    fn short_lived_token_is_never_served() {
        let clock = fixed();
        let cache = TokenCache::new(clock);
        cache.store("tiny".into(), 120);
        assert!(cache.get().is_none());
    }

    #[test]
    fn invalidate_clears() {
        let cache = TokenCache::default();
        cache.store("tok".into(), 3600);
        assert!(cache.get().is_some());
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let cache = TokenCache::default();
        cache.store("secret-token".into(), 3600);
        assert!(!format!("{cache:?}").contains("secret-token"));
    }
}
