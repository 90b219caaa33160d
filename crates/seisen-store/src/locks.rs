//! Per-key async mutexes.
//!
//! Used to serialize the read-decide-issue-write sequence for one
//! transaction while leaving other transactions unblocked. The guard is
//! held across `.await` points (the outbound issuance call), so this is a
//! `tokio` mutex rather than a `parking_lot` one.
//!
//! A table entry lives only while someone holds or waits on it: dropping
//! the last [`KeyedGuard`] for a key removes the key.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// A lazily-populated map of per-key mutexes.
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<LockTable>,
}

/// Holds the lock for one key. Dropping it releases the lock and removes
/// the key from the table when nobody else is waiting on it.
#[derive(Debug)]
pub struct KeyedGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl KeyedGuard {
    /// The key this guard locks.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Waiters and new lockers clone the Arc under the shard lock, so a
        // count of one means only the table references the mutex.
        self.locks
            .remove_if(&self.key, |_, m| Arc::strong_count(m) == 1);
    }
}

impl KeyedLocks {
    /// Empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `key`.
    pub async fn lock(&self, key: &str) -> KeyedGuard {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            key: key.to_string(),
            guard: Some(guard),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Drop table entries nobody holds or waits on. Returns how many were
    /// removed. Entries normally leave with their last guard; this catches
    /// keys whose waiters were cancelled before acquiring.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, m| Arc::strong_count(m) > 1);
        before.saturating_sub(self.locks.len())
    }

    /// Number of keys in the table.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = KeyedLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _g = locks.lock("tx-1").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_key_leaves_the_table() {
        let locks = KeyedLocks::new();
        let held = locks.lock("held").await;
        drop(locks.lock("idle").await);
        assert_eq!(locks.len(), 1);
        assert_eq!(held.key(), "held");
        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_key_with_waiter_survives_release() {
        let locks = KeyedLocks::new();
        let first = locks.lock("tx").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.lock("tx").await;
            })
        };
        // Let the waiter register on the mutex.
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_prune_clears_abandoned_waiters() {
        let locks = KeyedLocks::new();
        let held = locks.lock("tx").await;
        let mut waiter = Box::pin(locks.lock("tx"));
        tokio::select! {
            _ = &mut waiter => panic!("lock should still be held"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }
        drop(held);
        drop(waiter);
        assert_eq!(locks.len(), 1);
        assert_eq!(locks.prune(), 1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_many_distinct_keys_do_not_accumulate() {
        let locks = KeyedLocks::new();
        for i in 0..100 {
            let _g = locks.lock(&format!("ROBLOX_{i}_1")).await;
        }
        assert!(locks.is_empty());
    }
}
