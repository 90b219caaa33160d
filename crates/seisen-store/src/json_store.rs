//! # JSON Document Store
//!
//! A string-keyed map of documents held in a [`DashMap`] and optionally
//! mirrored to a JSON snapshot file.
//!
//! ## Consistency
//!
//! - Writes are serialized by one store-wide lock, and read-modify-write
//!   of a key also runs under that key's shard lock
//!   ([`JsonStore::update`], [`JsonStore::compare_and_swap`]).
//! - Snapshots are written to a temp file in the target directory and
//!   renamed over the old file. A crash leaves either the old or the new
//!   snapshot, never a torn one.
//! - A write whose snapshot fails is undone before the error is returned,
//!   so the map never holds state the file lacks. Readers may see the
//!   new value while the snapshot is in flight.
//!
//! No shard guard is held across a flush. Iterating a `DashMap` while
//! holding a guard on one of its shards deadlocks.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Bound on document types.
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Document for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Thread-safe document map with optional file persistence.
///
/// Cloning is cheap and shares the underlying map.
#[derive(Debug)]
pub struct JsonStore<V> {
    entries: Arc<DashMap<String, V>>,
    path: Option<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl<V> Clone for JsonStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            path: self.path.clone(),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl<V: Document> JsonStore<V> {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            path: None,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Open a store backed by `path`, loading the snapshot if one exists.
    /// Parent directories are created.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let entries = DashMap::new();
        match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => {}
            Ok(raw) => {
                let loaded: BTreeMap<String, V> =
                    serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                        path: path.clone(),
                        source,
                    })?;
                for (k, v) in loaded {
                    entries.insert(k, v);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Io { path, source }),
        }

        tracing::debug!(path = %path.display(), documents = entries.len(), "opened document store");

        Ok(Self {
            entries: Arc::new(entries),
            path: Some(path),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Snapshot file, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Clone of the document under `key`.
    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key).map(|r| r.value().clone())
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clones of every document, in no particular order.
    pub fn values(&self) -> Vec<V> {
        self.entries.iter().map(|r| r.value().clone()).collect()
    }

    /// Insert or replace. Returns the previous document.
    pub fn upsert(&self, key: impl Into<String>, value: V) -> Result<Option<V>, StoreError> {
        let key = key.into();
        let _write = self.write_lock.lock();
        let previous = self.entries.insert(key.clone(), value);
        self.persist_or_restore(&key, previous.clone())?;
        Ok(previous)
    }

    /// Insert only if `key` is absent.
    pub fn insert_new(&self, key: impl Into<String>, value: V) -> Result<(), StoreError> {
        let key = key.into();
        let _write = self.write_lock.lock();
        match self.entries.entry(key.clone()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Conflict {
                    key,
                    reason: "document already exists".to_string(),
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
        self.persist_or_restore(&key, None)
    }

    /// Mutate the document under `key` in place. Returns `None` if absent.
    pub fn update<R>(&self, key: &str, f: impl FnOnce(&mut V) -> R) -> Result<Option<R>, StoreError> {
        let _write = self.write_lock.lock();
        let (result, previous) = match self.entries.get_mut(key) {
            Some(mut doc) => {
                let previous = self.path.is_some().then(|| doc.value().clone());
                (Some(f(doc.value_mut())), previous)
            }
            None => (None, None),
        };
        if result.is_some() {
            self.persist_or_restore(key, previous)?;
        }
        Ok(result)
    }

    /// Replace the document under `key` with `value` if `expected` accepts
    /// the current state (`None` when absent). Returns whether the swap
    /// happened.
    pub fn compare_and_swap(
        &self,
        key: &str,
        expected: impl FnOnce(Option<&V>) -> bool,
        value: V,
    ) -> Result<bool, StoreError> {
        let _write = self.write_lock.lock();
        let swapped = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if expected(Some(slot.get())) {
                    Some(Some(slot.insert(value)))
                } else {
                    None
                }
            }
            Entry::Vacant(slot) => {
                if expected(None) {
                    slot.insert(value);
                    Some(None)
                } else {
                    None
                }
            }
        };
        match swapped {
            Some(previous) => {
                self.persist_or_restore(key, previous)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the snapshot file. A no-op for in-memory stores.
    pub fn flush(&self) -> Result<(), StoreError> {
        let _write = self.write_lock.lock();
        self.write_snapshot()
    }

    /// Snapshot after a write to `key`; on failure put `previous` back
    /// (`None` removes the key). Caller holds `write_lock` and no shard
    /// guard.
    fn persist_or_restore(&self, key: &str, previous: Option<V>) -> Result<(), StoreError> {
        let Err(err) = self.write_snapshot() else {
            return Ok(());
        };
        match previous {
            Some(doc) => {
                self.entries.insert(key.to_string(), doc);
            }
            None => {
                self.entries.remove(key);
            }
        }
        tracing::warn!(key, error = %err, "snapshot failed, write rolled back");
        Err(err)
    }

    fn write_snapshot(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let snapshot: BTreeMap<String, V> = self
            .entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect();
        let body = serde_json::to_vec_pretty(&snapshot)?;

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let io_err = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(&body).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}
