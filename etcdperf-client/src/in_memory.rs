//! In-memory store for tests.
//!
//! This provides a [`KvStore`] backed by a `BTreeMap`. The store is [`Clone`] so tests can hold a
//! handle for direct inspection while a server or benchmark owns a boxed copy.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::KvStore;
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Bytes>,
    unavailable: bool,
}

/// A [`KvStore`] that keeps all entries in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Returns `true` if the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Returns the value stored under `key`, bypassing the [`KvStore`] trait.
    pub fn get_stored(&self, key: &str) -> Option<Bytes> {
        self.lock().entries.get(key).cloned()
    }

    /// Makes every subsequent operation fail with [`StoreError::Unavailable`].
    ///
    /// Useful for simulating an unreachable store.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a poisoned lock only means another test thread panicked while holding it
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn available(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        let guard = self.lock();
        if guard.unavailable {
            return Err(StoreError::Unavailable("in-memory store disabled".into()));
        }
        Ok(guard)
    }
}

#[async_trait::async_trait]
impl KvStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn put(&self, key: &str, value: Bytes) -> StoreResult<()> {
        self.available()?.entries.insert(key.to_owned(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Bytes>> {
        Ok(self.available()?.entries.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let removed = self.available()?.entries.remove(key);
        Ok(removed.map_or(0, |_| 1))
    }

    async fn list(&self) -> StoreResult<Vec<(String, Bytes)>> {
        let guard = self.available()?;
        Ok(guard
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
