//! Read cache for values served by `GET /kv/{key}`.

use std::fmt;

use moka::future::Cache;

use crate::config;

/// A bounded cache of recently read values with a fixed time to live.
///
/// A disabled cache never returns entries and ignores inserts.
#[derive(Clone)]
pub struct ReadCache {
    inner: Option<Cache<String, String>>,
}

impl ReadCache {
    /// Creates a cache from its configuration.
    pub fn new(config: &config::Cache) -> Self {
        let inner = config.is_enabled().then(|| {
            Cache::builder()
                .max_capacity(config.capacity)
                .time_to_live(config.ttl)
                .build()
        });

        Self { inner }
    }

    /// Creates a cache that stores nothing.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Returns the cached value of `key`.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.as_ref()?.get(key).await
    }

    /// Caches `value` as the current value of `key`.
    pub async fn insert(&self, key: String, value: String) {
        if let Some(cache) = &self.inner {
            cache.insert(key, value).await;
        }
    }

    /// Evicts `key` from the cache.
    pub async fn invalidate(&self, key: &str) {
        if let Some(cache) = &self.inner {
            cache.invalidate(key).await;
        }
    }
}

impl fmt::Debug for ReadCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(cache) => f
                .debug_struct("ReadCache")
                .field("entries", &cache.entry_count())
                .finish(),
            None => f.write_str("ReadCache(disabled)"),
        }
    }
}
