//! Tag-indexed caching.
//!
//! Every tagged `set` records its key in a reverse index (`cache:tags:<tag>`
//! → list of keys) stored in the same backend, so `flush(tag)` can delete a
//! whole group without scanning the cache. Index entries inherit the TTL of
//! the value being indexed; TTL-less values get a year-long index lifetime so
//! the index never expires out from under a still-valid entry.
//!
//! `delete` removes only the value entry: stale key references in an index
//! are harmless (flushing them is a no-op delete) and are cleaned up when
//! the tag is flushed.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::store::CacheStore;

const TAG_INDEX_NAMESPACE: &str = "cache:tags:";
const FOREVER_INDEX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn index_entry_key(tag: &str) -> String {
    format!("{TAG_INDEX_NAMESPACE}{tag}")
}

#[derive(Clone)]
pub struct TagCache {
    store: Arc<dyn CacheStore>,
}

impl TagCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Some(raw) = self.store.get(key).await else {
            metrics::counter!("quire_cache_miss_total").increment(1);
            return None;
        };
        match serde_json::from_value(raw) {
            Ok(value) => {
                metrics::counter!("quire_cache_hit_total").increment(1);
                Some(value)
            }
            Err(err) => {
                warn!(key, error = %err, "cached payload failed to deserialize, discarding");
                self.store.delete(key).await;
                metrics::counter!("quire_cache_miss_total").increment(1);
                None
            }
        }
    }

    /// Store a value and index its key under every tag.
    pub async fn set<T: Serialize>(
        &self,
        tags: &[&str],
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, error = %err, "value is not cacheable");
                return false;
            }
        };
        if !self.store.set(key, raw, ttl).await {
            return false;
        }
        for tag in tags {
            self.index_key(tag, key, ttl).await;
        }
        true
    }

    /// Get-or-compute-and-set with tag indexing.
    ///
    /// Same race tolerance as the untagged path: concurrent misses may each
    /// run the producer, last write wins.
    pub async fn remember<T, E, F, Fut>(
        &self,
        tags: &[&str],
        key: &str,
        ttl: Option<Duration>,
        producer: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send,
        E: Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = producer().await?;
        self.set(tags, key, &value, ttl).await;
        Ok(value)
    }

    /// Remove the value entry only; index references are cleaned up lazily.
    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    /// Delete every entry indexed under each tag, then the index itself.
    pub async fn flush(&self, tags: &[&str]) {
        for tag in tags {
            let index_key = index_entry_key(tag);
            let keys: Vec<String> = match self.store.get(&index_key).await {
                Some(raw) => serde_json::from_value(raw).unwrap_or_default(),
                None => Vec::new(),
            };
            for key in &keys {
                self.store.delete(key).await;
            }
            self.store.delete(&index_key).await;
            metrics::counter!("quire_cache_flush_total").increment(1);
            debug!(tag, flushed = keys.len(), "flushed cache tag");
        }
    }

    /// Merge `key` into the tag's index entry, never duplicating and never
    /// dropping keys already indexed under the tag.
    async fn index_key(&self, tag: &str, key: &str, ttl: Option<Duration>) {
        let index_key = index_entry_key(tag);
        let mut keys: Vec<String> = match self.store.get(&index_key).await {
            Some(raw) => serde_json::from_value(raw).unwrap_or_default(),
            None => Vec::new(),
        };
        if !keys.iter().any(|existing| existing == key) {
            keys.push(key.to_string());
        }

        let index_ttl = Some(ttl.unwrap_or(FOREVER_INDEX_TTL));
        match serde_json::to_value(&keys) {
            Ok(raw) => {
                self.store.set(&index_key, raw, index_ttl).await;
            }
            Err(err) => warn!(tag, error = %err, "tag index serialization failed"),
        }
    }
}
