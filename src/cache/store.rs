//! The cache contract and the in-process backends.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;

/// Key-value cache with per-entry TTL.
///
/// Values are JSON payloads; `ttl = None` means the entry never expires.
/// Implementations absorb transient backend errors: `get` degrades to a
/// miss, `set`/`delete`/`clear` report `false`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool;

    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    async fn delete(&self, key: &str) -> bool;

    async fn clear(&self) -> bool;
}

/// Typed get-or-compute-and-set, usable through `Arc<dyn CacheStore>`.
///
/// Concurrent callers racing on the same missing key may each invoke the
/// producer and each write their own result; last write wins. No lock is
/// taken: cache values are derivable, not a source of truth.
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn remember<T, E, F, Fut>(
        &self,
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
        if let Some(raw) = self.get(key).await {
            match serde_json::from_value(raw) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(key, error = %err, "cached payload failed to deserialize, recomputing");
                    self.delete(key).await;
                }
            }
        }

        let value = producer().await?;
        match serde_json::to_value(&value) {
            Ok(raw) => {
                self.set(key, raw, ttl).await;
            }
            Err(err) => warn!(key, error = %err, "computed value is not cacheable"),
        }
        Ok(value)
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}

struct MemoryEntry {
    value: Value,
    expires_at: Option<OffsetDateTime>,
}

impl MemoryEntry {
    fn expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local backend with lazy expiry on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let now = OffsetDateTime::now_utc();
        // The read guard must be released before `remove` touches the shard.
        let cached = self.entries.get(key).map(|entry| {
            if entry.expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        });
        match cached {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let expires_at = ttl.map(|ttl| OffsetDateTime::now_utc() + ttl);
        self.entries
            .insert(key.to_string(), MemoryEntry { value, expires_at });
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    async fn clear(&self) -> bool {
        self.entries.clear();
        true
    }
}

/// Caching disabled: every read is a miss, writes succeed and vanish.
#[derive(Default)]
pub struct NullCache;

impl NullCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CacheStore for NullCache {
    async fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Option<Duration>) -> bool {
        true
    }

    async fn delete(&self, _key: &str) -> bool {
        false
    }

    async fn clear(&self) -> bool {
        true
    }
}
