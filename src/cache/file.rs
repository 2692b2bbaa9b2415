//! Durable file-backed cache.
//!
//! Entries are JSON files under a two-level directory fan-out keyed by
//! `md5(prefix + key)`, so a large cache never piles every entry into one
//! directory. Each payload carries a keyed SHA-256 integrity tag over
//! `(expiry, value)`; an entry failing verification is treated as absent and
//! deleted. Writes are atomic (temp sibling, then rename), which is the only
//! locking the cross-process sharing model relies on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;
use tracing::warn;

use super::store::CacheStore;

const ENTRY_EXTENSION: &str = "cache";

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    expires_at: Option<i64>,
    value: Value,
    tag: String,
}

pub struct FileCache {
    root: PathBuf,
    prefix: String,
    secret: Vec<u8>,
}

impl FileCache {
    /// Open (creating if needed) a cache directory.
    ///
    /// Directory creation failure is fatal at startup; runtime I/O failures
    /// degrade to misses instead.
    pub fn new(
        root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        secret: impl Into<Vec<u8>>,
    ) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            prefix: prefix.into(),
            secret: secret.into(),
        })
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = md5::compute(format!("{}{}", self.prefix, key));
        let hash = format!("{digest:x}");
        self.root
            .join(&hash[0..2])
            .join(&hash[2..4])
            .join(format!("{hash}.{ENTRY_EXTENSION}"))
    }

    fn integrity_tag(&self, expires_at: Option<i64>, value: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        match expires_at {
            Some(at) => hasher.update(at.to_le_bytes()),
            None => hasher.update(b"forever"),
        }
        hasher.update(value.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    fn verify(&self, entry: &DiskEntry) -> bool {
        let expected = self.integrity_tag(entry.expires_at, &entry.value);
        expected.as_bytes().ct_eq(entry.tag.as_bytes()).into()
    }

    async fn read_entry(&self, path: &Path) -> Option<DiskEntry> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice::<DiskEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache entry unparseable, discarding");
                let _ = tokio::fs::remove_file(path).await;
                None
            }
        }
    }

    async fn discard(&self, path: &Path) {
        let _ = tokio::fs::remove_file(path).await;
    }

    /// Remove expired entries from disk, returning how many were deleted.
    ///
    /// Driven by the cache-prune cron worker; expired entries are otherwise
    /// only removed lazily when read.
    pub async fn prune(&self) -> usize {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut removed = 0;

        let mut level_one = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(_) => return 0,
        };
        while let Ok(Some(outer)) = level_one.next_entry().await {
            let Ok(mut level_two) = tokio::fs::read_dir(outer.path()).await else {
                continue;
            };
            while let Ok(Some(inner)) = level_two.next_entry().await {
                let Ok(mut files) = tokio::fs::read_dir(inner.path()).await else {
                    continue;
                };
                while let Ok(Some(file)) = files.next_entry().await {
                    let path = file.path();
                    if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                        continue;
                    }
                    if let Some(entry) = self.read_entry(&path).await
                        && entry.expires_at.is_some_and(|at| at <= now)
                    {
                        self.discard(&path).await;
                        removed += 1;
                    }
                }
            }
        }
        removed
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let entry = self.read_entry(&path).await?;

        if !self.verify(&entry) {
            metrics::counter!("quire_cache_integrity_failure_total").increment(1);
            warn!(key, "cache entry failed integrity check, discarding");
            self.discard(&path).await;
            return None;
        }

        if let Some(at) = entry.expires_at
            && at <= OffsetDateTime::now_utc().unix_timestamp()
        {
            self.discard(&path).await;
            return None;
        }

        Some(entry.value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let expires_at =
            ttl.map(|ttl| OffsetDateTime::now_utc().unix_timestamp() + ttl.as_secs() as i64);
        let entry = DiskEntry {
            expires_at,
            tag: self.integrity_tag(expires_at, &value),
            value,
        };

        let path = self.entry_path(key);
        let Some(parent) = path.parent() else {
            return false;
        };
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            warn!(key, error = %err, "cache fan-out directory creation failed");
            return false;
        }

        let payload = match serde_json::to_vec(&entry) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key, error = %err, "cache entry serialization failed");
                return false;
            }
        };

        // Unique per process so two writers never share a temp file; the
        // rename is the atomic publish step.
        let tmp = path.with_extension(format!("{}.tmp", std::process::id()));
        if let Err(err) = tokio::fs::write(&tmp, &payload).await {
            warn!(key, error = %err, "cache write failed");
            return false;
        }
        match tokio::fs::rename(&tmp, &path).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key, error = %err, "cache rename failed");
                let _ = tokio::fs::remove_file(&tmp).await;
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        tokio::fs::remove_file(self.entry_path(key)).await.is_ok()
    }

    async fn clear(&self) -> bool {
        let mut cleared = true;
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(_) => return false,
        };
        while let Ok(Some(entry)) = dir.next_entry().await {
            let result = if entry.path().is_dir() {
                tokio::fs::remove_dir_all(entry.path()).await
            } else {
                tokio::fs::remove_file(entry.path()).await
            };
            cleared &= result.is_ok();
        }
        cleared
    }
}
