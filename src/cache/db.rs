//! Database-backed cache shared across processes.
//!
//! Entries live in the `cache_entries` table, namespaced by a key prefix so
//! several deployments can share one database. Connection problems at
//! construction are fatal; once running, every backend error degrades to a
//! miss so a flaky database never takes page serving down with it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use time::OffsetDateTime;
use tracing::warn;

use super::store::CacheStore;

pub struct DbCache {
    pool: SqlitePool,
    prefix: String,
}

impl DbCache {
    /// Wrap a pool, verifying connectivity up front.
    pub async fn new(pool: SqlitePool, prefix: impl Into<String>) -> Result<Self, sqlx::Error> {
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(Self {
            pool,
            prefix: prefix.into(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl CacheStore for DbCache {
    async fn get(&self, key: &str) -> Option<Value> {
        let key = self.namespaced(key);
        let row = match sqlx::query("SELECT value, expires_at FROM cache_entries WHERE key = ?")
            .bind(&key)
            .fetch_optional(&self.pool)
            .await
        {
            Ok(row) => row?,
            Err(err) => {
                warn!(key, error = %err, "cache select failed, treating as miss");
                return None;
            }
        };

        let expires_at: Option<i64> = row.get("expires_at");
        if let Some(at) = expires_at
            && at <= OffsetDateTime::now_utc().unix_timestamp()
        {
            let _ = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
                .bind(&key)
                .execute(&self.pool)
                .await;
            return None;
        }

        let raw: String = row.get("value");
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "cache payload unparseable, discarding");
                let _ = sqlx::query("DELETE FROM cache_entries WHERE key = ?")
                    .bind(&key)
                    .execute(&self.pool)
                    .await;
                None
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> bool {
        let key = self.namespaced(key);
        let expires_at =
            ttl.map(|ttl| OffsetDateTime::now_utc().unix_timestamp() + ttl.as_secs() as i64);
        let result = sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(&key)
        .bind(value.to_string())
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                warn!(key, error = %err, "cache upsert failed");
                false
            }
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = self.namespaced(key);
        match sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(&key)
            .execute(&self.pool)
            .await
        {
            Ok(done) => done.rows_affected() > 0,
            Err(err) => {
                warn!(key, error = %err, "cache delete failed");
                false
            }
        }
    }

    async fn clear(&self) -> bool {
        let pattern = format!("{}%", self.prefix.replace('%', "\\%").replace('_', "\\_"));
        sqlx::query("DELETE FROM cache_entries WHERE key LIKE ? ESCAPE '\\'")
            .bind(pattern)
            .execute(&self.pool)
            .await
            .is_ok()
    }
}
