use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

/// Cache persistence contract (spec §6): opaque to the core beyond
/// get/put/delete on a `(collection, key)` pair with an explicit TTL.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> Option<serde_json::Value>;
    async fn put(&self, collection: &str, key: &str, document: serde_json::Value, ttl: Duration);
    async fn delete(&self, collection: &str, key: &str);
}

/// SQLite-backed persistent tier, the way `analysis-orchestrator` already
/// carries a `sqlx::SqlitePool` for feature logging and `risk-manager`
/// carries one for risk state. Failures degrade to a cache miss and bump
/// `degraded_reads`/`degraded_writes` rather than propagating — the
/// persistent tier is never allowed to be fatal (spec §4.3).
pub struct SqlxSqliteStore {
    pool: SqlitePool,
    degraded_reads: AtomicU64,
    degraded_writes: AtomicU64,
}

impl SqlxSqliteStore {
    pub async fn connect(pool: SqlitePool) -> sqlx::Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                collection TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ttl_secs INTEGER NOT NULL,
                PRIMARY KEY (collection, cache_key)
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self {
            pool,
            degraded_reads: AtomicU64::new(0),
            degraded_writes: AtomicU64::new(0),
        })
    }

    pub fn degraded_reads(&self) -> u64 {
        self.degraded_reads.load(Ordering::Relaxed)
    }

    pub fn degraded_writes(&self) -> u64 {
        self.degraded_writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl PersistentStore for SqlxSqliteStore {
    async fn get(&self, collection: &str, key: &str) -> Option<serde_json::Value> {
        let row: Result<Option<(String, String, i64)>, sqlx::Error> = sqlx::query_as(
            "SELECT payload, created_at, ttl_secs FROM cache_entries WHERE collection = ? AND cache_key = ?",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some((payload, created_at, ttl_secs))) => {
                let created_at = match chrono::DateTime::parse_from_rfc3339(&created_at) {
                    Ok(dt) => dt.with_timezone(&Utc),
                    Err(_) => return None,
                };
                let age = (Utc::now() - created_at).num_seconds().max(0) as u64;
                if age >= ttl_secs as u64 {
                    return None;
                }
                serde_json::from_str(&payload).ok()
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "persistent cache read degraded to miss");
                self.degraded_reads.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    async fn put(&self, collection: &str, key: &str, document: serde_json::Value, ttl: Duration) {
        let payload = match serde_json::to_string(&document) {
            Ok(p) => p,
            Err(_) => return,
        };
        let result = sqlx::query(
            "INSERT INTO cache_entries (collection, cache_key, payload, created_at, ttl_secs)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(collection, cache_key) DO UPDATE SET
                payload = excluded.payload, created_at = excluded.created_at, ttl_secs = excluded.ttl_secs",
        )
        .bind(collection)
        .bind(key)
        .bind(&payload)
        .bind(Utc::now().to_rfc3339())
        .bind(ttl.as_secs() as i64)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, "persistent cache write degraded (value only cached in-memory if coalesced)");
            self.degraded_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    async fn delete(&self, collection: &str, key: &str) {
        let _ = sqlx::query("DELETE FROM cache_entries WHERE collection = ? AND cache_key = ?")
            .bind(collection)
            .bind(key)
            .execute(&self.pool)
            .await;
    }
}
