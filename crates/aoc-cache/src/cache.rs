use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use aoc_core::cache_contract::CacheKind;
use aoc_core::AocResult;
use dashmap::mapref::entry::Entry as DashEntry;
use dashmap::DashMap;
use tokio::sync::Notify;

use crate::lru::MemoryLru;
use crate::persistent::PersistentStore;

/// Per-key wait timeout for single-flight coalescing before a caller falls
/// through to an independent compute (spec §4.3 starvation avoidance).
pub const DEFAULT_SINGLE_FLIGHT_WAIT: Duration = Duration::from_secs(10);

/// The Tiered Artifact Cache (C3): an in-memory LRU tier for snapshots and
/// a persistent tier for everything else, both behind a single-flight
/// `get_or_compute`. `get`/`put`/`invalidate` are the raw contract from
/// spec §4.3; `get_or_compute` is what callers (the Probe, analyst nodes,
/// the Snapshot Engine) actually use.
pub struct TieredCache {
    memory: MemoryLru,
    persistent: Arc<dyn PersistentStore>,
    in_flight: DashMap<String, Arc<Notify>>,
    single_flight_wait: Duration,
    degraded_reads: AtomicU64,
}

impl TieredCache {
    pub fn new(persistent: Arc<dyn PersistentStore>) -> Self {
        Self {
            memory: MemoryLru::new(4096),
            persistent,
            in_flight: DashMap::new(),
            single_flight_wait: DEFAULT_SINGLE_FLIGHT_WAIT,
            degraded_reads: AtomicU64::new(0),
        }
    }

    pub fn with_single_flight_wait(mut self, wait: Duration) -> Self {
        self.single_flight_wait = wait;
        self
    }

    pub fn degraded_reads(&self) -> u64 {
        self.degraded_reads.load(Ordering::Relaxed)
    }

    pub async fn get(&self, kind: CacheKind, key: &str) -> Option<serde_json::Value> {
        if kind.memory_only() {
            return self.memory.get(key, kind.ttl());
        }
        self.persistent.get(kind.as_str(), key).await
    }

    pub async fn put(&self, kind: CacheKind, key: &str, payload: serde_json::Value) {
        if kind.memory_only() {
            self.memory.put(key, payload);
            return;
        }
        self.persistent.put(kind.as_str(), key, payload, kind.ttl()).await;
    }

    pub async fn invalidate(&self, kind: CacheKind, key: &str) {
        if kind.memory_only() {
            self.memory.invalidate(key);
            return;
        }
        self.persistent.delete(kind.as_str(), key).await;
    }

    /// Single-flight coalesced get-or-compute: concurrent callers for the
    /// same key observe one producer invocation. Returns `(payload,
    /// was_cache_hit)`.
    pub async fn get_or_compute<F, Fut>(
        &self,
        kind: CacheKind,
        key: &str,
        compute: F,
    ) -> AocResult<(serde_json::Value, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AocResult<serde_json::Value>>,
    {
        if let Some(hit) = self.get(kind, key).await {
            return Ok((hit, true));
        }

        let (notify, became_producer) = match self.in_flight.entry(key.to_string()) {
            DashEntry::Occupied(e) => (e.get().clone(), false),
            DashEntry::Vacant(v) => {
                let notify = Arc::new(Notify::new());
                v.insert(notify.clone());
                (notify, true)
            }
        };

        if became_producer {
            let result = compute().await;
            self.in_flight.remove(key);
            notify.notify_waiters();
            return match result {
                Ok(value) => {
                    self.put(kind, key, value.clone()).await;
                    Ok((value, false))
                }
                Err(e) => Err(e),
            };
        }

        let waited = tokio::time::timeout(self.single_flight_wait, notify.notified()).await;
        if waited.is_ok() {
            if let Some(hit) = self.get(kind, key).await {
                return Ok((hit, true));
            }
        }
        // Producer vanished (error, or starvation timeout): compute independently.
        tracing::debug!(key, "single-flight wait exhausted, computing independently");
        let value = compute().await?;
        self.put(kind, key, value.clone()).await;
        Ok((value, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistent::SqlxSqliteStore;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

    async fn cache() -> TieredCache {
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqlxSqliteStore::connect(pool).await.unwrap();
        TieredCache::new(Arc::new(store))
    }

    #[tokio::test]
    async fn put_then_get_within_ttl_returns_value() {
        let c = cache().await;
        c.put(CacheKind::Macro, "k", serde_json::json!({"a": 1})).await;
        assert_eq!(c.get(CacheKind::Macro, "k").await, Some(serde_json::json!({"a": 1})));
    }

    #[tokio::test]
    async fn single_flight_computes_exactly_once_under_concurrency() {
        let c = Arc::new(cache().await);
        let calls = Arc::new(AtomicU32::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let c = c.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                c.get_or_compute(CacheKind::SectorFlows, "shared-key", || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, AtomicOrdering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(serde_json::json!({"computed": true}))
                    }
                })
                .await
            }));
        }

        for h in handles {
            let (value, _) = h.await.unwrap().unwrap();
            assert_eq!(value, serde_json::json!({"computed": true}));
        }

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn memory_tier_used_for_snapshot_kind() {
        let c = cache().await;
        c.put(CacheKind::Snapshot, "morning", serde_json::json!({"s": 1})).await;
        assert!(c.get(CacheKind::Snapshot, "morning").await.is_some());
    }
}
