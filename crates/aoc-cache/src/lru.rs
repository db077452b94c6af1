use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

#[derive(Clone)]
struct Entry {
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
}

/// In-memory LRU tier for snapshot payloads (spec §4.3: "In-memory LRU with
/// timestamped entries — for snapshots (5 min TTL)"). A capacity-bounded
/// access-order queue sits alongside the map, the way `analysis-orchestrator`
/// keeps a timestamped `DashMap<String, CacheEntry<T>>` per artifact kind,
/// generalised here to evict the oldest key once the map grows past capacity.
pub struct MemoryLru {
    entries: DashMap<String, Entry>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl MemoryLru {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn get(&self, key: &str, ttl: Duration) -> Option<serde_json::Value> {
        let entry = self.entries.get(key)?;
        let age = Utc::now() - entry.created_at;
        if age.num_seconds() as u64 >= ttl.as_secs() {
            return None;
        }
        Some(entry.payload.clone())
    }

    pub fn put(&self, key: &str, payload: serde_json::Value) {
        self.entries.insert(
            key.to_string(),
            Entry {
                payload,
                created_at: Utc::now(),
            },
        );
        let mut order = self.order.lock().unwrap();
        order.retain(|k| k != key);
        order.push_back(key.to_string());
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
        self.order.lock().unwrap().retain(|k| k != key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_past_capacity() {
        let lru = MemoryLru::new(2);
        lru.put("a", serde_json::json!(1));
        lru.put("b", serde_json::json!(2));
        lru.put("c", serde_json::json!(3));
        assert!(lru.get("a", Duration::from_secs(60)).is_none());
        assert!(lru.get("b", Duration::from_secs(60)).is_some());
        assert!(lru.get("c", Duration::from_secs(60)).is_some());
    }

    #[test]
    fn respects_ttl() {
        let lru = MemoryLru::new(8);
        lru.put("k", serde_json::json!("v"));
        assert!(lru.get("k", Duration::from_secs(60)).is_some());
        assert!(lru.get("k", Duration::from_secs(0)).is_none());
    }
}
