use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Circuit-breaker states for one data source (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    Healthy,
    Cooling,
    Probing,
}

#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub state: HealthState,
    pub consecutive_errors: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl Default for SourceHealth {
    fn default() -> Self {
        Self {
            state: HealthState::Healthy,
            consecutive_errors: 0,
            last_failure_at: None,
        }
    }
}

/// Process-wide, mutex-guarded per-source health state. The only component
/// allowed to mark a source unhealthy (spec §4.2) — the Facade only reads
/// `allow_request` and reports outcomes via `record_success`/`record_failure`.
pub struct SourceHealthRegistry {
    records: DashMap<String, Mutex<SourceHealth>>,
    max_errors: u32,
    cooldown: Duration,
}

impl SourceHealthRegistry {
    pub fn new(max_errors: u32, cooldown: Duration) -> Self {
        Self {
            records: DashMap::new(),
            max_errors,
            cooldown,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(3, Duration::from_secs(300))
    }

    /// Whether a request may currently be dispatched to this source. A
    /// `Cooling` source whose cooldown has elapsed transitions to `Probing`
    /// and is let through exactly once (spec §4.2).
    pub fn allow_request(&self, source_id: &str) -> bool {
        let entry = self
            .records
            .entry(source_id.to_string())
            .or_insert_with(|| Mutex::new(SourceHealth::default()));
        let mut rec = entry.lock().unwrap();
        match rec.state {
            HealthState::Healthy | HealthState::Probing => true,
            HealthState::Cooling => {
                let elapsed = rec
                    .last_failure_at
                    .map(|t| (Utc::now() - t).num_seconds().max(0) as u64)
                    .unwrap_or(u64::MAX);
                if elapsed >= self.cooldown.as_secs() {
                    rec.state = HealthState::Probing;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self, source_id: &str) {
        let entry = self
            .records
            .entry(source_id.to_string())
            .or_insert_with(|| Mutex::new(SourceHealth::default()));
        let mut rec = entry.lock().unwrap();
        rec.state = HealthState::Healthy;
        rec.consecutive_errors = 0;
        rec.last_failure_at = None;
    }

    pub fn record_failure(&self, source_id: &str) {
        let entry = self
            .records
            .entry(source_id.to_string())
            .or_insert_with(|| Mutex::new(SourceHealth::default()));
        let mut rec = entry.lock().unwrap();
        rec.consecutive_errors += 1;
        rec.last_failure_at = Some(Utc::now());
        match rec.state {
            HealthState::Probing => rec.state = HealthState::Cooling,
            HealthState::Healthy if rec.consecutive_errors >= self.max_errors => {
                rec.state = HealthState::Cooling;
            }
            _ => {}
        }
    }

    pub fn snapshot(&self, source_id: &str) -> SourceHealth {
        self.records
            .get(source_id)
            .map(|e| e.lock().unwrap().clone())
            .unwrap_or_default()
    }
}
