use std::sync::Arc;

use aoc_cache::TieredCache;
use aoc_core::anomaly::{detect_anomaly, AnomalyEvent, DEFAULT_ANOMALY_THRESHOLD_PERCENT};
use aoc_core::cache_contract::{cache_key, CacheKind};
use aoc_core::state::{RequestSpec, SessionKind};
use aoc_core::AocResult;
use aoc_providers::{DataProviderFacade, NewsItem, SectorFlow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const POLICY_TAG_KEYWORDS: &[&str] = &["policy", "regulation", "regulator"];
const MORNING_NEWS_LIMIT: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MorningSnapshot {
    pub generated_at: DateTime<Utc>,
    pub international_news: Vec<NewsItem>,
    pub sector_top: Vec<SectorFlow>,
    pub sector_bottom: Vec<SectorFlow>,
    pub anomalies: Vec<AnomalyEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosingSnapshot {
    pub generated_at: DateTime<Utc>,
    pub sector_top: Vec<SectorFlow>,
    pub sector_bottom: Vec<SectorFlow>,
    pub sector_all: Vec<SectorFlow>,
    pub policy_news: Vec<NewsItem>,
    pub anomalies: Vec<AnomalyEvent>,
}

/// The Realtime Snapshot Engine (C9): composes primitive Facade calls into
/// two ready-made views for the Session/Closing context, each cached
/// in-memory for 5 minutes (spec.md §4.9). Callers that need fresher data
/// than the cache window must invalidate explicitly.
pub struct SnapshotEngine {
    facade: Arc<DataProviderFacade>,
    cache: Arc<TieredCache>,
    anomaly_threshold_percent: f64,
}

impl SnapshotEngine {
    pub fn new(facade: Arc<DataProviderFacade>, cache: Arc<TieredCache>) -> Self {
        Self {
            facade,
            cache,
            anomaly_threshold_percent: DEFAULT_ANOMALY_THRESHOLD_PERCENT,
        }
    }

    pub fn with_anomaly_threshold(mut self, threshold_percent: f64) -> Self {
        self.anomaly_threshold_percent = threshold_percent;
        self
    }

    /// Morning view: latest international news (top 3) plus current
    /// sector-flow top/bottom slices (spec.md §4.9).
    pub async fn morning_snapshot(&self, request: &RequestSpec) -> AocResult<MorningSnapshot> {
        let key = cache_key(
            CacheKind::Snapshot,
            Some(&request.symbol),
            &format!("morning:{}", request.trade_date),
        );
        let (value, _hit) = self
            .cache
            .get_or_compute(CacheKind::Snapshot, &key, || async {
                let snapshot = self.build_morning_snapshot(request).await?;
                Ok(serde_json::to_value(&snapshot).map_err(|e| {
                    aoc_core::AocError::ArtifactParseFailed {
                        node: "snapshot_engine".to_string(),
                        reason: e.to_string(),
                    }
                })?)
            })
            .await?;
        serde_json::from_value(value).map_err(|e| aoc_core::AocError::ArtifactParseFailed {
            node: "snapshot_engine".to_string(),
            reason: e.to_string(),
        })
    }

    /// Closing view: full sector flow plus policy-tagged items from the
    /// latest news list (spec.md §4.9).
    pub async fn closing_snapshot(&self, request: &RequestSpec) -> AocResult<ClosingSnapshot> {
        let key = cache_key(
            CacheKind::Snapshot,
            Some(&request.symbol),
            &format!("closing:{}", request.trade_date),
        );
        let (value, _hit) = self
            .cache
            .get_or_compute(CacheKind::Snapshot, &key, || async {
                let snapshot = self.build_closing_snapshot(request).await?;
                Ok(serde_json::to_value(&snapshot).map_err(|e| {
                    aoc_core::AocError::ArtifactParseFailed {
                        node: "snapshot_engine".to_string(),
                        reason: e.to_string(),
                    }
                })?)
            })
            .await?;
        serde_json::from_value(value).map_err(|e| aoc_core::AocError::ArtifactParseFailed {
            node: "snapshot_engine".to_string(),
            reason: e.to_string(),
        })
    }

    /// Dispatches to the session-appropriate snapshot (spec.md §4.8:
    /// session kind shapes snapshot engine behavior).
    pub async fn for_session(
        &self,
        request: &RequestSpec,
    ) -> AocResult<serde_json::Value> {
        match request.session_kind {
            SessionKind::Morning | SessionKind::Post => {
                let snapshot = self.morning_snapshot(request).await?;
                Ok(serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null))
            }
            SessionKind::Closing => {
                let snapshot = self.closing_snapshot(request).await?;
                Ok(serde_json::to_value(snapshot).unwrap_or(serde_json::Value::Null))
            }
        }
    }

    async fn build_morning_snapshot(&self, request: &RequestSpec) -> AocResult<MorningSnapshot> {
        let international_news = self
            .facade
            .get_international_news(None, 3)
            .await
            .unwrap_or_default();
        let international_news = international_news
            .into_iter()
            .take(MORNING_NEWS_LIMIT as usize)
            .collect();
        let sector_flows = self.facade.get_sector_flows(Some(request.trade_date)).await?;
        let anomalies = self.detect_index_anomaly(request).await;
        Ok(MorningSnapshot {
            generated_at: Utc::now(),
            international_news,
            sector_top: sector_flows.top,
            sector_bottom: sector_flows.bottom,
            anomalies,
        })
    }

    async fn build_closing_snapshot(&self, request: &RequestSpec) -> AocResult<ClosingSnapshot> {
        let sector_flows = self.facade.get_sector_flows(Some(request.trade_date)).await?;
        let latest_news = self.facade.get_latest_news(100).await.unwrap_or_default();
        let policy_news = latest_news
            .into_iter()
            .filter(|item| {
                let haystack = item.keywords.join(" ").to_lowercase()
                    + " "
                    + &item.categories.join(" ").to_lowercase()
                    + " "
                    + &item.title.to_lowercase();
                POLICY_TAG_KEYWORDS.iter().any(|kw| haystack.contains(kw))
            })
            .collect();
        let anomalies = self.detect_index_anomaly(request).await;
        Ok(ClosingSnapshot {
            generated_at: Utc::now(),
            sector_top: sector_flows.top,
            sector_bottom: sector_flows.bottom,
            sector_all: sector_flows.all,
            policy_news,
            anomalies,
        })
    }

    /// Compares the last two daily bars for the requested symbol and
    /// surfaces a surge/drop event when the move clears the threshold.
    /// Never fails the snapshot build: an unavailable bar series just
    /// yields no anomalies.
    async fn detect_index_anomaly(&self, request: &RequestSpec) -> Vec<AnomalyEvent> {
        let end = request.trade_date;
        let start = end - chrono::Duration::days(5);
        let bars = match self
            .facade
            .get_index_daily(&request.symbol, start, end)
            .await
        {
            Ok(bars) if bars.len() >= 2 => bars,
            _ => return Vec::new(),
        };
        let previous = &bars[bars.len() - 2];
        let latest = &bars[bars.len() - 1];
        detect_anomaly(
            &request.symbol,
            None,
            previous.close,
            latest.close,
            latest.volume,
            self.anomaly_threshold_percent,
            Utc::now(),
        )
        .into_iter()
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_cache::SqlxSqliteStore;
    use aoc_core::state::{MarketType, ResearchDepth};
    use aoc_providers::mock::MockSource;
    use aoc_providers::SourceHealthRegistry;
    use chrono::NaiveDate;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_cache() -> Arc<TieredCache> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqlxSqliteStore::connect(pool).await.unwrap();
        Arc::new(TieredCache::new(Arc::new(store)))
    }

    fn request(session_kind: SessionKind) -> RequestSpec {
        RequestSpec {
            symbol: "000001.SH".to_string(),
            market_type: MarketType::AShare,
            session_kind,
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            research_depth: ResearchDepth::Standard,
        }
    }

    #[tokio::test]
    async fn morning_snapshot_has_top_three_news_and_sector_slices() {
        let source = Arc::new(MockSource::new("primary"));
        let facade = Arc::new(DataProviderFacade::new(
            vec![source],
            Arc::new(SourceHealthRegistry::with_defaults()),
        ));
        let cache = test_cache().await;
        let engine = SnapshotEngine::new(facade, cache);
        let snapshot = engine.morning_snapshot(&request(SessionKind::Morning)).await.unwrap();
        assert!(snapshot.international_news.len() <= 3);
        assert!(!snapshot.sector_top.is_empty() || !snapshot.sector_bottom.is_empty());
    }

    #[tokio::test]
    async fn closing_snapshot_carries_full_sector_flows() {
        let source = Arc::new(MockSource::new("primary"));
        let facade = Arc::new(DataProviderFacade::new(
            vec![source],
            Arc::new(SourceHealthRegistry::with_defaults()),
        ));
        let cache = test_cache().await;
        let engine = SnapshotEngine::new(facade, cache);
        let snapshot = engine.closing_snapshot(&request(SessionKind::Closing)).await.unwrap();
        assert!(!snapshot.sector_all.is_empty());
    }

    #[tokio::test]
    async fn repeated_calls_within_ttl_hit_the_memory_cache() {
        let source = Arc::new(MockSource::new("primary"));
        let facade = Arc::new(DataProviderFacade::new(
            vec![source],
            Arc::new(SourceHealthRegistry::with_defaults()),
        ));
        let cache = test_cache().await;
        let engine = SnapshotEngine::new(facade, cache.clone());
        let req = request(SessionKind::Morning);
        let first = engine.morning_snapshot(&req).await.unwrap();
        let second = engine.morning_snapshot(&req).await.unwrap();
        assert_eq!(first.generated_at, second.generated_at);
    }
}
