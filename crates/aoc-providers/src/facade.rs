use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aoc_core::{AocError, AocResult};
use chrono::NaiveDate;

use crate::data::{
    IndexBar, IndexConstituent, IndexValuation, MacroIndicators, NewsItem, ProviderError,
    SectorFlows, TechnicalIndicators,
};
use crate::health::SourceHealthRegistry;
use crate::source::MarketDataSource;

const POLICY_KEYWORDS: &[&str] = &["policy", "regulation", "regulator"];
const INTL_KEYWORDS: &[&str] = &["international", "global", "fed", "rates"];

/// Default per-call timeout (spec §4.1/§5).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Longer timeout for multi-step indicator calls.
pub const INDICATOR_TIMEOUT: Duration = Duration::from_secs(12);

/// One retry with exponential backoff inside a single source attempt
/// before the Facade moves on to the next source (spec §9 design note).
async fn call_with_retry<T, Fut>(
    timeout: Duration,
    mut attempt: impl FnMut() -> Fut,
) -> Result<T, ProviderError>
where
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut last_err = ProviderError::protocol("no attempt made");
    for attempt_no in 0..2u32 {
        if attempt_no > 0 {
            tokio::time::sleep(Duration::from_millis(200 * 2u64.pow(attempt_no - 1))).await;
        }
        match tokio::time::timeout(timeout, attempt()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => last_err = e,
            Err(_) => last_err = ProviderError::timeout("call timed out"),
        }
    }
    Err(last_err)
}

fn filter_by_keywords(items: &[NewsItem], keywords: &[&str]) -> Vec<NewsItem> {
    items
        .iter()
        .filter(|item| {
            let haystack = item.keywords.join(" ").to_lowercase()
                + " "
                + &item.categories.join(" ").to_lowercase()
                + " "
                + &item.title.to_lowercase();
            keywords.iter().any(|kw| haystack.contains(kw))
        })
        .cloned()
        .collect()
}

/// Uniform async interface to market data spanning a primary and a
/// secondary source (spec §4.1, C1). Owns no network primitives itself —
/// those live behind [`MarketDataSource`] implementations.
pub struct DataProviderFacade {
    sources: Vec<Arc<dyn MarketDataSource>>,
    health: Arc<SourceHealthRegistry>,
    default_timeout: Duration,
    indicator_timeout: Duration,
}

impl DataProviderFacade {
    pub fn new(sources: Vec<Arc<dyn MarketDataSource>>, health: Arc<SourceHealthRegistry>) -> Self {
        Self {
            sources,
            health,
            default_timeout: DEFAULT_TIMEOUT,
            indicator_timeout: INDICATOR_TIMEOUT,
        }
    }

    pub fn with_timeouts(mut self, default_timeout: Duration, indicator_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self.indicator_timeout = indicator_timeout;
        self
    }

    pub fn health_registry(&self) -> &SourceHealthRegistry {
        &self.health
    }

    /// Runs `op_name` over the ordered source list, applying health gating,
    /// per-call timeout, in-source retry, and health bookkeeping. Returns
    /// `DataUnavailable` only once every source has been tried or skipped.
    async fn failover<T, Fut>(
        &self,
        op_name: &str,
        timeout: Duration,
        mut call: impl FnMut(Arc<dyn MarketDataSource>) -> Fut,
    ) -> AocResult<T>
    where
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        for source in &self.sources {
            let id = source.id();
            if !self.health.allow_request(id) {
                tracing::debug!(source = id, operation = op_name, "skipped: cooling down");
                continue;
            }
            let src = source.clone();
            match call_with_retry(timeout, || call(src.clone())).await {
                Ok(value) => {
                    self.health.record_success(id);
                    return Ok(value);
                }
                Err(e) => {
                    self.health.record_failure(id);
                    tracing::warn!(source = id, operation = op_name, error = %e, "source failed");
                }
            }
        }
        Err(AocError::DataUnavailable {
            operation: op_name.to_string(),
        })
    }

    pub async fn get_macro_data(&self, end_date: Option<NaiveDate>) -> AocResult<MacroIndicators> {
        self.failover("get_macro_data", self.default_timeout, |s| async move {
            s.get_macro_data(end_date).await
        })
        .await
    }

    /// Policy news has no second provider (spec §4.1). On primary failure
    /// this degrades to keyword-filtering the general news list.
    pub async fn get_policy_news(&self, lookback_days: u32) -> AocResult<Vec<NewsItem>> {
        if let Some(primary) = self.sources.first() {
            let id = primary.id();
            if self.health.allow_request(id) {
                let src = primary.clone();
                match call_with_retry(self.default_timeout, || {
                    let src = src.clone();
                    async move { src.get_policy_news(lookback_days).await }
                })
                .await
                {
                    Ok(value) => {
                        self.health.record_success(id);
                        return Ok(value);
                    }
                    Err(e) => {
                        self.health.record_failure(id);
                        tracing::warn!(source = id, operation = "get_policy_news", error = %e, "source failed");
                    }
                }
            }
        }
        tracing::info!("policy news degraded to keyword-filtered general news");
        let general = self.get_latest_news(100).await?;
        Ok(filter_by_keywords(&general, POLICY_KEYWORDS))
    }

    pub async fn get_sector_flows(&self, trade_date: Option<NaiveDate>) -> AocResult<SectorFlows> {
        self.failover("get_sector_flows", self.default_timeout, |s| async move {
            s.get_sector_flows(trade_date).await
        })
        .await
    }

    pub async fn get_index_daily(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> AocResult<Vec<IndexBar>> {
        self.failover("get_index_daily", self.default_timeout, |s| {
            let code = code.to_string();
            async move { s.get_index_daily(&code, start, end).await }
        })
        .await
    }

    pub async fn get_index_constituents(&self, code: &str) -> AocResult<Vec<IndexConstituent>> {
        self.failover("get_index_constituents", self.default_timeout, |s| {
            let code = code.to_string();
            async move { s.get_index_constituents(&code).await }
        })
        .await
    }

    pub async fn get_index_valuation(&self, code: &str) -> AocResult<IndexValuation> {
        self.failover("get_index_valuation", self.default_timeout, |s| {
            let code = code.to_string();
            async move { s.get_index_valuation(&code).await }
        })
        .await
    }

    pub async fn get_latest_news(&self, limit: u32) -> AocResult<Vec<NewsItem>> {
        self.failover("get_latest_news", self.default_timeout, |s| async move {
            s.get_latest_news(limit).await
        })
        .await
    }

    /// International news is always required fresh and has no second
    /// provider; on primary failure it degrades the same way policy news
    /// does (spec §4.1, §4.4).
    pub async fn get_international_news(
        &self,
        keywords: Option<Vec<String>>,
        lookback_days: u32,
    ) -> AocResult<Vec<NewsItem>> {
        if let Some(primary) = self.sources.first() {
            let id = primary.id();
            if self.health.allow_request(id) {
                let src = primary.clone();
                let kws = keywords.clone();
                match call_with_retry(self.default_timeout, || {
                    let src = src.clone();
                    let kws = kws.clone();
                    async move { src.get_international_news(kws.as_deref(), lookback_days).await }
                })
                .await
                {
                    Ok(value) => {
                        self.health.record_success(id);
                        return Ok(value);
                    }
                    Err(e) => {
                        self.health.record_failure(id);
                        tracing::warn!(source = id, operation = "get_international_news", error = %e, "source failed");
                    }
                }
            }
        }
        tracing::info!("international news degraded to keyword-filtered general news");
        let general = self.get_latest_news(100).await?;
        Ok(filter_by_keywords(&general, INTL_KEYWORDS))
    }

    pub async fn get_technical_indicators(&self, code: &str) -> AocResult<TechnicalIndicators> {
        self.failover("get_technical_indicators", self.indicator_timeout, |s| {
            let code = code.to_string();
            async move { s.get_technical_indicators(&code).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ErrorClass;
    use crate::mock::{AlwaysFailsSource, MockSource};
    use std::time::Duration as StdDuration;

    fn facade(sources: Vec<Arc<dyn MarketDataSource>>) -> DataProviderFacade {
        DataProviderFacade::new(sources, Arc::new(SourceHealthRegistry::new(3, StdDuration::from_secs(300))))
    }

    #[tokio::test]
    async fn failover_to_secondary_on_primary_timeout() {
        let primary = Arc::new(MockSource::new("primary"));
        primary.fail_next(10);
        let secondary = Arc::new(MockSource::new("secondary"));
        let f = facade(vec![primary.clone(), secondary.clone()]);

        let result = f.get_macro_data(None).await;
        assert!(result.is_ok());
        assert_eq!(f.health_registry().snapshot("primary").consecutive_errors, 1);
    }

    #[tokio::test]
    async fn e5_primary_cools_after_three_failures() {
        let primary = Arc::new(MockSource::new("primary"));
        primary.fail_next(100);
        let secondary = Arc::new(MockSource::new("secondary"));
        let f = facade(vec![primary.clone(), secondary.clone()]);

        for _ in 0..3 {
            assert!(f.get_macro_data(None).await.is_ok());
        }
        let snap = f.health_registry().snapshot("primary");
        assert_eq!(snap.consecutive_errors, 3);
        assert_eq!(snap.state, crate::health::HealthState::Cooling);
    }

    #[tokio::test]
    async fn all_sources_exhausted_yields_data_unavailable() {
        let a = Arc::new(AlwaysFailsSource::new("a", ErrorClass::Protocol));
        let b = Arc::new(AlwaysFailsSource::new("b", ErrorClass::Protocol));
        let f = facade(vec![a, b]);
        let result = f.get_macro_data(None).await;
        assert!(matches!(result, Err(AocError::DataUnavailable { .. })));
    }

    #[tokio::test]
    async fn policy_news_degrades_to_keyword_filtered_general_news_with_single_provider() {
        let a = Arc::new(AlwaysFailsSource::new("a", ErrorClass::Protocol));
        let f = facade(vec![a]);
        let result = f.get_policy_news(7).await.unwrap();
        assert!(result.iter().any(|n| n.categories.iter().any(|c| c == "policy")));
    }
}
