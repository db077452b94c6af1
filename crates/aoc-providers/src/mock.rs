use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate, Utc};

use crate::data::{
    ErrorClass, IndexBar, IndexConstituent, IndexValuation, MacroIndicators, NewsItem,
    ProviderError, SectorFlow, SectorFlows, TechnicalIndicators,
};
use crate::source::MarketDataSource;

/// Deterministic, in-memory stand-in for a Tushare-like or AKShare-like
/// provider. `fail_next_n` lets tests script an outage window (spec §4.1
/// scenario E5: "primary returns timeout ... after 3 such failures,
/// primary is cooled").
pub struct MockSource {
    id: &'static str,
    fail_next_n: Arc<AtomicU32>,
}

impl MockSource {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            fail_next_n: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Makes the next `n` calls to any operation fail with a timeout.
    pub fn fail_next(&self, n: u32) {
        self.fail_next_n.store(n, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<(), ProviderError> {
        let remaining = self.fail_next_n.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_n.store(remaining - 1, Ordering::SeqCst);
            return Err(ProviderError::timeout(format!("{} simulated timeout", self.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataSource for MockSource {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn get_macro_data(
        &self,
        end_date: Option<NaiveDate>,
    ) -> Result<MacroIndicators, ProviderError> {
        self.maybe_fail()?;
        Ok(MacroIndicators {
            as_of: end_date.unwrap_or_else(|| Utc::now().date_naive()),
            gdp_yoy: Some(5.2),
            cpi_yoy: Some(0.3),
            pmi: Some(50.1),
            m2_yoy: Some(8.1),
            lpr_1y: Some(3.45),
        })
    }

    async fn get_policy_news(&self, lookback_days: u32) -> Result<Vec<NewsItem>, ProviderError> {
        self.maybe_fail()?;
        let now = Utc::now();
        Ok(vec![NewsItem {
            title: "Central bank reiterates supportive stance".to_string(),
            summary: Some("Monetary policy remains accommodative.".to_string()),
            source: self.id.to_string(),
            published_at: now - ChronoDuration::days(lookback_days.min(1) as i64),
            keywords: vec!["policy".to_string(), "monetary".to_string()],
            categories: vec!["policy".to_string()],
        }])
    }

    async fn get_sector_flows(
        &self,
        _trade_date: Option<NaiveDate>,
    ) -> Result<SectorFlows, ProviderError> {
        self.maybe_fail()?;
        Ok(SectorFlows {
            top: vec![SectorFlow {
                sector: "semiconductors".to_string(),
                net_inflow: 1.2e9,
            }],
            bottom: vec![SectorFlow {
                sector: "real_estate".to_string(),
                net_inflow: -8.0e8,
            }],
            all: vec![],
        })
    }

    async fn get_index_daily(
        &self,
        _code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndexBar>, ProviderError> {
        self.maybe_fail()?;
        let mut bars = Vec::new();
        let mut date = start;
        let mut price = 3000.0;
        while date <= end {
            bars.push(IndexBar {
                date,
                open: price,
                high: price * 1.01,
                low: price * 0.99,
                close: price * 1.002,
                volume: 1.0e8,
            });
            price *= 1.002;
            date += ChronoDuration::days(1);
        }
        Ok(bars)
    }

    async fn get_index_constituents(
        &self,
        code: &str,
    ) -> Result<Vec<IndexConstituent>, ProviderError> {
        self.maybe_fail()?;
        Ok(vec![IndexConstituent {
            code: format!("{}-001", code),
            name: "Sample Constituent".to_string(),
            weight: Some(0.05),
        }])
    }

    async fn get_index_valuation(&self, _code: &str) -> Result<IndexValuation, ProviderError> {
        self.maybe_fail()?;
        Ok(IndexValuation {
            pe: Some(14.2),
            pb: Some(1.6),
        })
    }

    async fn get_latest_news(&self, limit: u32) -> Result<Vec<NewsItem>, ProviderError> {
        self.maybe_fail()?;
        let now = Utc::now();
        let items = [
            ("Chipmakers rally on export policy easing", vec!["policy", "sector"]),
            ("International central banks signal rate pause", vec!["international", "macro"]),
            ("Regulator proposes new industry policy support", vec!["policy"]),
        ];
        Ok(items
            .into_iter()
            .take(limit as usize)
            .map(|(title, cats)| NewsItem {
                title: title.to_string(),
                summary: None,
                source: self.id.to_string(),
                published_at: now,
                keywords: cats.iter().map(|s| s.to_string()).collect(),
                categories: cats.iter().map(|s| s.to_string()).collect(),
            })
            .collect())
    }

    async fn get_international_news(
        &self,
        keywords: Option<&[String]>,
        lookback_days: u32,
    ) -> Result<Vec<NewsItem>, ProviderError> {
        self.maybe_fail()?;
        let now = Utc::now();
        let mut item = NewsItem {
            title: "Fed holds rates amid global uncertainty".to_string(),
            summary: None,
            source: self.id.to_string(),
            published_at: now - ChronoDuration::days(lookback_days.min(1) as i64),
            keywords: vec!["international".to_string(), "rates".to_string()],
            categories: vec!["international".to_string()],
        };
        if let Some(kw) = keywords {
            item.keywords.extend(kw.iter().cloned());
        }
        Ok(vec![item])
    }

    async fn get_technical_indicators(
        &self,
        _code: &str,
    ) -> Result<TechnicalIndicators, ProviderError> {
        self.maybe_fail()?;
        let mut ma = std::collections::HashMap::new();
        ma.insert("ma5".to_string(), 3010.0);
        ma.insert("ma20".to_string(), 2995.0);
        Ok(TechnicalIndicators {
            ma,
            macd: Some(1.2),
            rsi: Some(58.0),
            kdj_k: Some(62.0),
            kdj_d: Some(55.0),
            kdj_j: Some(76.0),
        })
    }
}

/// A source that fails every call deterministically, for testing total
/// Facade exhaustion (spec §4.1 "If all sources fail ... returns an
/// empty-but-well-typed result plus a structured error").
pub struct AlwaysFailsSource {
    id: &'static str,
    class: ErrorClass,
}

impl AlwaysFailsSource {
    pub fn new(id: &'static str, class: ErrorClass) -> Self {
        Self { id, class }
    }

    fn err(&self) -> ProviderError {
        ProviderError {
            class: self.class,
            message: format!("{} unavailable", self.id),
        }
    }
}

#[async_trait]
impl MarketDataSource for AlwaysFailsSource {
    fn id(&self) -> &'static str {
        self.id
    }
    async fn get_macro_data(&self, _: Option<NaiveDate>) -> Result<MacroIndicators, ProviderError> {
        Err(self.err())
    }
    async fn get_policy_news(&self, _: u32) -> Result<Vec<NewsItem>, ProviderError> {
        Err(self.err())
    }
    async fn get_sector_flows(&self, _: Option<NaiveDate>) -> Result<SectorFlows, ProviderError> {
        Err(self.err())
    }
    async fn get_index_daily(
        &self,
        _: &str,
        _: NaiveDate,
        _: NaiveDate,
    ) -> Result<Vec<IndexBar>, ProviderError> {
        Err(self.err())
    }
    async fn get_index_constituents(&self, _: &str) -> Result<Vec<IndexConstituent>, ProviderError> {
        Err(self.err())
    }
    async fn get_index_valuation(&self, _: &str) -> Result<IndexValuation, ProviderError> {
        Err(self.err())
    }
    async fn get_latest_news(&self, _: u32) -> Result<Vec<NewsItem>, ProviderError> {
        Err(self.err())
    }
    async fn get_international_news(
        &self,
        _: Option<&[String]>,
        _: u32,
    ) -> Result<Vec<NewsItem>, ProviderError> {
        Err(self.err())
    }
    async fn get_technical_indicators(&self, _: &str) -> Result<TechnicalIndicators, ProviderError> {
        Err(self.err())
    }
}
