use async_trait::async_trait;
use chrono::NaiveDate;

use crate::data::{
    IndexBar, IndexConstituent, IndexValuation, MacroIndicators, NewsItem, ProviderError,
    SectorFlows, TechnicalIndicators,
};

/// A market-data source (spec §4.1, C1). The AOC core ships no concrete
/// HTTP/SDK client — that's named out of scope — only this trait boundary
/// plus deterministic mock implementations in [`crate::mock`] standing in
/// for a Tushare-like primary and an AKShare-like secondary.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn id(&self) -> &'static str;

    async fn get_macro_data(
        &self,
        end_date: Option<NaiveDate>,
    ) -> Result<MacroIndicators, ProviderError>;

    async fn get_policy_news(&self, lookback_days: u32) -> Result<Vec<NewsItem>, ProviderError>;

    async fn get_sector_flows(
        &self,
        trade_date: Option<NaiveDate>,
    ) -> Result<SectorFlows, ProviderError>;

    async fn get_index_daily(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndexBar>, ProviderError>;

    async fn get_index_constituents(
        &self,
        code: &str,
    ) -> Result<Vec<IndexConstituent>, ProviderError>;

    async fn get_index_valuation(&self, code: &str) -> Result<IndexValuation, ProviderError>;

    async fn get_latest_news(&self, limit: u32) -> Result<Vec<NewsItem>, ProviderError>;

    async fn get_international_news(
        &self,
        keywords: Option<&[String]>,
        lookback_days: u32,
    ) -> Result<Vec<NewsItem>, ProviderError>;

    async fn get_technical_indicators(
        &self,
        code: &str,
    ) -> Result<TechnicalIndicators, ProviderError>;
}
