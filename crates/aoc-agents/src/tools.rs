use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use aoc_core::AocResult;
use aoc_providers::DataProviderFacade;

/// A named, callable unit an analyst node can request via a tool-call
/// directive. Mirrors the `Arc<dyn MarketDataSource>` failover-list idiom
/// already used by the Facade, generalized to a name-keyed registry so the
/// Scheduler can dispatch by `ToolCallDirective::name` (spec §4.6).
#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(&self, arguments: Value) -> AocResult<Value>;
}

const DEFAULT_SECTOR_KEYWORDS: &[&str] = &["sector", "industry", "rotation"];

/// Name -> tool lookup table the Scheduler consults when a node's
/// assistant message carries tool-call directives. Names match spec.md
/// §6's required tool list exactly.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        self.tools.insert(name.into(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Builds the standard registry wired to a Facade: the eight tools
    /// named in spec.md §6, each backed by a `DataProviderFacade` call.
    pub fn with_facade(facade: Arc<DataProviderFacade>, trade_date: chrono::NaiveDate) -> Self {
        let mut registry = Self::new();
        registry.register(
            "fetch_macro_data",
            Arc::new(MacroTool { facade: facade.clone(), end_date: trade_date }),
        );
        registry.register(
            "fetch_policy_news",
            Arc::new(PolicyNewsTool { facade: facade.clone() }),
        );
        registry.register(
            "fetch_sector_rotation",
            Arc::new(SectorFlowsTool { facade: facade.clone(), trade_date }),
        );
        registry.register(
            "fetch_index_constituents",
            Arc::new(IndexConstituentsTool { facade: facade.clone() }),
        );
        registry.register(
            "fetch_sector_news",
            Arc::new(KeywordFilteredNewsTool { facade: facade.clone(), keywords: DEFAULT_SECTOR_KEYWORDS }),
        );
        registry.register(
            "fetch_stock_sector_info",
            Arc::new(StockSectorInfoTool { facade: facade.clone() }),
        );
        registry.register(
            "fetch_multi_source_news",
            Arc::new(MultiSourceNewsTool { facade: facade.clone() }),
        );
        registry.register(
            "fetch_technical_indicators",
            Arc::new(TechnicalTool { facade }),
        );
        registry
    }
}

struct MacroTool {
    facade: Arc<DataProviderFacade>,
    end_date: chrono::NaiveDate,
}

#[async_trait]
impl Tool for MacroTool {
    async fn call(&self, _arguments: Value) -> AocResult<Value> {
        let data = self.facade.get_macro_data(Some(self.end_date)).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

struct PolicyNewsTool {
    facade: Arc<DataProviderFacade>,
}

#[async_trait]
impl Tool for PolicyNewsTool {
    async fn call(&self, arguments: Value) -> AocResult<Value> {
        let lookback_days = arguments
            .get("lookback_days")
            .and_then(Value::as_u64)
            .unwrap_or(7) as u32;
        let data = self.facade.get_policy_news(lookback_days).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

struct SectorFlowsTool {
    facade: Arc<DataProviderFacade>,
    trade_date: chrono::NaiveDate,
}

#[async_trait]
impl Tool for SectorFlowsTool {
    async fn call(&self, _arguments: Value) -> AocResult<Value> {
        let data = self.facade.get_sector_flows(Some(self.trade_date)).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

struct IndexConstituentsTool {
    facade: Arc<DataProviderFacade>,
}

#[async_trait]
impl Tool for IndexConstituentsTool {
    async fn call(&self, arguments: Value) -> AocResult<Value> {
        let code = arguments.get("code").and_then(Value::as_str).unwrap_or_default();
        let data = self.facade.get_index_constituents(code).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

/// Backs `fetch_sector_news`: the Facade has no dedicated sector-news
/// endpoint, so this filters the general news feed the same way the
/// Facade itself degrades policy/international news (spec §4.1).
struct KeywordFilteredNewsTool {
    facade: Arc<DataProviderFacade>,
    keywords: &'static [&'static str],
}

#[async_trait]
impl Tool for KeywordFilteredNewsTool {
    async fn call(&self, _arguments: Value) -> AocResult<Value> {
        let general = self.facade.get_latest_news(100).await?;
        let filtered: Vec<_> = general
            .into_iter()
            .filter(|item| {
                let haystack = item.keywords.join(" ").to_lowercase()
                    + " "
                    + &item.categories.join(" ").to_lowercase()
                    + " "
                    + &item.title.to_lowercase();
                self.keywords.iter().any(|kw| haystack.contains(kw))
            })
            .collect();
        Ok(serde_json::to_value(filtered).unwrap_or(Value::Null))
    }
}

/// Backs `fetch_stock_sector_info`: valuation context for a symbol,
/// the closest primitive the Facade exposes for "which sector state is
/// this stock embedded in".
struct StockSectorInfoTool {
    facade: Arc<DataProviderFacade>,
}

#[async_trait]
impl Tool for StockSectorInfoTool {
    async fn call(&self, arguments: Value) -> AocResult<Value> {
        let code = arguments.get("code").and_then(Value::as_str).unwrap_or_default();
        let data = self.facade.get_index_valuation(code).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

struct MultiSourceNewsTool {
    facade: Arc<DataProviderFacade>,
}

#[async_trait]
impl Tool for MultiSourceNewsTool {
    async fn call(&self, arguments: Value) -> AocResult<Value> {
        let limit = arguments.get("limit").and_then(Value::as_u64).unwrap_or(10) as u32;
        let data = self.facade.get_latest_news(limit).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

struct TechnicalTool {
    facade: Arc<DataProviderFacade>,
}

#[async_trait]
impl Tool for TechnicalTool {
    async fn call(&self, arguments: Value) -> AocResult<Value> {
        let code = arguments
            .get("code")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let data = self.facade.get_technical_indicators(code).await?;
        Ok(serde_json::to_value(data).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_providers::mock::MockSource;
    use aoc_providers::SourceHealthRegistry;
    use chrono::NaiveDate;

    fn registry() -> ToolRegistry {
        let facade = Arc::new(DataProviderFacade::new(
            vec![Arc::new(MockSource::new("primary"))],
            Arc::new(SourceHealthRegistry::with_defaults()),
        ));
        ToolRegistry::with_facade(facade, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
    }

    #[tokio::test]
    async fn registry_resolves_registered_tool_by_name() {
        let tool = registry().get("fetch_macro_data").expect("tool registered");
        let result = tool.call(Value::Null).await.unwrap();
        assert!(result.get("gdp_yoy").is_some());
    }

    #[tokio::test]
    async fn all_eight_required_tools_are_registered() {
        let registry = registry();
        for name in [
            "fetch_macro_data",
            "fetch_policy_news",
            "fetch_sector_rotation",
            "fetch_index_constituents",
            "fetch_sector_news",
            "fetch_stock_sector_info",
            "fetch_multi_source_news",
            "fetch_technical_indicators",
        ] {
            assert!(registry.get(name).is_some(), "missing tool {name}");
        }
    }

    #[tokio::test]
    async fn unknown_tool_name_is_absent() {
        assert!(registry().get("not_a_real_tool").is_none());
    }
}
