use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use aoc_agents::ChatModel;
use aoc_cache::{SqlxSqliteStore, TieredCache};
use aoc_core::state::{AgentState, ChatMessage, RequestSpec};
use aoc_core::{AocError, AocResult};
use aoc_providers::mock::MockSource;
use aoc_providers::{DataProviderFacade, SourceHealthRegistry};
use aoc_scheduler::{Scheduler, SchedulerConfig};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

mod config;

use config::RunConfig;

/// Stand-in for a real LLM provider. `aoc-cli` carries no concrete
/// `ChatModel` implementation by design — the capability is out of scope
/// for this workspace — so this binary demonstrates the pipeline by
/// returning a fixed, node-appropriate response rather than calling out
/// to any model. A real deployment would replace this with a provider
/// client behind the same trait.
struct DemoChatModel;

#[async_trait]
impl ChatModel for DemoChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> AocResult<ChatMessage> {
        let content = messages.last().and_then(|m| m.content.clone()).unwrap_or_default();

        let json = if content.contains("macroeconomic") {
            serde_json::json!({
                "analysis_summary": "growth steady, inflation contained, credit conditions accommodative",
                "confidence": 0.7, "economic_cycle": "expansion", "liquidity": "loose", "sentiment_score": 0.5
            })
        } else if content.contains("monetary and fiscal policy") {
            serde_json::json!({
                "analysis_summary": "policy stance remains broadly supportive of risk assets",
                "confidence": 0.65, "monetary_policy": "accommodative", "fiscal_policy": "neutral",
                "industry_policy": [], "long_term_policies": [], "overall_support_strength": "medium",
                "long_term_confidence": 0.6
            })
        } else if content.contains("sector rotation") {
            serde_json::json!({
                "analysis_summary": "rotation favors technology and semiconductors over defensives",
                "confidence": 0.6, "top_sectors": ["semiconductors"], "bottom_sectors": ["real_estate"],
                "rotation_trend": "steady", "hot_themes": ["ai"], "sentiment_score": 0.4
            })
        } else if content.contains("international news") {
            serde_json::json!({
                "analysis_summary": "no material cross-border catalysts in the lookback window",
                "confidence": 0.55, "impact_strength": "low", "impact_duration": "short", "key_news": []
            })
        } else if content.contains("technical posture") {
            serde_json::json!({
                "analysis_summary": "price holding above short-term moving averages with neutral momentum",
                "confidence": 0.6, "trend_signal": "NEUTRAL", "position_suggestion": 0.5,
                "key_levels": {"support": 2950.0, "resistance": 3100.0}
            })
        } else if content.contains("final position") {
            return Ok(ChatMessage::assistant_text(
                "Position sized moderately: supportive policy and sector flows are offset by a neutral technical reading.",
            ));
        } else {
            serde_json::json!({ "analysis_summary": "demo model has no route for this prompt", "confidence": 0.5 })
        };

        let content = serde_json::to_string(&json).map_err(|e| AocError::ArtifactParseFailed {
            node: "demo_chat_model".to_string(),
            reason: e.to_string(),
        })?;
        Ok(ChatMessage::assistant_text(content))
    }
}

fn init_tracing() {
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }
}

fn log_result(state: &AgentState) {
    match state.strategy_report.as_ref().and_then(|a| a.as_strategy()) {
        Some(strategy) => {
            tracing::info!(
                symbol = %state.request.symbol,
                final_position = strategy.final_position,
                confidence = strategy.confidence,
                outlook = ?strategy.market_outlook,
                "run complete"
            );
            tracing::info!(rationale = %strategy.decision_rationale);
        }
        None => {
            tracing::warn!(symbol = %state.request.symbol, "run complete without a strategy artifact (deadline exceeded?)");
        }
    }
    for (source, status) in &state.data_source_status {
        tracing::debug!(source = %source, available = status.available, "data source status");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("starting Analysis Orchestration Core run");

    let config = RunConfig::from_env()?;
    tracing::info!(
        symbol = %config.symbol,
        session_kind = ?config.session_kind,
        research_depth = ?config.research_depth,
        trade_date = %config.trade_date,
        "configuration loaded"
    );

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(SqliteConnectOptions::new().filename(&config.database_url.trim_start_matches("sqlite:")).create_if_missing(true))
        .await?;
    let store = SqlxSqliteStore::connect(pool).await?;
    let cache = Arc::new(TieredCache::new(Arc::new(store)));
    tracing::info!(database_url = %config.database_url, "cache persistence layer ready");

    let facade = Arc::new(DataProviderFacade::new(
        vec![
            Arc::new(MockSource::new("primary")),
            Arc::new(MockSource::new("secondary")),
        ],
        Arc::new(SourceHealthRegistry::with_defaults()),
    ));

    let scheduler = Scheduler::new(facade, cache, Arc::new(DemoChatModel)).with_config(SchedulerConfig {
        tool_timeout: Duration::from_secs(config.tool_timeout_seconds),
        deadline: Duration::from_secs(config.deadline_seconds),
        concurrency_limit: config.concurrency_limit,
    });

    let request = RequestSpec {
        symbol: config.symbol.clone(),
        market_type: config.market_type,
        session_kind: config.session_kind,
        trade_date: config.trade_date,
        research_depth: config.research_depth,
    };

    let state = scheduler.run(request).await;
    log_result(&state);

    Ok(())
}
