use std::env;

use anyhow::{bail, Result};
use aoc_core::state::{MarketType, ResearchDepth, SessionKind};
use chrono::NaiveDate;

/// Environment-driven configuration for a single `aoc` run, following
/// `trading-agent::config::AgentConfig`'s `from_env` pattern: every field
/// has a sensible default, nothing here needs a live API key since the
/// pipeline is wired to deterministic mock providers.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub symbol: String,
    pub market_type: MarketType,
    pub session_kind: SessionKind,
    pub trade_date: NaiveDate,
    pub research_depth: ResearchDepth,

    pub deadline_seconds: u64,
    pub tool_timeout_seconds: u64,
    pub concurrency_limit: usize,

    pub database_url: String,
}

fn parse_market_type(raw: &str) -> Result<MarketType> {
    match raw.to_ascii_lowercase().as_str() {
        "a_share" | "ashare" | "a" => Ok(MarketType::AShare),
        "hk" => Ok(MarketType::Hk),
        "us" => Ok(MarketType::Us),
        other => bail!("unrecognized MARKET_TYPE '{other}' (expected a_share, hk, or us)"),
    }
}

fn parse_session_kind(raw: &str) -> Result<SessionKind> {
    match raw.to_ascii_lowercase().as_str() {
        "morning" => Ok(SessionKind::Morning),
        "closing" => Ok(SessionKind::Closing),
        "post" => Ok(SessionKind::Post),
        other => bail!("unrecognized SESSION_KIND '{other}' (expected morning, closing, or post)"),
    }
}

fn parse_research_depth(raw: &str) -> Result<ResearchDepth> {
    match raw.to_ascii_lowercase().as_str() {
        "quick" => Ok(ResearchDepth::Quick),
        "standard" => Ok(ResearchDepth::Standard),
        "deep" => Ok(ResearchDepth::Deep),
        other => bail!("unrecognized RESEARCH_DEPTH '{other}' (expected quick, standard, or deep)"),
    }
}

impl RunConfig {
    pub fn from_env() -> Result<Self> {
        let trade_date = match env::var("TRADE_DATE") {
            Ok(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")?,
            Err(_) => chrono::Utc::now().date_naive(),
        };

        Ok(Self {
            symbol: env::var("SYMBOL").unwrap_or_else(|_| "600519.SH".to_string()),
            market_type: match env::var("MARKET_TYPE") {
                Ok(raw) => parse_market_type(&raw)?,
                Err(_) => MarketType::AShare,
            },
            session_kind: match env::var("SESSION_KIND") {
                Ok(raw) => parse_session_kind(&raw)?,
                Err(_) => SessionKind::Morning,
            },
            trade_date,
            research_depth: match env::var("RESEARCH_DEPTH") {
                Ok(raw) => parse_research_depth(&raw)?,
                Err(_) => ResearchDepth::Standard,
            },

            deadline_seconds: env::var("SCHEDULER_DEADLINE_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()?,
            tool_timeout_seconds: env::var("SCHEDULER_TOOL_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            concurrency_limit: env::var("SCHEDULER_CONCURRENCY_LIMIT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,

            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:aoc_cache.db".to_string()),
        })
    }
}
