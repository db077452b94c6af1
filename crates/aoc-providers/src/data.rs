use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroIndicators {
    pub as_of: NaiveDate,
    pub gdp_yoy: Option<f64>,
    pub cpi_yoy: Option<f64>,
    pub pmi: Option<f64>,
    pub m2_yoy: Option<f64>,
    pub lpr_1y: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub summary: Option<String>,
    pub source: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorFlow {
    pub sector: String,
    pub net_inflow: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorFlows {
    pub top: Vec<SectorFlow>,
    pub bottom: Vec<SectorFlow>,
    pub all: Vec<SectorFlow>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConstituent {
    pub code: String,
    pub name: String,
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexValuation {
    pub pe: Option<f64>,
    pub pb: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalIndicators {
    pub ma: HashMap<String, f64>,
    pub macd: Option<f64>,
    pub rsi: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
}

/// Classification used for health-registry bookkeeping and observability
/// (spec §4.1 step 4, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Timeout,
    Empty,
    Protocol,
    Quota,
}

#[derive(Debug, Clone)]
pub struct ProviderError {
    pub class: ErrorClass,
    pub message: String,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.class, self.message)
    }
}

impl ProviderError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Timeout,
            message: message.into(),
        }
    }
    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Empty,
            message: message.into(),
        }
    }
    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Protocol,
            message: message.into(),
        }
    }
    pub fn quota(message: impl Into<String>) -> Self {
        Self {
            class: ErrorClass::Quota,
            message: message.into(),
        }
    }
}
