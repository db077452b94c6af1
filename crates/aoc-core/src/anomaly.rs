use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Surge,
    Drop,
}

/// A surge/drop event detected by the Snapshot Engine (C9) when comparing
/// a freshly-built snapshot against its predecessor. No analyst node is
/// required to consume these; they are an enrichment surfaced to callers
/// (spec.md §3 declares the type without assigning it a consuming
/// operation — see SPEC_FULL.md supplement #4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub symbol: String,
    pub name: Option<String>,
    pub kind: AnomalyKind,
    pub change_percent: f64,
    pub trigger_price: f64,
    pub previous_price: f64,
    pub volume: f64,
    pub detected_at: DateTime<Utc>,
}

/// Default surge/drop threshold used by the Snapshot Engine.
pub const DEFAULT_ANOMALY_THRESHOLD_PERCENT: f64 = 5.0;

pub fn detect_anomaly(
    symbol: &str,
    name: Option<String>,
    previous_price: f64,
    trigger_price: f64,
    volume: f64,
    threshold_percent: f64,
    detected_at: DateTime<Utc>,
) -> Option<AnomalyEvent> {
    if previous_price <= 0.0 {
        return None;
    }
    let change_percent = (trigger_price - previous_price) / previous_price * 100.0;
    if change_percent.abs() < threshold_percent {
        return None;
    }
    let kind = if change_percent > 0.0 {
        AnomalyKind::Surge
    } else {
        AnomalyKind::Drop
    };
    Some(AnomalyEvent {
        symbol: symbol.to_string(),
        name,
        kind,
        change_percent,
        trigger_price,
        previous_price,
        volume,
        detected_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_surge_above_threshold() {
        let now = Utc::now();
        let event = detect_anomaly("600519.SH", None, 100.0, 108.0, 1_000.0, 5.0, now).unwrap();
        assert_eq!(event.kind, AnomalyKind::Surge);
        assert!((event.change_percent - 8.0).abs() < 1e-9);
    }

    #[test]
    fn ignores_moves_below_threshold() {
        let now = Utc::now();
        assert!(detect_anomaly("600519.SH", None, 100.0, 102.0, 1_000.0, 5.0, now).is_none());
    }
}
