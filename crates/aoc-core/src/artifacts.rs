use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field-name fragments that must never appear in a Policy artifact.
/// The Policy analyst is a pure input to Strategy; it must not pre-empt
/// the position decision.
pub const BANNED_POLICY_FIELD_PATTERNS: &[&str] =
    &["position", "recommended_position", "position_adjustment"];

/// Walks a raw JSON object (as extracted from a model's assistant message,
/// before typed deserialization) and returns the offending keys, if any,
/// that match a banned pattern. Used by the Policy node before it accepts
/// an artifact, and by `normalize_policy_artifact` as a defense-in-depth
/// second pass.
pub fn find_banned_fields(raw: &Value) -> Vec<String> {
    let mut hits = Vec::new();
    if let Value::Object(map) = raw {
        collect_banned_fields(map, &mut hits);
    }
    hits
}

fn collect_banned_fields(map: &Map<String, Value>, hits: &mut Vec<String>) {
    for (key, value) in map {
        let lower = key.to_ascii_lowercase();
        if BANNED_POLICY_FIELD_PATTERNS
            .iter()
            .any(|pat| lower.contains(pat))
        {
            hits.push(key.clone());
        }
        if let Value::Object(nested) = value {
            collect_banned_fields(nested, hits);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EconomicCycle {
    Recovery,
    Expansion,
    Stagflation,
    Recession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Liquidity {
    Loose,
    Neutral,
    Tight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportStrength {
    Strong,
    Medium,
    Weak,
}

impl SupportStrength {
    /// Numeric mapping used by the Strategy Decision Function (spec §4.7 step 1).
    pub fn to_score(self) -> f64 {
        match self {
            SupportStrength::Strong => 1.0,
            SupportStrength::Medium => 0.6,
            SupportStrength::Weak => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactStrength {
    High,
    Medium,
    Low,
}

impl ImpactStrength {
    pub fn to_score(self) -> f64 {
        match self {
            ImpactStrength::High => 0.9,
            ImpactStrength::Medium => 0.6,
            ImpactStrength::Low => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactDuration {
    Short,
    Medium,
    Long,
}

impl ImpactDuration {
    /// `dur_weight` in spec §4.7 step 2.
    pub fn weight(self) -> f64 {
        match self {
            ImpactDuration::Short => 0.5,
            ImpactDuration::Medium => 1.0,
            ImpactDuration::Long => 1.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendSignal {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketOutlook {
    Bullish,
    Neutral,
    Bearish,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroAnalysis {
    pub analysis_summary: String,
    pub confidence: f64,
    pub economic_cycle: EconomicCycle,
    pub liquidity: Liquidity,
    pub sentiment_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTermPolicy {
    pub name: String,
    pub duration: String,
    pub support_strength: SupportStrength,
    #[serde(default)]
    pub beneficiary_sectors: Vec<String>,
    pub policy_continuity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyAnalysis {
    pub analysis_summary: String,
    pub confidence: f64,
    pub monetary_policy: String,
    pub fiscal_policy: String,
    #[serde(default)]
    pub industry_policy: Vec<String>,
    #[serde(default)]
    pub long_term_policies: Vec<LongTermPolicy>,
    pub overall_support_strength: SupportStrength,
    pub long_term_confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorAnalysis {
    pub analysis_summary: String,
    pub confidence: f64,
    #[serde(default)]
    pub top_sectors: Vec<String>,
    #[serde(default)]
    pub bottom_sectors: Vec<String>,
    pub rotation_trend: String,
    #[serde(default)]
    pub hot_themes: Vec<String>,
    pub sentiment_score: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeyLevels {
    pub support: f64,
    pub resistance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnicalAnalysis {
    pub analysis_summary: String,
    pub confidence: f64,
    pub trend_signal: TrendSignal,
    pub position_suggestion: f64,
    pub key_levels: KeyLevels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyNewsItem {
    pub category: String,
    pub title: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntlNewsAnalysis {
    pub analysis_summary: String,
    pub confidence: f64,
    pub impact_strength: ImpactStrength,
    pub impact_duration: ImpactDuration,
    #[serde(default)]
    pub key_news: Vec<KeyNewsItem>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PositionBreakdown {
    pub core_holding: f64,
    pub tactical_allocation: f64,
    pub cash_reserve: f64,
}

impl PositionBreakdown {
    pub fn sums_to_one(&self, tolerance: f64) -> bool {
        let total = self.core_holding + self.tactical_allocation + self.cash_reserve;
        (total - 1.0).abs() <= tolerance
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentTriggers {
    pub increase_to: f64,
    pub increase_condition: String,
    pub decrease_to: f64,
    pub decrease_condition: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyArtifact {
    pub analysis_summary: String,
    pub confidence: f64,
    pub final_position: f64,
    pub position_breakdown: PositionBreakdown,
    pub adjustment_triggers: AdjustmentTriggers,
    pub market_outlook: MarketOutlook,
    pub decision_rationale: String,
}

/// The typed output of any analyst node (C5) or of the Strategy Decision
/// Function (C7). Internally tagged by `kind` per spec §3; the JSON shape
/// on the wire is `{"kind": "macro", ...fields}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalystArtifact {
    Macro(MacroAnalysis),
    Policy(PolicyAnalysis),
    Sector(SectorAnalysis),
    Technical(TechnicalAnalysis),
    IntlNews(IntlNewsAnalysis),
    Strategy(StrategyArtifact),
}

impl AnalystArtifact {
    pub fn confidence(&self) -> f64 {
        match self {
            AnalystArtifact::Macro(a) => a.confidence,
            AnalystArtifact::Policy(a) => a.confidence,
            AnalystArtifact::Sector(a) => a.confidence,
            AnalystArtifact::Technical(a) => a.confidence,
            AnalystArtifact::IntlNews(a) => a.confidence,
            AnalystArtifact::Strategy(a) => a.confidence,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AnalystArtifact::Macro(_) => "macro",
            AnalystArtifact::Policy(_) => "policy",
            AnalystArtifact::Sector(_) => "sector",
            AnalystArtifact::Technical(_) => "technical",
            AnalystArtifact::IntlNews(_) => "intl_news",
            AnalystArtifact::Strategy(_) => "strategy",
        }
    }

    pub fn as_policy(&self) -> Option<&PolicyAnalysis> {
        match self {
            AnalystArtifact::Policy(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_macro(&self) -> Option<&MacroAnalysis> {
        match self {
            AnalystArtifact::Macro(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_sector(&self) -> Option<&SectorAnalysis> {
        match self {
            AnalystArtifact::Sector(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_intl_news(&self) -> Option<&IntlNewsAnalysis> {
        match self {
            AnalystArtifact::IntlNews(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_technical(&self) -> Option<&TechnicalAnalysis> {
        match self {
            AnalystArtifact::Technical(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_strategy(&self) -> Option<&StrategyArtifact> {
        match self {
            AnalystArtifact::Strategy(a) => Some(a),
            _ => None,
        }
    }
}

/// Re-normalises a Strategy breakdown that drifted from 1.0 due to
/// floating point rounding (spec §4.7 step 6, §7 InvariantViolation).
pub fn renormalize_breakdown(breakdown: PositionBreakdown) -> PositionBreakdown {
    let total = breakdown.core_holding + breakdown.tactical_allocation + breakdown.cash_reserve;
    if total <= 0.0 || (total - 1.0).abs() < 1e-9 {
        return breakdown;
    }
    PositionBreakdown {
        core_holding: breakdown.core_holding / total,
        tactical_allocation: breakdown.tactical_allocation / total,
        cash_reserve: breakdown.cash_reserve / total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_banned_fields_nested() {
        let raw = serde_json::json!({
            "overall_support_strength": "strong",
            "nested": { "base_position_recommendation": 0.6 }
        });
        let hits = find_banned_fields(&raw);
        assert_eq!(hits, vec!["base_position_recommendation".to_string()]);
    }

    #[test]
    fn no_banned_fields_on_clean_policy_payload() {
        let raw = serde_json::json!({
            "monetary_policy": "accommodative",
            "overall_support_strength": "strong"
        });
        assert!(find_banned_fields(&raw).is_empty());
    }

    #[test]
    fn renormalize_fixes_rounding_drift() {
        let drifted = PositionBreakdown {
            core_holding: 0.40,
            tactical_allocation: 0.30,
            cash_reserve: 0.29,
        };
        let fixed = renormalize_breakdown(drifted);
        assert!(fixed.sums_to_one(1e-6));
    }
}
