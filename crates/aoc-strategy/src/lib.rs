use aoc_core::artifacts::{
    renormalize_breakdown, AdjustmentTriggers, AnalystArtifact, ImpactDuration, ImpactStrength,
    MarketOutlook, PositionBreakdown, StrategyArtifact, SupportStrength, TrendSignal,
};
use aoc_core::state::SessionKind;

const BASE_POLICY_WEIGHT: f64 = 0.4;
const BASE_INTL_WEIGHT: f64 = 0.3;
const BASE_SECTOR_WEIGHT: f64 = 0.3;
const MACRO_ADJUSTMENT_WEIGHT: f64 = 0.1;
const BASE_POSITION_FLOOR: f64 = 0.15;
const BASE_POSITION_CEILING: f64 = 0.90;

const DEGRADED_FINAL_POSITION: f64 = 0.5;
const DEGRADED_CONFIDENCE: f64 = 0.3;

/// Every signal the Strategy Decision Function is allowed to read, lifted
/// out of the four (optionally five) upstream artifacts. Nothing outside
/// this struct participates in the decision — the responsibility-
/// separation invariant (spec §4.7) means the function never reaches back
/// into the raw artifacts for a position-like field.
#[derive(Debug, Clone, Default)]
struct Signals {
    macro_sent: Option<f64>,
    macro_conf: Option<f64>,
    policy_score: Option<f64>,
    policy_conf: Option<f64>,
    intl_score: Option<f64>,
    intl_conf: Option<f64>,
    intl_dur_weight: Option<f64>,
    sector_sent: Option<f64>,
    sector_conf: Option<f64>,
    tech_signal: Option<TrendSignal>,
    key_news_categories: Vec<String>,
}

fn support_strength_score(s: SupportStrength) -> f64 {
    s.to_score()
}

/// Extracts the enumerated §4.7 step-1 signals from upstream artifacts.
/// Any artifact that is absent or of the wrong kind simply leaves its
/// signals at `None` — callers decide what to do with missing inputs.
fn extract_signals(
    macro_report: Option<&AnalystArtifact>,
    policy_report: Option<&AnalystArtifact>,
    sector_report: Option<&AnalystArtifact>,
    intl_report: Option<&AnalystArtifact>,
    technical_report: Option<&AnalystArtifact>,
) -> Signals {
    let mut signals = Signals::default();

    if let Some(m) = macro_report.and_then(AnalystArtifact::as_macro) {
        signals.macro_sent = Some(m.sentiment_score.clamp(-1.0, 1.0));
        signals.macro_conf = Some(m.confidence.clamp(0.0, 1.0));
    }

    if let Some(p) = policy_report.and_then(AnalystArtifact::as_policy) {
        signals.policy_score = Some(support_strength_score(p.overall_support_strength));
        signals.policy_conf = Some(p.confidence.clamp(0.0, 1.0));
    }

    if let Some(s) = sector_report.and_then(AnalystArtifact::as_sector) {
        signals.sector_sent = Some(s.sentiment_score.clamp(-1.0, 1.0));
        signals.sector_conf = Some(s.confidence.clamp(0.0, 1.0));
    }

    if let Some(n) = intl_report.and_then(AnalystArtifact::as_intl_news) {
        signals.intl_score = Some(impact_strength_score(n.impact_strength));
        signals.intl_conf = Some(n.confidence.clamp(0.0, 1.0));
        signals.intl_dur_weight = Some(n.impact_duration.weight());
        signals.key_news_categories = n.key_news.iter().map(|k| k.category.clone()).collect();
    }

    if let Some(t) = technical_report.and_then(AnalystArtifact::as_technical) {
        signals.tech_signal = Some(t.trend_signal);
    }

    signals
}

fn impact_strength_score(strength: ImpactStrength) -> f64 {
    strength.to_score()
}

fn technical_overlay(tech_signal: Option<TrendSignal>, session_kind: SessionKind) -> f64 {
    let (bullish_delta, bearish_delta) = match session_kind {
        SessionKind::Morning => (0.10, -0.10),
        SessionKind::Closing => (0.05, -0.05),
        SessionKind::Post => (0.0, 0.0),
    };
    match tech_signal {
        Some(TrendSignal::Bullish) => bullish_delta,
        Some(TrendSignal::Bearish) => bearish_delta,
        Some(TrendSignal::Neutral) | None => 0.0,
    }
}

fn has_policy_rumor_to_official(categories: &[String]) -> bool {
    categories.iter().any(|c| {
        let lower = c.to_ascii_lowercase();
        lower.contains("rumor") || lower.contains("official")
    })
}

fn has_macro_shock_or_tech_reversal(
    macro_sent: Option<f64>,
    tech_signal: Option<TrendSignal>,
    final_position: f64,
) -> bool {
    let macro_shock = macro_sent.map(|s| s.abs() >= 0.6).unwrap_or(false);
    let tech_reversal = matches!(tech_signal, Some(TrendSignal::Bearish)) && final_position > 0.5;
    macro_shock || tech_reversal
}

fn market_outlook(final_position: f64) -> MarketOutlook {
    if final_position >= 0.6 {
        MarketOutlook::Bullish
    } else if final_position <= 0.35 {
        MarketOutlook::Bearish
    } else {
        MarketOutlook::Neutral
    }
}

fn position_breakdown(final_position: f64, policy_score: f64) -> PositionBreakdown {
    let core_factor = if policy_score >= 0.6 { 1.0 } else { 0.75 };
    let core_holding = final_position.min(0.4) * core_factor;
    let tactical_allocation = (final_position - core_holding).max(0.0);
    let cash_reserve = 1.0 - core_holding - tactical_allocation;
    let breakdown = PositionBreakdown {
        core_holding,
        tactical_allocation,
        cash_reserve,
    };
    if breakdown.sums_to_one(1e-6) {
        breakdown
    } else {
        renormalize_breakdown(breakdown)
    }
}

/// A closure producing decision-rationale prose from the computed numeric
/// decision. The Strategy Advisor node (C5) supplies one backed by a
/// `ChatModel`; tests and non-interactive callers can pass a fixed string.
/// The numeric fields are always computed here first and handed to the
/// closure read-only — the function's authority over the number can never
/// be overridden by rationale generation (spec §4.7 step 9).
pub trait RationaleProvider {
    fn rationale(&self, inputs: &DecisionInputs, final_position: f64) -> String;
}

impl<F: Fn(&DecisionInputs, f64) -> String> RationaleProvider for F {
    fn rationale(&self, inputs: &DecisionInputs, final_position: f64) -> String {
        self(inputs, final_position)
    }
}

/// Structured view of the signals a rationale generator is allowed to see.
#[derive(Debug, Clone)]
pub struct DecisionInputs {
    pub macro_sent: Option<f64>,
    pub policy_score: Option<f64>,
    pub intl_score: Option<f64>,
    pub sector_sent: Option<f64>,
    pub tech_signal: Option<TrendSignal>,
    pub session_kind: SessionKind,
}

/// Runs the full pure decision pipeline (spec §4.7 steps 1-8) and returns
/// the artifact with `decision_rationale` left empty for the caller to
/// fill via [`RationaleProvider`]. No LLM or tool call happens in this
/// crate at all.
pub fn decide(
    macro_report: Option<&AnalystArtifact>,
    policy_report: Option<&AnalystArtifact>,
    sector_report: Option<&AnalystArtifact>,
    intl_report: Option<&AnalystArtifact>,
    technical_report: Option<&AnalystArtifact>,
    session_kind: SessionKind,
) -> StrategyArtifact {
    let signals = extract_signals(
        macro_report,
        policy_report,
        sector_report,
        intl_report,
        technical_report,
    );

    let all_primaries_present =
        signals.macro_sent.is_some() && signals.policy_score.is_some() && signals.sector_sent.is_some();

    if !all_primaries_present {
        tracing::warn!(
            macro_present = signals.macro_sent.is_some(),
            policy_present = signals.policy_score.is_some(),
            sector_present = signals.sector_sent.is_some(),
            "strategy decision degraded: macro, policy, and sector artifacts must all be present"
        );
        return degraded_artifact(session_kind);
    }

    let policy_score = signals.policy_score.unwrap_or(0.0);
    let policy_conf = signals.policy_conf.unwrap_or(0.0);
    let intl_score = signals.intl_score.unwrap_or(0.0);
    let intl_conf = signals.intl_conf.unwrap_or(0.0);
    let dur_weight = signals.intl_dur_weight.unwrap_or(1.0);
    let sector_sent = signals.sector_sent.unwrap_or(0.0);
    let sector_conf = signals.sector_conf.unwrap_or(0.0);

    let raw = BASE_POLICY_WEIGHT * policy_score * policy_conf
        + BASE_INTL_WEIGHT * intl_score * intl_conf * dur_weight
        + BASE_SECTOR_WEIGHT * ((sector_sent + 1.0) / 2.0) * sector_conf;
    let base = raw.clamp(BASE_POSITION_FLOOR, BASE_POSITION_CEILING);

    let adj_macro = signals.macro_sent.unwrap_or(0.0) * MACRO_ADJUSTMENT_WEIGHT * signals.macro_conf.unwrap_or(0.0);
    let adj_tech = technical_overlay(signals.tech_signal, session_kind);

    let final_position = (base + adj_macro + adj_tech).clamp(0.0, 1.0);

    let breakdown = position_breakdown(final_position, policy_score);

    let increase_condition = if has_policy_rumor_to_official(&signals.key_news_categories) {
        "policy rumor confirmed official".to_string()
    } else {
        "sustained improvement across policy and sector signals".to_string()
    };
    let increase_to = (final_position + 0.15).min(0.9);

    let decrease_condition = if has_macro_shock_or_tech_reversal(
        signals.macro_sent,
        signals.tech_signal,
        final_position,
    ) {
        "macro shock or technical reversal".to_string()
    } else {
        "sustained deterioration across policy and sector signals".to_string()
    };
    let decrease_to = (final_position - 0.2).max(0.1);

    let confidence = [policy_conf, intl_conf, sector_conf, signals.macro_conf.unwrap_or(0.0)]
        .iter()
        .filter(|c| **c > 0.0)
        .sum::<f64>()
        .max(0.01)
        / 4.0;

    StrategyArtifact {
        analysis_summary: format!(
            "final position {:.2} derived from policy={:.2} intl={:.2} sector={:.2} macro_adj={:.3} tech_adj={:.3}",
            final_position, policy_score, intl_score, sector_sent, adj_macro, adj_tech
        ),
        confidence: confidence.clamp(0.0, 1.0),
        final_position,
        position_breakdown: breakdown,
        adjustment_triggers: AdjustmentTriggers {
            increase_to,
            increase_condition,
            decrease_to,
            decrease_condition,
        },
        market_outlook: market_outlook(final_position),
        decision_rationale: String::new(),
    }
}

/// Degraded path: spec §4.7 failure behavior.
fn degraded_artifact(session_kind: SessionKind) -> StrategyArtifact {
    let _ = session_kind;
    StrategyArtifact {
        analysis_summary: "insufficient primary analyst inputs; degraded decision".to_string(),
        confidence: DEGRADED_CONFIDENCE,
        final_position: DEGRADED_FINAL_POSITION,
        position_breakdown: PositionBreakdown {
            core_holding: 0.3,
            tactical_allocation: 0.2,
            cash_reserve: 0.5,
        },
        adjustment_triggers: AdjustmentTriggers {
            increase_to: 0.65,
            increase_condition: "additional primary analyst artifact becomes available".to_string(),
            decrease_to: 0.3,
            decrease_condition: "additional primary analyst artifact becomes available".to_string(),
        },
        market_outlook: MarketOutlook::Neutral,
        decision_rationale: String::new(),
    }
}

/// Fills `decision_rationale` on an already-decided artifact. Kept
/// separate from [`decide`] so the numeric pipeline stays entirely free
/// of any rationale-generation dependency.
pub fn with_rationale(
    mut artifact: StrategyArtifact,
    inputs: &DecisionInputs,
    provider: &impl RationaleProvider,
) -> StrategyArtifact {
    artifact.decision_rationale = provider.rationale(inputs, artifact.final_position);
    artifact
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_core::artifacts::{
        EconomicCycle, ImpactDuration, ImpactStrength, KeyNewsItem, Liquidity, MacroAnalysis,
        PolicyAnalysis, SectorAnalysis, TechnicalAnalysis, KeyLevels, IntlNewsAnalysis,
    };

    fn macro_artifact(sentiment: f64, confidence: f64) -> AnalystArtifact {
        AnalystArtifact::Macro(MacroAnalysis {
            analysis_summary: "stable growth".to_string(),
            confidence,
            economic_cycle: EconomicCycle::Expansion,
            liquidity: Liquidity::Neutral,
            sentiment_score: sentiment,
        })
    }

    fn policy_artifact(strength: SupportStrength, confidence: f64) -> AnalystArtifact {
        AnalystArtifact::Policy(PolicyAnalysis {
            analysis_summary: "supportive policy".to_string(),
            confidence,
            monetary_policy: "accommodative".to_string(),
            fiscal_policy: "expansionary".to_string(),
            industry_policy: vec![],
            long_term_policies: vec![],
            overall_support_strength: strength,
            long_term_confidence: confidence,
        })
    }

    fn sector_artifact(sentiment: f64, confidence: f64) -> AnalystArtifact {
        AnalystArtifact::Sector(SectorAnalysis {
            analysis_summary: "broad rotation into tech".to_string(),
            confidence,
            top_sectors: vec!["semis".to_string()],
            bottom_sectors: vec!["utilities".to_string()],
            rotation_trend: "into growth".to_string(),
            hot_themes: vec![],
            sentiment_score: sentiment,
        })
    }

    fn intl_artifact(strength: ImpactStrength, duration: ImpactDuration, confidence: f64) -> AnalystArtifact {
        AnalystArtifact::IntlNews(IntlNewsAnalysis {
            analysis_summary: "fed holds rates".to_string(),
            confidence,
            impact_strength: strength,
            impact_duration: duration,
            key_news: vec![KeyNewsItem {
                category: "rates".to_string(),
                title: "Fed holds".to_string(),
                extra: Default::default(),
            }],
        })
    }

    fn technical_artifact(signal: TrendSignal) -> AnalystArtifact {
        AnalystArtifact::Technical(TechnicalAnalysis {
            analysis_summary: "momentum building".to_string(),
            confidence: 0.7,
            trend_signal: signal,
            position_suggestion: 0.5,
            key_levels: KeyLevels { support: 10.0, resistance: 12.0 },
        })
    }

    #[test]
    fn degrades_when_no_artifacts_present() {
        let artifact = decide(None, None, None, None, None, SessionKind::Morning);
        assert_eq!(artifact.final_position, DEGRADED_FINAL_POSITION);
        assert_eq!(artifact.confidence, DEGRADED_CONFIDENCE);
        assert_eq!(artifact.market_outlook, MarketOutlook::Neutral);
    }

    #[test]
    fn degrades_when_policy_is_missing_even_with_macro_and_sector_present() {
        // spec.md E3: macro and sector present, policy and intl absent.
        let macro_a = macro_artifact(0.3, 0.6);
        let sector = sector_artifact(0.4, 0.6);
        let artifact = decide(Some(&macro_a), None, Some(&sector), None, None, SessionKind::Morning);
        assert_eq!(artifact.final_position, DEGRADED_FINAL_POSITION);
        assert_eq!(artifact.confidence, DEGRADED_CONFIDENCE);
        assert_eq!(artifact.market_outlook, MarketOutlook::Neutral);
    }

    #[test]
    fn strong_policy_and_sector_with_bullish_technical_raises_position_in_morning_session() {
        let macro_a = macro_artifact(0.2, 0.7);
        let policy = policy_artifact(SupportStrength::Strong, 0.9);
        let sector = sector_artifact(0.8, 0.9);
        let intl = intl_artifact(ImpactStrength::High, ImpactDuration::Medium, 0.8);
        let technical = technical_artifact(TrendSignal::Bullish);

        let morning = decide(
            Some(&macro_a),
            Some(&policy),
            Some(&sector),
            Some(&intl),
            Some(&technical),
            SessionKind::Morning,
        );
        let closing = decide(
            Some(&macro_a),
            Some(&policy),
            Some(&sector),
            Some(&intl),
            Some(&technical),
            SessionKind::Closing,
        );
        assert!(morning.final_position > closing.final_position);
    }

    #[test]
    fn position_breakdown_always_sums_to_one() {
        let policy = policy_artifact(SupportStrength::Medium, 0.6);
        let sector = sector_artifact(0.2, 0.5);
        let macro_a = macro_artifact(0.3, 0.5);
        let artifact = decide(
            Some(&macro_a),
            Some(&policy),
            Some(&sector),
            None,
            None,
            SessionKind::Post,
        );
        assert!(artifact.position_breakdown.sums_to_one(1e-6));
    }

    #[test]
    fn final_position_is_clamped_to_unit_interval() {
        let policy = policy_artifact(SupportStrength::Strong, 1.0);
        let sector = sector_artifact(1.0, 1.0);
        let macro_a = macro_artifact(1.0, 1.0);
        let intl = intl_artifact(ImpactStrength::High, ImpactDuration::Long, 1.0);
        let technical = technical_artifact(TrendSignal::Bullish);
        let artifact = decide(
            Some(&macro_a),
            Some(&policy),
            Some(&sector),
            Some(&intl),
            Some(&technical),
            SessionKind::Morning,
        );
        assert!(artifact.final_position <= 1.0 && artifact.final_position >= 0.0);
    }

    #[test]
    fn market_outlook_thresholds_match_spec() {
        assert_eq!(market_outlook(0.61), MarketOutlook::Bullish);
        assert_eq!(market_outlook(0.35), MarketOutlook::Bearish);
        assert_eq!(market_outlook(0.5), MarketOutlook::Neutral);
    }

    #[test]
    fn responsibility_separation_ignores_position_suggestion_field() {
        // A technical artifact's `position_suggestion` must never leak into
        // the final position: only `trend_signal` participates.
        let macro_a = macro_artifact(0.1, 0.6);
        let policy = policy_artifact(SupportStrength::Medium, 0.6);
        let sector = sector_artifact(0.0, 0.6);
        let mut technical_high = technical_artifact(TrendSignal::Neutral);
        if let AnalystArtifact::Technical(t) = &mut technical_high {
            t.position_suggestion = 0.99;
        }
        let mut technical_low = technical_artifact(TrendSignal::Neutral);
        if let AnalystArtifact::Technical(t) = &mut technical_low {
            t.position_suggestion = 0.01;
        }
        let with_high = decide(Some(&macro_a), Some(&policy), Some(&sector), None, Some(&technical_high), SessionKind::Post);
        let with_low = decide(Some(&macro_a), Some(&policy), Some(&sector), None, Some(&technical_low), SessionKind::Post);
        assert_eq!(with_high.final_position, with_low.final_position);
    }
}
