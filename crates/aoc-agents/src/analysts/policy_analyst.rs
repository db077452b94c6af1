use serde_json::Value;

use aoc_core::artifacts::{
    find_banned_fields, AnalystArtifact, PolicyAnalysis, SupportStrength,
};
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage};

use crate::runtime::{AnalystSpec, NodeConfig};

pub const MAX_TOOL_CALLS: u32 = 4;

/// Confidence penalty applied when a raw model response carries a banned
/// position-like field (spec §7 InvariantViolation: "flagged with reduced
/// confidence"). The field itself is silently dropped by the typed parse
/// below — `PolicyAnalysis` has no slot to hold it in the first place.
const BANNED_FIELD_CONFIDENCE_PENALTY: f64 = 0.5;

pub struct PolicyAnalyst;

impl AnalystSpec for PolicyAnalyst {
    fn config(&self) -> NodeConfig {
        NodeConfig { name: "policy", max_tool_calls: MAX_TOOL_CALLS }
    }

    fn seed_messages(&self, state: &AgentState) -> Vec<ChatMessage> {
        vec![ChatMessage::user(format!(
            "Assess monetary and fiscal policy context for {} as of {}. Call fetch_policy_news if you need fresh items. \
             You must NEVER include any position, recommended_position, or position_adjustment field — that decision belongs \
             to a downstream component, not to you. Respond with a single JSON object: {{\"analysis_summary\", \"confidence\", \
             \"monetary_policy\", \"fiscal_policy\", \"industry_policy\", \"long_term_policies\", \"overall_support_strength\", \"long_term_confidence\"}}.",
            state.request.symbol, state.request.trade_date
        ))]
    }

    fn artifact_slot<'a>(&self, state: &'a AgentState) -> &'a Option<AnalystArtifact> {
        &state.policy_report
    }

    fn parse_artifact(&self, raw: &Value) -> Option<AnalystArtifact> {
        let banned = find_banned_fields(raw);
        if !banned.is_empty() {
            tracing::warn!(fields = ?banned, "policy artifact carried banned position-like fields; stripping");
        }
        let mut parsed = serde_json::from_value::<PolicyAnalysis>(raw.clone()).ok()?;
        if !banned.is_empty() {
            parsed.confidence = (parsed.confidence * BANNED_FIELD_CONFIDENCE_PENALTY).max(0.0);
        }
        Some(AnalystArtifact::Policy(parsed))
    }

    fn fallback_artifact(&self, _state: &AgentState) -> AnalystArtifact {
        AnalystArtifact::Policy(PolicyAnalysis {
            analysis_summary: "[degraded] policy news unavailable or tool budget exhausted; \
                treating policy support as neutral until fresh coverage can be fetched."
                .to_string(),
            confidence: 0.3,
            monetary_policy: "unknown".to_string(),
            fiscal_policy: "unknown".to_string(),
            industry_policy: Vec::new(),
            long_term_policies: Vec::new(),
            overall_support_strength: SupportStrength::Medium,
            long_term_confidence: 0.3,
        })
    }

    fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact) {
        patch.policy_report = Some(artifact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banned_field_in_raw_response_is_stripped_and_confidence_reduced() {
        let raw = serde_json::json!({
            "analysis_summary": "supportive monetary stance with room for more easing ahead",
            "confidence": 0.8,
            "monetary_policy": "accommodative",
            "fiscal_policy": "expansionary",
            "industry_policy": [],
            "long_term_policies": [],
            "overall_support_strength": "strong",
            "long_term_confidence": 0.7,
            "recommended_position": 0.65,
        });
        let artifact = PolicyAnalyst.parse_artifact(&raw).unwrap();
        let policy = artifact.as_policy().unwrap();
        assert!((policy.confidence - 0.4).abs() < 1e-9);
    }

    #[test]
    fn clean_response_keeps_full_confidence() {
        let raw = serde_json::json!({
            "analysis_summary": "supportive monetary stance with room for more easing ahead",
            "confidence": 0.8,
            "monetary_policy": "accommodative",
            "fiscal_policy": "expansionary",
            "industry_policy": [],
            "long_term_policies": [],
            "overall_support_strength": "strong",
            "long_term_confidence": 0.7,
        });
        let artifact = PolicyAnalyst.parse_artifact(&raw).unwrap();
        assert_eq!(artifact.as_policy().unwrap().confidence, 0.8);
    }
}
