use serde_json::Value;

use aoc_core::artifacts::{AnalystArtifact, KeyLevels, TechnicalAnalysis, TrendSignal};
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage};

use crate::runtime::{AnalystSpec, NodeConfig};

pub const MAX_TOOL_CALLS: u32 = 3;

/// Consumes only indicator data (spec §4.5) — never reads macro, policy,
/// sector, or news artifacts.
pub struct TechnicalAnalyst;

impl AnalystSpec for TechnicalAnalyst {
    fn config(&self) -> NodeConfig {
        NodeConfig { name: "technical", max_tool_calls: MAX_TOOL_CALLS }
    }

    fn seed_messages(&self, state: &AgentState) -> Vec<ChatMessage> {
        vec![ChatMessage::user(format!(
            "Assess technical posture for {}. Call fetch_technical_indicators for MA/MACD/RSI/KDJ, \
             then respond with a single JSON object: {{\"analysis_summary\", \"confidence\", \"trend_signal\", \
             \"position_suggestion\", \"key_levels\": {{\"support\", \"resistance\"}}}}.",
            state.request.symbol
        ))]
    }

    fn artifact_slot<'a>(&self, state: &'a AgentState) -> &'a Option<AnalystArtifact> {
        &state.technical_report
    }

    fn parse_artifact(&self, raw: &Value) -> Option<AnalystArtifact> {
        serde_json::from_value::<TechnicalAnalysis>(raw.clone())
            .ok()
            .map(AnalystArtifact::Technical)
    }

    fn fallback_artifact(&self, _state: &AgentState) -> AnalystArtifact {
        AnalystArtifact::Technical(TechnicalAnalysis {
            analysis_summary: "[degraded] indicator data unavailable or tool budget exhausted; \
                treating trend as neutral until fresh indicators can be fetched."
                .to_string(),
            confidence: 0.3,
            trend_signal: TrendSignal::Neutral,
            position_suggestion: 0.0,
            key_levels: KeyLevels { support: 0.0, resistance: 0.0 },
        })
    }

    fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact) {
        patch.technical_report = Some(artifact);
    }
}
