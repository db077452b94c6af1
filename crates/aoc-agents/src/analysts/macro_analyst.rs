use serde_json::Value;

use aoc_core::artifacts::{AnalystArtifact, EconomicCycle, Liquidity, MacroAnalysis};
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage};

use crate::runtime::{AnalystSpec, NodeConfig};

pub const MAX_TOOL_CALLS: u32 = 3;

pub struct MacroAnalyst;

impl AnalystSpec for MacroAnalyst {
    fn config(&self) -> NodeConfig {
        NodeConfig { name: "macro", max_tool_calls: MAX_TOOL_CALLS }
    }

    fn seed_messages(&self, state: &AgentState) -> Vec<ChatMessage> {
        vec![ChatMessage::user(format!(
            "Assess macroeconomic conditions for {} as of {}. Call fetch_macro_data if you need fresh GDP/CPI/PMI/M2/LPR figures, \
             then respond with a single JSON object: {{\"analysis_summary\", \"confidence\", \"economic_cycle\", \"liquidity\", \"sentiment_score\"}}.",
            state.request.symbol, state.request.trade_date
        ))]
    }

    fn artifact_slot<'a>(&self, state: &'a AgentState) -> &'a Option<AnalystArtifact> {
        &state.macro_report
    }

    fn parse_artifact(&self, raw: &Value) -> Option<AnalystArtifact> {
        serde_json::from_value::<MacroAnalysis>(raw.clone())
            .ok()
            .map(AnalystArtifact::Macro)
    }

    fn fallback_artifact(&self, _state: &AgentState) -> AnalystArtifact {
        AnalystArtifact::Macro(MacroAnalysis {
            analysis_summary: "[degraded] macro data unavailable or tool budget exhausted; \
                defaulting to a neutral macro read until fresh indicators can be fetched."
                .to_string(),
            confidence: 0.3,
            economic_cycle: EconomicCycle::Expansion,
            liquidity: Liquidity::Neutral,
            sentiment_score: 0.0,
        })
    }

    fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact) {
        patch.macro_report = Some(artifact);
    }
}
