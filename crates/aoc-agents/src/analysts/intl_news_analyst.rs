use serde_json::Value;

use aoc_core::artifacts::{AnalystArtifact, ImpactDuration, ImpactStrength, IntlNewsAnalysis};
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage};

use crate::runtime::{AnalystSpec, NodeConfig};

pub const MAX_TOOL_CALLS: u32 = 3;

/// Fresh-only (spec §4.4, §4.5): the international-news tool has no cache
/// bypass, so this node always sees a live result or an explicit failure.
pub struct IntlNewsAnalyst;

impl AnalystSpec for IntlNewsAnalyst {
    fn config(&self) -> NodeConfig {
        NodeConfig { name: "intl_news", max_tool_calls: MAX_TOOL_CALLS }
    }

    fn seed_messages(&self, state: &AgentState) -> Vec<ChatMessage> {
        vec![ChatMessage::user(format!(
            "Assess international news impact on {} as of {}. Call fetch_multi_source_news for the latest fresh items, \
             then respond with a single JSON object: {{\"analysis_summary\", \"confidence\", \"impact_strength\", \
             \"impact_duration\", \"key_news\": [{{\"category\", \"title\"}}]}}.",
            state.request.symbol, state.request.trade_date
        ))]
    }

    fn artifact_slot<'a>(&self, state: &'a AgentState) -> &'a Option<AnalystArtifact> {
        &state.intl_news_report
    }

    fn parse_artifact(&self, raw: &Value) -> Option<AnalystArtifact> {
        serde_json::from_value::<IntlNewsAnalysis>(raw.clone())
            .ok()
            .map(AnalystArtifact::IntlNews)
    }

    fn fallback_artifact(&self, _state: &AgentState) -> AnalystArtifact {
        AnalystArtifact::IntlNews(IntlNewsAnalysis {
            analysis_summary: "[degraded] fresh international news unavailable or tool budget exhausted; \
                assuming low-impact until coverage can be fetched."
                .to_string(),
            confidence: 0.3,
            impact_strength: ImpactStrength::Low,
            impact_duration: ImpactDuration::Short,
            key_news: Vec::new(),
        })
    }

    fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact) {
        patch.intl_news_report = Some(artifact);
    }
}
