use serde_json::Value;

use aoc_core::artifacts::{AnalystArtifact, SectorAnalysis};
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage, SessionKind};

use crate::runtime::{AnalystSpec, NodeConfig};

pub const MAX_TOOL_CALLS: u32 = 4;

/// Consumes the policy artifact for cross-validation of hot themes and is
/// session-aware: its prompt context is parameterized by `session_kind`
/// (spec §4.5, §4.8).
pub struct SectorAnalyst;

fn session_prompt_fragment(session_kind: SessionKind) -> &'static str {
    match session_kind {
        SessionKind::Morning => {
            "This is the morning session: weight overnight international flows and the opening rotation more heavily."
        }
        SessionKind::Closing => {
            "This is the closing session: weight the full day's realized sector flows, not just the opening move."
        }
        SessionKind::Post => {
            "This is the post-market session: treat today's flows as settled and focus on positioning for the next session."
        }
    }
}

impl AnalystSpec for SectorAnalyst {
    fn config(&self) -> NodeConfig {
        NodeConfig { name: "sector", max_tool_calls: MAX_TOOL_CALLS }
    }

    fn seed_messages(&self, state: &AgentState) -> Vec<ChatMessage> {
        let policy_context = match state.policy_report.as_ref().and_then(AnalystArtifact::as_policy) {
            Some(p) => format!(
                "Prior policy analysis found support strength {:?} with themes {:?}; cross-validate your hot themes against it.",
                p.overall_support_strength, p.industry_policy
            ),
            None => "No policy analysis is available yet; proceed on sector-flow data alone.".to_string(),
        };
        vec![ChatMessage::user(format!(
            "Assess sector rotation for {} as of {}. {} {} Call fetch_sector_rotation and fetch_sector_news as needed, \
             then respond with a single JSON object: {{\"analysis_summary\", \"confidence\", \"top_sectors\", \"bottom_sectors\", \
             \"rotation_trend\", \"hot_themes\", \"sentiment_score\"}}.",
            state.request.symbol,
            state.request.trade_date,
            session_prompt_fragment(state.request.session_kind),
            policy_context
        ))]
    }

    fn artifact_slot<'a>(&self, state: &'a AgentState) -> &'a Option<AnalystArtifact> {
        &state.sector_report
    }

    fn parse_artifact(&self, raw: &Value) -> Option<AnalystArtifact> {
        serde_json::from_value::<SectorAnalysis>(raw.clone())
            .ok()
            .map(AnalystArtifact::Sector)
    }

    fn fallback_artifact(&self, _state: &AgentState) -> AnalystArtifact {
        AnalystArtifact::Sector(SectorAnalysis {
            analysis_summary: "[degraded] sector flow data unavailable or tool budget exhausted; \
                no rotation signal until fresh flows can be fetched."
                .to_string(),
            confidence: 0.3,
            top_sectors: Vec::new(),
            bottom_sectors: Vec::new(),
            rotation_trend: "unknown".to_string(),
            hot_themes: Vec::new(),
            sentiment_score: 0.0,
        })
    }

    fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact) {
        patch.sector_report = Some(artifact);
    }
}
