use aoc_core::artifacts::AnalystArtifact;
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage};
use aoc_core::AocResult;
use aoc_strategy::{decide, with_rationale, DecisionInputs, RationaleProvider};

use crate::chat_model::ChatModel;
use crate::runtime::IDEMPOTENT_MIN_LENGTH;

pub const NODE_NAME: &str = "strategy";

struct ChatModelRationale<'a> {
    message: &'a ChatMessage,
}

impl<'a> RationaleProvider for ChatModelRationale<'a> {
    fn rationale(&self, _inputs: &DecisionInputs, _final_position: f64) -> String {
        self.message
            .content
            .clone()
            .unwrap_or_else(|| "no rationale returned by model".to_string())
    }
}

fn is_well_formed(artifact: &AnalystArtifact) -> bool {
    serde_json::to_string(artifact)
        .map(|s| s.len() >= IDEMPOTENT_MIN_LENGTH)
        .unwrap_or(false)
}

/// The Strategy Advisor (spec §4.5, §4.7): a thin wrapper that runs the
/// pure `aoc-strategy` decision function, then asks a `ChatModel` for
/// prose only — never for the numeric decision itself. Unlike the other
/// five nodes it never emits tool-call directives, so it doesn't go
/// through [`crate::runtime::NodeRuntime`]'s tool-dispatch handoff.
pub async fn run_strategy_advisor(
    state: &AgentState,
    chat_model: &dyn ChatModel,
) -> AocResult<AgentStatePatch> {
    if let Some(existing) = &state.strategy_report {
        if is_well_formed(existing) {
            tracing::debug!(node = NODE_NAME, "idempotent re-entry: strategy artifact already present");
            return Ok(AgentStatePatch::default());
        }
    }

    let artifact = decide(
        state.macro_report.as_ref(),
        state.policy_report.as_ref(),
        state.sector_report.as_ref(),
        state.intl_news_report.as_ref(),
        state.technical_report.as_ref(),
        state.request.session_kind,
    );

    let inputs = DecisionInputs {
        macro_sent: state.macro_report.as_ref().and_then(AnalystArtifact::as_macro).map(|m| m.sentiment_score),
        policy_score: state
            .policy_report
            .as_ref()
            .and_then(AnalystArtifact::as_policy)
            .map(|p| p.overall_support_strength.to_score()),
        intl_score: state
            .intl_news_report
            .as_ref()
            .and_then(AnalystArtifact::as_intl_news)
            .map(|n| n.impact_strength.to_score()),
        sector_sent: state.sector_report.as_ref().and_then(AnalystArtifact::as_sector).map(|s| s.sentiment_score),
        tech_signal: state.technical_report.as_ref().and_then(AnalystArtifact::as_technical).map(|t| t.trend_signal),
        session_kind: state.request.session_kind,
    };

    let prompt = ChatMessage::user(format!(
        "The computed final position for {} is {:.2} (outlook: {:?}). Write a short decision rationale in prose \
         explaining this number using the analyst inputs already on record. Do not propose a different number.",
        state.request.symbol, artifact.final_position, artifact.market_outlook
    ));
    let assistant_message = chat_model.complete(std::slice::from_ref(&prompt)).await?;

    let artifact = with_rationale(artifact, &inputs, &ChatModelRationale { message: &assistant_message });

    let mut patch = AgentStatePatch::default();
    patch.appended_messages.push(prompt);
    patch.appended_messages.push(assistant_message);
    patch.strategy_report = Some(AnalystArtifact::Strategy(artifact));
    Ok(patch)
}
