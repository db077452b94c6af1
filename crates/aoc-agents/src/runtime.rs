use serde_json::Value;

use aoc_core::artifacts::AnalystArtifact;
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage, ToolCallDirective};
use aoc_core::AocResult;

use crate::chat_model::ChatModel;
use crate::extraction::extract_json_object;

/// Minimum content length for an existing artifact slot to be accepted as
/// already well-formed on re-entry (spec §4.5 idempotency rule). A
/// structurally valid parse always counts regardless of length.
pub const IDEMPOTENT_MIN_LENGTH: usize = 100;

/// Per-node configuration (spec §4.5: "typically 3-5" tool calls).
#[derive(Debug, Clone, Copy)]
pub struct NodeConfig {
    pub name: &'static str,
    pub max_tool_calls: u32,
}

/// The only per-node variation point (spec §4.5 "Analyst-specific
/// behavior"). Everything else — idempotency, budget enforcement,
/// extraction, fallback dispatch — lives in [`NodeRuntime`] and is shared
/// by all six analyst nodes.
pub trait AnalystSpec: Send + Sync {
    fn config(&self) -> NodeConfig;

    /// The system/user message(s) to seed a fresh invocation with. Only
    /// used when `state.messages` has no prior turn for this node.
    fn seed_messages(&self, state: &AgentState) -> Vec<ChatMessage>;

    /// Reads this node's own artifact slot out of `state`.
    fn artifact_slot<'a>(&self, state: &'a AgentState) -> &'a Option<AnalystArtifact>;

    /// Parses a raw JSON object extracted from the model's content into
    /// this node's typed artifact. Returns `None` on a structural
    /// mismatch (wrong/missing fields) — the runtime treats that the same
    /// as a parse failure.
    fn parse_artifact(&self, raw: &Value) -> Option<AnalystArtifact>;

    /// The low-confidence artifact emitted when the budget is exhausted or
    /// required inputs are missing (spec §4.5 fallback-artifact contract:
    /// `confidence <= 0.3`).
    fn fallback_artifact(&self, state: &AgentState) -> AnalystArtifact;

    /// Writes `artifact` into the node's slot on a patch.
    fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact);
}

/// Outcome of a single turn (spec §4.5 message handoff contract): the
/// patch the Scheduler must merge via `AgentState::apply_patch`, plus any
/// tool-call directives the Scheduler must now dispatch. When
/// `pending_tool_calls` is non-empty the Scheduler appends tool-result
/// messages and re-invokes the node; otherwise the turn is final.
#[derive(Debug, Clone)]
pub struct NodeTurnOutcome {
    pub patch: AgentStatePatch,
    pub pending_tool_calls: Vec<ToolCallDirective>,
}

/// Shared machinery behind every analyst node (spec §4.5). Holds no
/// per-node state itself; each call is handed the node's `AnalystSpec` and
/// the state snapshot to act on.
pub struct NodeRuntime<'a> {
    chat_model: &'a dyn ChatModel,
}

impl<'a> NodeRuntime<'a> {
    pub fn new(chat_model: &'a dyn ChatModel) -> Self {
        Self { chat_model }
    }

    /// Runs exactly one turn for `spec` against `state`. Safe to call
    /// repeatedly — idempotency and the budget check make re-entry a
    /// no-op or a deterministic fallback once their conditions are met.
    pub async fn run_turn(
        &self,
        spec: &dyn AnalystSpec,
        state: &AgentState,
    ) -> AocResult<NodeTurnOutcome> {
        let config = spec.config();

        if let Some(existing) = spec.artifact_slot(state) {
            if is_well_formed(existing) {
                tracing::debug!(node = config.name, "idempotent re-entry: artifact already present");
                return Ok(NodeTurnOutcome {
                    patch: AgentStatePatch::default(),
                    pending_tool_calls: Vec::new(),
                });
            }
        }

        if state.tool_calls_used(config.name) >= config.max_tool_calls {
            tracing::warn!(node = config.name, "tool-call budget exhausted, emitting fallback artifact");
            let mut patch = AgentStatePatch::default();
            spec.write_slot(&mut patch, spec.fallback_artifact(state));
            return Ok(NodeTurnOutcome { patch, pending_tool_calls: Vec::new() });
        }

        let messages = if state.messages.iter().any(|m| matches!(m.role, aoc_core::state::ChatRole::Assistant)) {
            state.messages.clone()
        } else {
            spec.seed_messages(state)
        };

        let assistant_message = self.chat_model.complete(&messages).await?;

        let mut patch = AgentStatePatch::default();
        patch.appended_messages.push(assistant_message.clone());

        if !assistant_message.tool_calls.is_empty() {
            patch.tool_call_increment = Some((config.name.to_string(), 1));
            return Ok(NodeTurnOutcome {
                patch,
                pending_tool_calls: assistant_message.tool_calls,
            });
        }

        let content = assistant_message.content.as_deref().unwrap_or_default();
        match extract_json_object(content).and_then(|raw| spec.parse_artifact(&raw)) {
            Some(artifact) => spec.write_slot(&mut patch, artifact),
            None => {
                tracing::warn!(node = config.name, "artifact parse failed, raw content preserved");
                spec.write_slot(&mut patch, spec.fallback_artifact(state));
            }
        }

        Ok(NodeTurnOutcome { patch, pending_tool_calls: Vec::new() })
    }
}

fn is_well_formed(artifact: &AnalystArtifact) -> bool {
    artifact.confidence() > 0.0
        && serde_json::to_string(artifact)
            .map(|s| s.len() >= IDEMPOTENT_MIN_LENGTH)
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat_model::mock::ScriptedChatModel;
    use aoc_core::artifacts::{EconomicCycle, Liquidity, MacroAnalysis};
    use aoc_core::state::{ChatMessage, MarketType, RequestSpec, ResearchDepth, SessionKind};
    use chrono::NaiveDate;

    struct TestMacroSpec;

    impl AnalystSpec for TestMacroSpec {
        fn config(&self) -> NodeConfig {
            NodeConfig { name: "macro", max_tool_calls: 3 }
        }

        fn seed_messages(&self, _state: &AgentState) -> Vec<ChatMessage> {
            vec![ChatMessage::user("analyze macro conditions")]
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
                analysis_summary: "fallback: insufficient data [degraded]".to_string(),
                confidence: 0.2,
                economic_cycle: EconomicCycle::Expansion,
                liquidity: Liquidity::Neutral,
                sentiment_score: 0.0,
            })
        }

        fn write_slot(&self, patch: &mut AgentStatePatch, artifact: AnalystArtifact) {
            patch.macro_report = Some(artifact);
        }
    }

    fn request() -> RequestSpec {
        RequestSpec {
            symbol: "000001.SH".to_string(),
            market_type: MarketType::AShare,
            session_kind: SessionKind::Morning,
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            research_depth: ResearchDepth::Standard,
        }
    }

    #[tokio::test]
    async fn idempotent_reentry_skips_model_call() {
        let mut state = AgentState::new(request());
        state.macro_report = Some(AnalystArtifact::Macro(MacroAnalysis {
            analysis_summary: "a".repeat(120),
            confidence: 0.8,
            economic_cycle: EconomicCycle::Expansion,
            liquidity: Liquidity::Neutral,
            sentiment_score: 0.1,
        }));

        let model = ScriptedChatModel::new(vec![ChatMessage::assistant_text("should not be called")]);
        let runtime = NodeRuntime::new(&model);
        let outcome = runtime.run_turn(&TestMacroSpec, &state).await.unwrap();

        assert_eq!(model.call_count(), 0);
        assert!(outcome.patch.macro_report.is_none());
        assert!(outcome.pending_tool_calls.is_empty());
    }

    #[tokio::test]
    async fn parses_well_formed_json_response_into_typed_artifact() {
        let state = AgentState::new(request());
        let content = r#"Here is the result: {"analysis_summary": "steady growth with easing inflation pressures across the board", "confidence": 0.75, "economic_cycle": "expansion", "liquidity": "neutral", "sentiment_score": 0.4}"#;
        let model = ScriptedChatModel::new(vec![ChatMessage::assistant_text(content)]);
        let runtime = NodeRuntime::new(&model);
        let outcome = runtime.run_turn(&TestMacroSpec, &state).await.unwrap();

        let artifact = outcome.patch.macro_report.expect("artifact written");
        assert_eq!(artifact.as_macro().unwrap().sentiment_score, 0.4);
    }

    #[tokio::test]
    async fn malformed_content_falls_back_without_losing_raw_message() {
        let state = AgentState::new(request());
        let model = ScriptedChatModel::new(vec![ChatMessage::assistant_text("not json at all")]);
        let runtime = NodeRuntime::new(&model);
        let outcome = runtime.run_turn(&TestMacroSpec, &state).await.unwrap();

        let artifact = outcome.patch.macro_report.expect("fallback written");
        assert!(artifact.confidence() <= 0.3);
        assert_eq!(
            outcome.patch.appended_messages[0].content.as_deref(),
            Some("not json at all")
        );
    }

    #[tokio::test]
    async fn exhausted_budget_emits_fallback_without_calling_model() {
        let mut state = AgentState::new(request());
        state.tool_call_counters.insert("macro".to_string(), 3);
        let model = ScriptedChatModel::new(vec![ChatMessage::assistant_text("should not be called")]);
        let runtime = NodeRuntime::new(&model);
        let outcome = runtime.run_turn(&TestMacroSpec, &state).await.unwrap();

        assert_eq!(model.call_count(), 0);
        assert!(outcome.patch.macro_report.unwrap().confidence() <= 0.3);
    }

    #[tokio::test]
    async fn tool_call_response_increments_budget_and_returns_pending_directives() {
        let state = AgentState::new(request());
        let model = ScriptedChatModel::new(vec![ChatMessage::assistant_tool_calls(vec![
            ToolCallDirective {
                call_id: "c1".to_string(),
                name: "fetch_macro_data".to_string(),
                arguments: serde_json::json!({}),
            },
        ])]);
        let runtime = NodeRuntime::new(&model);
        let outcome = runtime.run_turn(&TestMacroSpec, &state).await.unwrap();

        assert_eq!(outcome.pending_tool_calls.len(), 1);
        assert_eq!(outcome.patch.tool_call_increment, Some(("macro".to_string(), 1)));
    }
}
