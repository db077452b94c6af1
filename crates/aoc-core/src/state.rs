use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifacts::AnalystArtifact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    AShare,
    Hk,
    Us,
}

impl Default for MarketType {
    fn default() -> Self {
        MarketType::AShare
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Morning,
    Closing,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchDepth {
    Quick,
    Standard,
    Deep,
}

impl ResearchDepth {
    /// Whether the technical and international-news nodes run at all for
    /// this depth (spec §6: research_depth controls "whether technical/intl
    /// nodes run").
    pub fn runs_optional_nodes(self) -> bool {
        !matches!(self, ResearchDepth::Quick)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSpec {
    pub symbol: String,
    #[serde(default)]
    pub market_type: MarketType,
    pub session_kind: SessionKind,
    pub trade_date: NaiveDate,
    pub research_depth: ResearchDepth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDirective {
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in the append-only message log (spec §4.5, §5: "the message
/// sequence is an append-only log; the only mutation allowed is append").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDirective>,
    /// Set on a `Tool` role message: which call this result answers.
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_tool_calls(calls: Vec<ToolCallDirective>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOfTruth {
    Cache,
    Api,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatusEntry {
    pub available: bool,
    #[serde(default)]
    pub source_of_truth: Option<SourceOfTruth>,
    #[serde(default)]
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub symbol: String,
    pub name: Option<String>,
}

/// The Session/Context Carrier (C8): a typed record flowing through the
/// agent graph. Reading is always safe from any node; writing to a slot is
/// exclusive to the owning node — enforced by `aoc-scheduler`'s dispatch
/// loop, not by this type, which is a plain value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub request: RequestSpec,
    pub messages: Vec<ChatMessage>,
    pub macro_report: Option<AnalystArtifact>,
    pub policy_report: Option<AnalystArtifact>,
    pub sector_report: Option<AnalystArtifact>,
    pub technical_report: Option<AnalystArtifact>,
    pub intl_news_report: Option<AnalystArtifact>,
    pub strategy_report: Option<AnalystArtifact>,
    #[serde(default)]
    pub tool_call_counters: HashMap<String, u32>,
    #[serde(default)]
    pub data_source_status: HashMap<String, SourceStatusEntry>,
    #[serde(default)]
    pub index_info: Option<IndexInfo>,
    /// Unknown keys a future producer might add; preserved but unused by
    /// the core (spec §4.8: "unknown keys are preserved").
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl AgentState {
    pub fn new(request: RequestSpec) -> Self {
        Self {
            request,
            messages: Vec::new(),
            macro_report: None,
            policy_report: None,
            sector_report: None,
            technical_report: None,
            intl_news_report: None,
            strategy_report: None,
            tool_call_counters: HashMap::new(),
            data_source_status: HashMap::new(),
            index_info: None,
            extra: Map::new(),
        }
    }

    pub fn tool_calls_used(&self, node: &str) -> u32 {
        self.tool_call_counters.get(node).copied().unwrap_or(0)
    }
}

/// A patch produced by a single node invocation. The Scheduler applies it
/// with `AgentState::apply_patch`, which is the only place multiple node
/// outputs are merged back into one state — this is the copy-on-write
/// boundary from spec §3/§8.
#[derive(Debug, Clone, Default)]
pub struct AgentStatePatch {
    pub appended_messages: Vec<ChatMessage>,
    pub macro_report: Option<AnalystArtifact>,
    pub policy_report: Option<AnalystArtifact>,
    pub sector_report: Option<AnalystArtifact>,
    pub technical_report: Option<AnalystArtifact>,
    pub intl_news_report: Option<AnalystArtifact>,
    pub strategy_report: Option<AnalystArtifact>,
    pub tool_call_increment: Option<(String, u32)>,
    pub data_source_status: Vec<(String, SourceStatusEntry)>,
    pub index_info: Option<IndexInfo>,
}

impl AgentState {
    pub fn apply_patch(&mut self, patch: AgentStatePatch) {
        self.messages.extend(patch.appended_messages);
        if let Some(a) = patch.macro_report {
            self.macro_report = Some(a);
        }
        if let Some(a) = patch.policy_report {
            self.policy_report = Some(a);
        }
        if let Some(a) = patch.sector_report {
            self.sector_report = Some(a);
        }
        if let Some(a) = patch.technical_report {
            self.technical_report = Some(a);
        }
        if let Some(a) = patch.intl_news_report {
            self.intl_news_report = Some(a);
        }
        if let Some(a) = patch.strategy_report {
            self.strategy_report = Some(a);
        }
        if let Some((node, inc)) = patch.tool_call_increment {
            *self.tool_call_counters.entry(node).or_insert(0) += inc;
        }
        for (source, status) in patch.data_source_status {
            self.data_source_status.insert(source, status);
        }
        if let Some(info) = patch.index_info {
            self.index_info = Some(info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> RequestSpec {
        RequestSpec {
            symbol: "000001.SH".to_string(),
            market_type: MarketType::AShare,
            session_kind: SessionKind::Morning,
            trade_date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            research_depth: ResearchDepth::Standard,
        }
    }

    #[test]
    fn apply_patch_only_touches_named_slots() {
        let mut state = AgentState::new(sample_request());
        state.policy_report = Some(AnalystArtifact::Policy(crate::artifacts::PolicyAnalysis {
            analysis_summary: "existing".into(),
            confidence: 0.7,
            monetary_policy: "neutral".into(),
            fiscal_policy: "neutral".into(),
            industry_policy: vec![],
            long_term_policies: vec![],
            overall_support_strength: crate::artifacts::SupportStrength::Medium,
            long_term_confidence: 0.5,
        }));

        let mut patch = AgentStatePatch::default();
        patch.tool_call_increment = Some(("macro".to_string(), 1));
        state.apply_patch(patch);

        assert!(state.policy_report.is_some());
        assert_eq!(state.tool_calls_used("macro"), 1);
    }

    #[test]
    fn messages_are_append_only_across_patches() {
        let mut state = AgentState::new(sample_request());
        state.messages.push(ChatMessage::user("hello"));

        let mut patch = AgentStatePatch::default();
        patch
            .appended_messages
            .push(ChatMessage::assistant_text("reply"));
        state.apply_patch(patch);

        assert_eq!(state.messages.len(), 2);
        assert!(matches!(state.messages[0].role, ChatRole::User));
        assert!(matches!(state.messages[1].role, ChatRole::Assistant));
    }
}
