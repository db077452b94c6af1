use std::sync::Arc;
use std::time::Duration;

use aoc_agents::analysts::strategy_advisor::run_strategy_advisor;
use aoc_agents::{
    AnalystSpec, ChatModel, IntlNewsAnalyst, MacroAnalyst, NodeRuntime, PolicyAnalyst,
    SectorAnalyst, TechnicalAnalyst, Tool, ToolRegistry,
};
use aoc_cache::TieredCache;
use aoc_core::state::{AgentState, AgentStatePatch, ChatMessage, RequestSpec, ToolCallDirective};
use aoc_core::AocResult;
use aoc_probe::DataSourceProbe;
use aoc_providers::DataProviderFacade;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Default per-tool-call timeout when the Scheduler dispatches a tool on a
/// node's behalf (spec §5: "every external call has an individual
/// timeout").
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(10);
/// Default top-level deadline for one full graph run (spec §5).
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);
/// Default number of independent analyst nodes allowed to run concurrently
/// (spec §4.6: "concurrency limit is configurable (default = number of
/// parallel analysts)").
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 4;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tool_timeout: Duration,
    pub deadline: Duration,
    pub concurrency_limit: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            deadline: DEFAULT_DEADLINE,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
        }
    }
}

/// The Agent Graph Scheduler (C6): walks the fixed DAG from spec.md §4.6
/// (`health_check -> {macro, policy, intl_news, technical}`,
/// `policy -> sector`, all five analysts `-> strategy`), owns tool
/// dispatch for every node, and enforces the top-level deadline.
pub struct Scheduler {
    facade: Arc<DataProviderFacade>,
    probe: Arc<DataSourceProbe>,
    chat_model: Arc<dyn ChatModel>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        facade: Arc<DataProviderFacade>,
        cache: Arc<TieredCache>,
        chat_model: Arc<dyn ChatModel>,
    ) -> Self {
        Self {
            probe: Arc::new(DataSourceProbe::new(facade.clone(), cache)),
            facade,
            chat_model,
            config: SchedulerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Runs the full graph for one request and returns the final state.
    /// Honors the top-level deadline: once it expires, no new nodes are
    /// dispatched and in-flight work is marked cancelled, but artifacts
    /// already produced are kept (spec §5).
    pub async fn run(&self, request: RequestSpec) -> AgentState {
        let mut state = AgentState::new(request.clone());
        let token = CancellationToken::new();
        let deadline_token = token.clone();
        let deadline = self.config.deadline;
        let deadline_guard = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            deadline_token.cancel();
        });

        let statuses = self.probe.probe_all(&request).await;
        for (name, status) in statuses {
            state
                .data_source_status
                .insert(name.to_string(), status);
        }

        let tools = ToolRegistry::with_facade(self.facade.clone(), request.trade_date);
        let runs_optional = request.research_depth.runs_optional_nodes();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency_limit.max(1)));

        let macro_fut = self.run_node_to_completion(&MacroAnalyst, &state, &tools, &token, &semaphore);
        let policy_fut = self.run_node_to_completion(&PolicyAnalyst, &state, &tools, &token, &semaphore);
        let intl_fut = async {
            if runs_optional && !token.is_cancelled() {
                self.run_node_to_completion(&IntlNewsAnalyst, &state, &tools, &token, &semaphore).await
            } else {
                Ok(AgentStatePatch::default())
            }
        };
        let technical_fut = async {
            if runs_optional && !token.is_cancelled() {
                self.run_node_to_completion(&TechnicalAnalyst, &state, &tools, &token, &semaphore).await
            } else {
                Ok(AgentStatePatch::default())
            }
        };

        let (macro_patch, policy_patch, intl_patch, technical_patch) =
            tokio::join!(macro_fut, policy_fut, intl_fut, technical_fut);

        for patch in [macro_patch, policy_patch, intl_patch, technical_patch] {
            if let Ok(patch) = patch {
                state.apply_patch(patch);
            }
        }

        if !token.is_cancelled() {
            // sector depends on policy (spec §4.6 edge `policy -> sector`);
            // every downstream must still see some artifact even if the
            // dependency's own primary path failed inside that node.
            if let Ok(patch) = self
                .run_node_to_completion(&SectorAnalyst, &state, &tools, &token, &semaphore)
                .await
            {
                state.apply_patch(patch);
            }
        }

        if let Ok(patch) = run_strategy_advisor(&state, self.chat_model.as_ref()).await {
            state.apply_patch(patch);
        }

        deadline_guard.abort();
        state
    }

    /// Runs one analyst node's tool-call cycle to completion: repeatedly
    /// calls `NodeRuntime::run_turn`, dispatching any pending tool-call
    /// directives itself (spec §4.6: "the Scheduler is responsible for
    /// dispatching tools"), until the node emits a final artifact or the
    /// top-level deadline fires.
    async fn run_node_to_completion(
        &self,
        spec: &dyn AnalystSpec,
        base_state: &AgentState,
        tools: &ToolRegistry,
        token: &CancellationToken,
        semaphore: &Semaphore,
    ) -> AocResult<AgentStatePatch> {
        let _permit = semaphore.acquire().await.expect("semaphore never closed during a run");
        let runtime = NodeRuntime::new(self.chat_model.as_ref());
        let mut working = base_state.clone();

        loop {
            if token.is_cancelled() {
                tracing::warn!(node = spec.config().name, "cancelled by deadline; preserving partial state");
                break;
            }
            let outcome = runtime.run_turn(spec, &working).await?;
            let pending = outcome.pending_tool_calls.clone();
            working.apply_patch(outcome.patch);
            if pending.is_empty() {
                break;
            }
            for call in pending {
                if token.is_cancelled() {
                    break;
                }
                let tool_message = self.dispatch_tool(tools, call).await;
                working.apply_patch(AgentStatePatch {
                    appended_messages: vec![tool_message],
                    ..Default::default()
                });
            }
        }

        Ok(diff_patch(base_state, &working, spec.config().name))
    }

    async fn dispatch_tool(&self, tools: &ToolRegistry, call: ToolCallDirective) -> ChatMessage {
        let result = match tools.get(&call.name) {
            Some(tool) => match tokio::time::timeout(self.config.tool_timeout, tool.call(call.arguments)).await {
                Ok(Ok(value)) => serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string()),
                Ok(Err(e)) => format!("error: {e}"),
                Err(_) => "error: tool call timed out".to_string(),
            },
            None => format!("error: unknown tool {}", call.name),
        };
        ChatMessage::tool_result(call.call_id, result)
    }
}

/// Builds the patch that carries `working`'s deltas relative to
/// `base_state` for `node_name`. Node specs only ever write their own
/// slot, so copying every slot unconditionally is safe: untouched slots
/// are identical to `base_state`'s and overwrite with an equal value.
fn diff_patch(base_state: &AgentState, working: &AgentState, node_name: &str) -> AgentStatePatch {
    let base_count = base_state.tool_calls_used(node_name);
    let new_count = working.tool_calls_used(node_name);
    AgentStatePatch {
        appended_messages: working.messages[base_state.messages.len()..].to_vec(),
        macro_report: working.macro_report.clone(),
        policy_report: working.policy_report.clone(),
        sector_report: working.sector_report.clone(),
        technical_report: working.technical_report.clone(),
        intl_news_report: working.intl_news_report.clone(),
        strategy_report: working.strategy_report.clone(),
        tool_call_increment: if new_count > base_count {
            Some((node_name.to_string(), new_count - base_count))
        } else {
            None
        },
        data_source_status: Vec::new(),
        index_info: working.index_info.clone(),
    }
}
