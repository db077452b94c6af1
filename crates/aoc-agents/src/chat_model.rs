use async_trait::async_trait;

use aoc_core::state::ChatMessage;
use aoc_core::AocResult;

/// The only LLM-facing boundary in the analyst runtime. A `ChatModel`
/// receives the full message sequence for a node invocation and returns
/// exactly one assistant message, which may carry tool-call directives
/// (spec §4.5 message handoff contract). The AOC core ships no concrete
/// provider client — callers wire in their own — mirroring the way
/// [`aoc_providers::MarketDataSource`] ships no concrete HTTP client.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> AocResult<ChatMessage>;
}

/// Deterministic `ChatModel` stand-ins used by this crate's own tests and
/// by downstream crates (`aoc-scheduler`) that need a scripted model
/// without depending on a real provider.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of assistant responses, one per call,
    /// looping on the last entry once exhausted. Used by node tests to
    /// force the tool-call-budget and fallback-artifact paths
    /// deterministically (spec §8 scenario E2).
    pub struct ScriptedChatModel {
        script: Vec<ChatMessage>,
        calls: AtomicUsize,
        invocation_log: Mutex<Vec<usize>>,
    }

    impl ScriptedChatModel {
        pub fn new(script: Vec<ChatMessage>) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
                invocation_log: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChatModel {
        async fn complete(&self, _messages: &[ChatMessage]) -> AocResult<ChatMessage> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.invocation_log.lock().unwrap().push(idx);
            let bounded = idx.min(self.script.len().saturating_sub(1));
            Ok(self.script[bounded].clone())
        }
    }
}
