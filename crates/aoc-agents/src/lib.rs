pub mod analysts;
pub mod chat_model;
pub mod extraction;
pub mod runtime;
pub mod tools;

pub use analysts::{IntlNewsAnalyst, MacroAnalyst, PolicyAnalyst, SectorAnalyst, TechnicalAnalyst};
pub use chat_model::{mock, ChatModel};
pub use extraction::extract_json_object;
pub use runtime::{AnalystSpec, NodeConfig, NodeRuntime, NodeTurnOutcome};
pub use tools::{Tool, ToolRegistry};
