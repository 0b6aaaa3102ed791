//! Tool System - named, schema-described capabilities
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolRegistry                                               │
//! │  ├── builder().mode(AgentMode) - least-privilege assembly   │
//! │  ├── execute(name, args) -> ToolOutcome (never fails)       │
//! │  └── function_schemas / anthropic_schemas / text / defs     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ToolModule (trait)                                         │
//! │  ├── KnowledgeModule     get_runbook, search_knowledge      │
//! │  ├── ObservabilityModule query_metrics, query_logs,         │
//! │  │                       list_alerts                        │
//! │  ├── CommandModule       suggest_command                    │
//! │  └── McpToolModule       tools discovered over MCP          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod args;
mod definition;
pub mod modules;
mod registry;

pub use args::{optional_str, optional_u64, required_str};
pub use definition::{ToolCategory, ToolDefinition, ToolParameter};
pub use modules::{
    Alert, CommandModule, HttpObservabilityBackend, JsonKnowledgeBase, KnowledgeBase,
    KnowledgeHit, KnowledgeModule, LogLine, MetricSeries, ObservabilityBackend,
    ObservabilityModule, Runbook,
};
pub use registry::{ToolModule, ToolOutcome, ToolRegistry, ToolRegistryBuilder};
