//! Config - unified settings
//!
//! - `provider.rs` - `ProviderType` and provider connection settings
//! - `triage.rs` - `TriageConfig` (agent, MCP servers, backends, command rules)

mod provider;
mod triage;

pub use provider::{ProviderSettings, ProviderType};
pub use triage::{
    AgentMode, AgentSettings, CommandSettings, KnowledgeSettings, McpServerSettings,
    ObservabilitySettings, TriageConfig, TRIAGE_CONFIG_FILE,
};
