//! triage-core: Core Runtime for Triage
//!
//! Layer2 - tool execution layer
//!
//! # Modules
//!
//! - `security`: `CommandValidator` (ALLOWED / SUSPICIOUS / BLOCKED)
//! - `mcp`: JSON-RPC over SSE client and its tool bridge
//! - `tool`: `ToolRegistry`, `ToolModule` and the built-in modules
//!
//! # Example
//!
//! ```ignore
//! use triage_core::{CommandModule, CommandValidator, ToolRegistry};
//! use triage_foundation::AgentMode;
//!
//! let validator = Arc::new(CommandValidator::new());
//! let registry = ToolRegistry::builder()
//!     .mode(AgentMode::Interactive)
//!     .module(CommandModule::new(validator))
//!     .build();
//!
//! let outcome = registry.execute("suggest_command", json!({
//!     "server": "web-1",
//!     "command": "systemctl restart apache2"
//! })).await;
//! ```

pub mod mcp;
pub mod security;
pub mod tool;

// Re-exports: Security
pub use security::{
    CommandRule, CommandRuleRow, CommandRuleStore, CommandValidation, CommandValidator,
    JsonRuleStore, OsScope, RiskLevel, RuleKind, StaticRuleStore, ValidationResult,
    ValidatorOptions,
};

// Re-exports: MCP
pub use mcp::{McpClient, McpClientState, McpToolModule, McpTransport, SseTransport};

// Re-exports: Tools
pub use tool::modules::SUGGEST_COMMAND;
pub use tool::{
    CommandModule, HttpObservabilityBackend, JsonKnowledgeBase, KnowledgeBase, KnowledgeModule,
    ObservabilityBackend, ObservabilityModule, ToolCategory, ToolDefinition, ToolModule,
    ToolOutcome, ToolParameter, ToolRegistry, ToolRegistryBuilder,
};
