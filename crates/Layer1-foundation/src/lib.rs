//! # triage-foundation
//!
//! Foundation layer for Triage:
//! - Error: shared `Error` / `Result` used by every crate
//! - Storage: `JsonStore` (global + project JSON files)
//! - Config: `TriageConfig` (provider, agent, MCP servers, backends)
//! - Env: `OsType` detection for command validation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Orchestrator (Layer3)                                  │
//! │     │                                                   │
//! │     ▼                                                   │
//! │  Native / ReAct Agent ──▶ Provider (Layer2-provider)    │
//! │     │                                                   │
//! │     ▼                                                   │
//! │  Tool Registry (Layer2-core)                            │
//! │  ├── Local modules (knowledge, observability, command)  │
//! │  └── MCP modules ──▶ SSE transport                      │
//! │                                                         │
//! │  Foundation: Error · JsonStore · TriageConfig · OsType  │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod env_detect;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    AgentMode, AgentSettings, CommandSettings, KnowledgeSettings, McpServerSettings,
    ObservabilitySettings, ProviderSettings, ProviderType, TriageConfig, TRIAGE_CONFIG_FILE,
};

// ============================================================================
// Storage / Environment
// ============================================================================
pub use env_detect::OsType;
pub use storage::JsonStore;
