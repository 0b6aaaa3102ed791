//! Triage Config - unified settings
//!
//! Loaded from `triage.json` in the global store, then the project store,
//! then environment variables. Later sources win.

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};

use super::{ProviderSettings, ProviderType};

/// Config file name
pub const TRIAGE_CONFIG_FILE: &str = "triage.json";

// ============================================================================
// Triage Config
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageConfig {
    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServerSettings>,

    #[serde(default)]
    pub observability: ObservabilitySettings,

    #[serde(default)]
    pub knowledge: KnowledgeSettings,

    #[serde(default)]
    pub commands: CommandSettings,
}

impl TriageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// Global + project + environment
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<TriageConfig>(TRIAGE_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) =
                project.load_optional::<TriageConfig>(TRIAGE_CONFIG_FILE)?
            {
                config.merge(project_config);
            }
        }

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a single explicit file (no merging with other stores)
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        let mut config: Self = store.load(TRIAGE_CONFIG_FILE)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save_project(&self) -> Result<()> {
        let store = JsonStore::current_project()?;
        store.save(TRIAGE_CONFIG_FILE, self)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Merge another config into this one (`other` wins)
    pub fn merge(&mut self, other: TriageConfig) {
        self.provider.merge(other.provider);
        self.agent.merge(other.agent);
        self.observability.merge(other.observability);
        self.knowledge.merge(other.knowledge);
        self.commands.merge(other.commands);

        for server in other.mcp_servers {
            match self.mcp_servers.iter_mut().find(|s| s.name == server.name) {
                Some(existing) => *existing = server,
                None => self.mcp_servers.push(server),
            }
        }
    }

    /// `TRIAGE_PROVIDER`, `TRIAGE_MODEL` and the vendor API key variable
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("TRIAGE_PROVIDER") {
            match provider.parse::<ProviderType>() {
                Ok(provider_type) => self.provider.merge(ProviderSettings::new(provider_type)),
                Err(e) => tracing::warn!("Ignoring TRIAGE_PROVIDER: {}", e),
            }
        }

        if let Some(model) = lookup("TRIAGE_MODEL") {
            self.provider.model = Some(model);
        }

        if self.provider.api_key.is_none() {
            if let Some(var) = self.provider.effective_type().api_key_env() {
                self.provider.api_key = lookup(var);
            }
        }
    }

    /// Enabled MCP servers only
    pub fn enabled_mcp_servers(&self) -> impl Iterator<Item = &McpServerSettings> {
        self.mcp_servers.iter().filter(|s| s.enabled)
    }
}

// ============================================================================
// Agent
// ============================================================================

/// Which tool set an agent receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    /// Operator in the loop, full module set
    #[default]
    Interactive,
    /// Unattended (alert analysis), read-only modules only
    Background,
}

impl std::str::FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "interactive" => Ok(Self::Interactive),
            "background" => Ok(Self::Background),
            other => Err(format!("Unknown agent mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    /// Model calls per run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,

    /// Tool invocations required before a final answer is accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_tool_calls: Option<usize>,

    /// Same, for requests that already carry alert context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_min_tool_calls: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<AgentMode>,
}

impl AgentSettings {
    pub const DEFAULT_MAX_ITERATIONS: usize = 10;
    pub const DEFAULT_MIN_TOOL_CALLS: usize = 2;
    pub const DEFAULT_ALERT_MIN_TOOL_CALLS: usize = 1;

    pub fn effective_max_iterations(&self) -> usize {
        self.max_iterations
            .unwrap_or(Self::DEFAULT_MAX_ITERATIONS)
            .max(1)
    }

    pub fn effective_min_tool_calls(&self) -> usize {
        self.min_tool_calls.unwrap_or(Self::DEFAULT_MIN_TOOL_CALLS)
    }

    pub fn effective_alert_min_tool_calls(&self) -> usize {
        self.alert_min_tool_calls
            .unwrap_or(Self::DEFAULT_ALERT_MIN_TOOL_CALLS)
    }

    pub fn effective_mode(&self) -> AgentMode {
        self.mode.unwrap_or_default()
    }

    pub fn merge(&mut self, other: AgentSettings) {
        if other.max_iterations.is_some() {
            self.max_iterations = other.max_iterations;
        }
        if other.min_tool_calls.is_some() {
            self.min_tool_calls = other.min_tool_calls;
        }
        if other.alert_min_tool_calls.is_some() {
            self.alert_min_tool_calls = other.alert_min_tool_calls;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
    }
}

// ============================================================================
// MCP servers
// ============================================================================

/// One SSE-reachable MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerSettings {
    pub name: String,

    /// Event stream URL (GET)
    pub url: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whether the bridged tools may be offered in background mode
    #[serde(default = "default_true")]
    pub read_only: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl McpServerSettings {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            enabled: true,
            read_only: true,
            timeout_secs: None,
        }
    }

    pub fn effective_timeout(&self) -> u64 {
        self.timeout_secs.unwrap_or(Self::DEFAULT_TIMEOUT_SECS)
    }
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Backends
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservabilitySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prometheus_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub loki_url: Option<String>,
}

impl ObservabilitySettings {
    pub fn merge(&mut self, other: ObservabilitySettings) {
        if other.prometheus_url.is_some() {
            self.prometheus_url = other.prometheus_url;
        }
        if other.loki_url.is_some() {
            self.loki_url = other.loki_url;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSettings {
    /// Runbook catalog, relative to the store dir or absolute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runbooks_file: Option<String>,
}

impl KnowledgeSettings {
    pub const DEFAULT_RUNBOOKS_FILE: &'static str = "runbooks.json";

    pub fn effective_runbooks_file(&self) -> &str {
        self.runbooks_file
            .as_deref()
            .unwrap_or(Self::DEFAULT_RUNBOOKS_FILE)
    }

    pub fn merge(&mut self, other: KnowledgeSettings) {
        if other.runbooks_file.is_some() {
            self.runbooks_file = other.runbooks_file;
        }
    }
}

// ============================================================================
// Command validation
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSettings {
    /// Custom rule rows, relative to the store dir or absolute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,

    /// Reject every command that matches no allowlist pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enforce_allowlist: Option<bool>,

    /// Regex patterns permitted when the allowlist is enforced
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowlist: Vec<String>,
}

impl CommandSettings {
    pub const DEFAULT_RULES_FILE: &'static str = "command_rules.json";

    pub fn effective_rules_file(&self) -> &str {
        self.rules_file.as_deref().unwrap_or(Self::DEFAULT_RULES_FILE)
    }

    pub fn merge(&mut self, other: CommandSettings) {
        if other.rules_file.is_some() {
            self.rules_file = other.rules_file;
        }
        if other.enforce_allowlist.is_some() {
            self.enforce_allowlist = other.enforce_allowlist;
        }
        if !other.allowlist.is_empty() {
            self.allowlist = other.allowlist;
        }
    }
}
