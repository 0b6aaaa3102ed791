//! Agent context - injected dependencies shared by both agent loops

use crate::policy::{DefaultEvidencePolicy, EvidencePolicy};
use std::sync::Arc;
use triage_core::{ToolRegistry, SUGGEST_COMMAND};
use triage_foundation::AgentSettings;
use triage_provider::{Provider, ToolDef};

/// Everything an agent needs, constructed once and passed in
#[derive(Clone)]
pub struct AgentContext {
    /// LLM provider
    pub provider: Arc<dyn Provider>,

    /// Tools available to this run
    pub tools: Arc<ToolRegistry>,

    /// When a run may stop
    pub policy: Arc<dyn EvidencePolicy>,

    /// Model calls per run
    pub max_iterations: usize,

    /// System prompt
    pub system_prompt: String,
}

impl AgentContext {
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        settings: &AgentSettings,
    ) -> Self {
        Self {
            provider,
            tools,
            policy: Arc::new(DefaultEvidencePolicy::from_settings(settings)),
            max_iterations: settings.effective_max_iterations(),
            system_prompt: default_system_prompt(),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn EvidencePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Tool definitions for the provider
    pub fn tool_definitions(&self) -> Vec<ToolDef> {
        self.tools.tool_defs()
    }

    pub fn can_suggest_commands(&self) -> bool {
        self.tools.contains(SUGGEST_COMMAND)
    }
}

/// Default system prompt
pub fn default_system_prompt() -> String {
    r#"You are Triage, an infrastructure troubleshooting assistant for on-call operators.

Investigate before you answer:
- Consult the runbook for the affected service.
- Check metrics, logs and active alerts for the affected hosts.
- Base every conclusion on tool output and say which evidence supports it.

Remediation:
- You never execute anything yourself. When a command should be run, call `suggest_command`
  with the target server and the exact command, then stop and let the operator run it.
- Prefer the least invasive command that fixes the problem.
- If a suggestion is refused, propose a safer alternative instead of repeating it.

Keep answers short: findings, likely cause, next step. Include runbook and dashboard links
from tool output when they are relevant."#
        .to_string()
}
