//! Evidence policy - when may a run stop?
//!
//! A troubleshooting answer is only accepted once enough tools have been
//! consulted. Small talk and questions about the assistant itself are exempt,
//! and requests that already carry an alert payload need less extra evidence.
//!
//! The keyword lists are tunable; agents only see the [`EvidencePolicy`] trait.

use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;
use triage_foundation::AgentSettings;
use triage_provider::ToolCall;

/// Decides whether a run has gathered enough evidence to finish
pub trait EvidencePolicy: Send + Sync {
    /// Greeting, thanks or a question about the assistant's capabilities
    fn is_conversational(&self, message: &str) -> bool;

    /// The request already carries alert details
    fn has_alert_context(&self, message: &str) -> bool;

    /// Tool invocations needed before a final answer is accepted
    fn required_tool_calls(&self, message: &str) -> usize;

    fn is_satisfied(&self, message: &str, tool_calls_made: usize) -> bool {
        tool_calls_made >= self.required_tool_calls(message)
    }

    /// Instruction injected when the model answers too early
    fn continue_instruction(&self, tool_calls_made: usize, required: usize) -> String {
        format!(
            "You have only used {} of the required {} tools. Do not answer yet. \
             Keep investigating with the available tools (runbooks, metrics, logs, alerts) \
             and give the final answer once the evidence supports it.",
            tool_calls_made, required
        )
    }

    /// Identical calls tolerated before the model is told to change approach
    fn stuck_threshold(&self) -> usize {
        3
    }

    fn stuck_instruction(&self, tool_name: &str) -> String {
        format!(
            "You have called '{}' with the same arguments several times and the result will not change. \
             Change approach: use a different tool or different arguments, or give your answer.",
            tool_name
        )
    }
}

// ============================================================================
// Default policy
// ============================================================================

const CONVERSATIONAL_PATTERNS: &[&str] = &[
    r"^(hi|hello|hey|yo|greetings|good (morning|afternoon|evening))\b[\s!.,?]*\w{0,12}[\s!.?]*$",
    r"^(thanks|thank you|thx|cheers|ok|okay|bye|goodbye)\b[\s\w!.,]{0,20}$",
    r"\bwhat can you do\b",
    r"\bwho are you\b",
    r"\bwhat are you\b",
    r"\b(your|which|what) (capabilities|tools)\b",
    r"\bhow (do|can) (i|you) use you\b",
    r"\bhelp me understand what you\b",
];

const ALERT_MARKERS: &[&str] = &[
    r"\[alert\]",
    r"\balertname\s*[:=]",
    r"\balert\s*:",
    r"\bstatus\s*[:=]\s*firing\b",
    r"\b(is|are|was|were|currently|now) firing\b",
    r"\bfiring alerts?\b",
];

/// Keyword/regex policy configured from [`AgentSettings`]
pub struct DefaultEvidencePolicy {
    conversational: Vec<Regex>,
    alert: Vec<Regex>,
    min_tool_calls: usize,
    alert_min_tool_calls: usize,
    stuck_threshold: usize,
}

impl DefaultEvidencePolicy {
    pub fn new(min_tool_calls: usize, alert_min_tool_calls: usize) -> Self {
        Self {
            conversational: compile(CONVERSATIONAL_PATTERNS),
            alert: compile(ALERT_MARKERS),
            min_tool_calls,
            alert_min_tool_calls,
            stuck_threshold: 3,
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::new(
            settings.effective_min_tool_calls(),
            settings.effective_alert_min_tool_calls(),
        )
    }

    pub fn with_stuck_threshold(mut self, threshold: usize) -> Self {
        self.stuck_threshold = threshold.max(2);
        self
    }

    /// Extra conversational pattern (case-insensitive)
    pub fn with_conversational_pattern(mut self, pattern: &str) -> Self {
        self.conversational.extend(compile(&[pattern]));
        self
    }

    /// Extra alert marker (case-insensitive)
    pub fn with_alert_marker(mut self, pattern: &str) -> Self {
        self.alert.extend(compile(&[pattern]));
        self
    }
}

impl Default for DefaultEvidencePolicy {
    fn default() -> Self {
        Self::new(
            AgentSettings::DEFAULT_MIN_TOOL_CALLS,
            AgentSettings::DEFAULT_ALERT_MIN_TOOL_CALLS,
        )
    }
}

impl EvidencePolicy for DefaultEvidencePolicy {
    fn is_conversational(&self, message: &str) -> bool {
        let message = message.trim().to_lowercase();
        if message.is_empty() {
            return true;
        }
        self.conversational.iter().any(|re| re.is_match(&message))
    }

    fn has_alert_context(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        self.alert.iter().any(|re| re.is_match(&message))
    }

    fn required_tool_calls(&self, message: &str) -> usize {
        if self.is_conversational(message) {
            0
        } else if self.has_alert_context(message) {
            self.alert_min_tool_calls
        } else {
            self.min_tool_calls
        }
    }

    fn stuck_threshold(&self) -> usize {
        self.stuck_threshold
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| match Regex::new(&format!("(?i){}", p)) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!("Skipping invalid policy pattern '{}': {}", p, e);
                None
            }
        })
        .collect()
}

// ============================================================================
// Stuck detection
// ============================================================================

/// Counts identical (name, arguments) calls within one run
#[derive(Debug, Default)]
pub struct RepeatGuard {
    seen: HashMap<String, usize>,
}

impl RepeatGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call. Returns true each time the same call reaches a multiple
    /// of `threshold`.
    pub fn record(&mut self, name: &str, arguments: &Value, threshold: usize) -> bool {
        let count = self.seen.entry(signature(name, arguments)).or_insert(0);
        *count += 1;
        threshold > 0 && *count % threshold == 0
    }

    pub fn record_call(&mut self, call: &ToolCall, threshold: usize) -> bool {
        self.record(&call.name, &call.arguments, threshold)
    }
}

fn signature(name: &str, arguments: &Value) -> String {
    // serde_json object keys are sorted, so equal objects serialize identically
    format!("{}:{}", name, arguments)
}
