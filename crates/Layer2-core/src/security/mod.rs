//! Security - command safety policy
//!
//! Every command the agent proposes to an operator passes through
//! [`CommandValidator`] first. The validator never executes anything.
//!
//! ```text
//! validate(command, os)
//!   │
//!   ├─ blocklist (built-in + custom, OS-scoped) ── match ─▶ BLOCKED
//!   ├─ allowlist (only when enforced) ──────────── miss ──▶ BLOCKED
//!   │                                               hit ───▶ ALLOWED
//!   ├─ suspicious set ─────────────────────────── match ─▶ SUSPICIOUS
//!   └─ otherwise ──────────────────────────────────────────▶ ALLOWED
//! ```

mod rules;
mod store;
mod validator;

pub use rules::{CommandRule, OsScope};
pub use store::{CommandRuleRow, CommandRuleStore, JsonRuleStore, RuleKind, StaticRuleStore};
pub use validator::{CommandValidator, ValidatorOptions};

use serde::{Deserialize, Serialize};

/// Severity of a matched rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Low
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationResult {
    Allowed,
    Suspicious,
    Blocked,
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allowed => f.write_str("ALLOWED"),
            Self::Suspicious => f.write_str("SUSPICIOUS"),
            Self::Blocked => f.write_str("BLOCKED"),
        }
    }
}

/// Result of [`CommandValidator::validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandValidation {
    pub result: ValidationResult,

    /// The command exactly as proposed
    pub command: String,

    pub reason: String,

    /// Regex of the rule that decided the verdict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,

    pub risk_level: RiskLevel,
}

impl CommandValidation {
    pub fn is_blocked(&self) -> bool {
        self.result == ValidationResult::Blocked
    }

    pub fn is_allowed(&self) -> bool {
        self.result == ValidationResult::Allowed
    }

    /// Convert a blocked verdict into the typed error
    pub fn into_error(self) -> Option<triage_foundation::Error> {
        if !self.is_blocked() {
            return None;
        }
        Some(triage_foundation::Error::validation_blocked(
            self.matched_pattern.unwrap_or_else(|| self.reason.clone()),
            self.risk_level.as_str(),
        ))
    }
}
