//! Custom rule sources

use serde::{Deserialize, Serialize};
use triage_foundation::{JsonStore, Result};

use super::{OsScope, RiskLevel};

/// Which table a custom row extends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    #[default]
    Block,
    Suspicious,
    Allow,
}

/// One stored rule, uncompiled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRuleRow {
    pub pattern: String,

    #[serde(default)]
    pub reason: String,

    #[serde(default = "default_severity")]
    pub severity: RiskLevel,

    #[serde(default)]
    pub os_scope: OsScope,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub kind: RuleKind,
}

fn default_severity() -> RiskLevel {
    RiskLevel::High
}

fn default_enabled() -> bool {
    true
}

impl CommandRuleRow {
    pub fn block(pattern: impl Into<String>, reason: impl Into<String>, severity: RiskLevel) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
            severity,
            os_scope: OsScope::All,
            enabled: true,
            kind: RuleKind::Block,
        }
    }

    pub fn with_kind(mut self, kind: RuleKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_os_scope(mut self, os_scope: OsScope) -> Self {
        self.os_scope = os_scope;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Source of operator-defined rules
pub trait CommandRuleStore: Send + Sync {
    fn load_rules(&self) -> Result<Vec<CommandRuleRow>>;
}

/// Rules kept in a JSON array file
pub struct JsonRuleStore {
    store: JsonStore,
    filename: String,
}

impl JsonRuleStore {
    pub fn new(store: JsonStore, filename: impl Into<String>) -> Self {
        Self {
            store,
            filename: filename.into(),
        }
    }
}

impl CommandRuleStore for JsonRuleStore {
    /// A missing file yields no rules
    fn load_rules(&self) -> Result<Vec<CommandRuleRow>> {
        Ok(self
            .store
            .load_optional::<Vec<CommandRuleRow>>(&self.filename)?
            .unwrap_or_default())
    }
}

/// Fixed in-memory rule set
#[derive(Debug, Clone, Default)]
pub struct StaticRuleStore(pub Vec<CommandRuleRow>);

impl CommandRuleStore for StaticRuleStore {
    fn load_rules(&self) -> Result<Vec<CommandRuleRow>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonRuleStore::new(JsonStore::new(dir.path()), "command_rules.json");
        assert!(store.load_rules().unwrap().is_empty());
    }

    #[test]
    fn test_row_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("command_rules.json"),
            r#"[{"pattern": "\\bdrop\\s+database\\b", "reason": "Database drop"},
               {"pattern": "^uptime$", "kind": "allow", "osScope": "linux", "enabled": false}]"#,
        )
        .unwrap();

        let store = JsonRuleStore::new(JsonStore::new(dir.path()), "command_rules.json");
        let rows = store.load_rules().unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].severity, RiskLevel::High);
        assert_eq!(rows[0].kind, RuleKind::Block);
        assert!(rows[0].enabled);
        assert_eq!(rows[1].kind, RuleKind::Allow);
        assert_eq!(rows[1].os_scope, OsScope::Linux);
        assert!(!rows[1].enabled);
    }
}
