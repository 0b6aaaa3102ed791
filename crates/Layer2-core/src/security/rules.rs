//! Built-in command rule tables

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;
use triage_foundation::OsType;

use super::RiskLevel;

// ============================================================
// OS scope
// ============================================================

/// Which operating systems a rule applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsScope {
    #[default]
    All,
    /// Linux and macOS
    Unix,
    Linux,
    #[serde(alias = "darwin", alias = "mac")]
    Macos,
    Windows,
}

impl OsScope {
    /// An unknown OS is checked against every rule
    pub fn applies_to(&self, os: OsType) -> bool {
        match (self, os) {
            (Self::All, _) | (_, OsType::Unknown) => true,
            (Self::Unix, os) => os.is_unix(),
            (Self::Linux, OsType::Linux) => true,
            (Self::Macos, OsType::MacOS) => true,
            (Self::Windows, OsType::Windows) => true,
            _ => false,
        }
    }
}

// ============================================================
// Compiled rule
// ============================================================

/// A compiled pattern with its verdict metadata
#[derive(Debug, Clone)]
pub struct CommandRule {
    pub pattern: String,
    regex: Regex,
    pub reason: String,
    pub severity: RiskLevel,
    pub os_scope: OsScope,
}

impl CommandRule {
    pub fn new(
        pattern: impl Into<String>,
        reason: impl Into<String>,
        severity: RiskLevel,
        os_scope: OsScope,
    ) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)?;
        Ok(Self {
            pattern,
            regex,
            reason: reason.into(),
            severity,
            os_scope,
        })
    }

    pub fn matches(&self, command: &str, os: OsType) -> bool {
        self.os_scope.applies_to(os) && self.regex.is_match(command)
    }
}

type RuleSpec = (&'static str, &'static str, RiskLevel, OsScope);

fn compile(table: &[RuleSpec]) -> Vec<CommandRule> {
    table
        .iter()
        .filter_map(|(pattern, reason, severity, scope)| {
            match CommandRule::new(*pattern, *reason, *severity, *scope) {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Skipping built-in rule '{}': {}", pattern, e);
                    None
                }
            }
        })
        .collect()
}

// ============================================================
// Blocklist (always rejected)
// ============================================================

const BLOCKLIST: &[RuleSpec] = &[
    // Filesystem destruction
    (
        r"\brm\s+(?:-\S*\s+)*(?:-[a-zA-Z]*[rR][a-zA-Z]*|--recursive)\s+(?:-\S*\s+)*(?:/\*?|~/?|\$HOME/?)(?:\s|;|&|\||$)",
        "Recursive deletion of root or home directory",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"--no-preserve-root",
        "Root deletion safeguard disabled",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r":\(\)\s*\{\s*:\s*\|\s*:\s*&\s*\}\s*;\s*:",
        "Fork bomb",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    // Remote code execution
    (
        r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|k|da)?sh\b",
        "Remote script piped into a shell",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:python[0-9.]*|perl|ruby|node)\b",
        "Remote script piped into an interpreter",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"\b(?:ba|z)?sh\s+<\(\s*(?:curl|wget)\b",
        "Remote script executed through process substitution",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"/dev/(?:tcp|udp)/",
        "Reverse shell through /dev/tcp",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"\b(?:nc|ncat|netcat)\b.*\s-[a-zA-Z]*e\s",
        "Netcat command execution",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    // Disk formatting and raw writes
    (
        r"\bmkfs(?:\.\w+)?\b",
        "Filesystem formatting",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"\bdd\b.*\bof=/dev/(?:sd|hd|nvme|xvd|vd|mmcblk|disk)",
        "Raw write to a block device",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r">\s*/dev/(?:sd|hd|nvme|xvd|vd)[a-z0-9]*",
        "Redirect into a block device",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r"\b(?:wipefs|shred)\b.*\s/dev/",
        "Device wipe",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    (
        r">\s*/etc/(?:passwd|shadow|sudoers)\b",
        "Overwrite of account database",
        RiskLevel::Critical,
        OsScope::Unix,
    ),
    // Kernel tampering
    (
        r"\b(?:insmod|rmmod)\b",
        "Kernel module load or unload",
        RiskLevel::Critical,
        OsScope::Linux,
    ),
    (
        r"\bmodprobe\s+(?:-r|--remove)\b",
        "Kernel module removal",
        RiskLevel::Critical,
        OsScope::Linux,
    ),
    (
        r"/proc/sysrq-trigger",
        "SysRq trigger",
        RiskLevel::Critical,
        OsScope::Linux,
    ),
    (
        r"\bkextunload\b",
        "Kernel extension unload",
        RiskLevel::Critical,
        OsScope::Macos,
    ),
    (
        r"\bchmod\s+(?:-R\s+)?[0-7]?777\s+/(?:\s|$)",
        "World-writable root filesystem",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r"\b(?:shutdown|poweroff|halt)\b|\binit\s+[06]\b",
        "Host shutdown",
        RiskLevel::High,
        OsScope::Unix,
    ),
    // Windows
    (
        r"(?i)\bformat(?:\.com)?\s+[a-z]:",
        "Drive formatting",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\b(?:rd|rmdir)\s+(?:/[sq]\s+)+[a-z]:\\?(?:\s|$)",
        "Recursive deletion of a drive root",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\bdel\s+(?:/[a-z]\s+)*[a-z]:\\(?:\*(?:\.\*)?)?(?:\s|$)",
        "Deletion of a drive root",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\bRemove-Item\b.*-Recurse.*\s[a-z]:\\\*?(?:\s|$)",
        "Recursive deletion of a drive root",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\breg(?:\.exe)?\s+delete\s+(?:HKLM|HKEY_LOCAL_MACHINE)\b",
        "Machine registry deletion",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\bbcdedit\b",
        "Boot configuration tampering",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\bdiskpart\b",
        "Disk partitioning",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\bvssadmin\s+delete\s+shadows\b",
        "Shadow copy deletion",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\b(?:iwr|Invoke-WebRequest|DownloadString|curl|wget)\b.*\|\s*(?:iex|Invoke-Expression)\b",
        "Remote script piped into Invoke-Expression",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
    (
        r"(?i)\b(?:iex|Invoke-Expression)\b.*\b(?:iwr|Invoke-WebRequest|DownloadString)\b",
        "Invoke-Expression on downloaded content",
        RiskLevel::Critical,
        OsScope::Windows,
    ),
];

// ============================================================
// Suspicious (allowed with a warning)
// ============================================================

const SUSPICIOUS: &[RuleSpec] = &[
    (
        r"(?:^|[;&|]\s*)(?:sudo|doas)\b",
        "Privilege elevation",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r"(?:^|[;&|]\s*)su(?:\s+-|\s+root)?(?:\s|$)",
        "Switch to another user",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r">>?\s*/(?:etc|boot|usr|bin|sbin|lib)/",
        "Write to a protected system path",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r"\b(?:tee|cp|mv|install)\b.*\s/(?:etc|boot|bin|sbin|usr/bin|usr/sbin)/",
        "Copy into a protected system path",
        RiskLevel::Medium,
        OsScope::Unix,
    ),
    (
        r"\b(?:apt|apt-get|yum|dnf|zypper|apk|pacman|brew|snap)\s+(?:install|remove|purge|upgrade|add|del|-S|-R)\b",
        "Package installation or removal",
        RiskLevel::Medium,
        OsScope::Unix,
    ),
    (
        r"\b(?:pip3?|npm|gem|cargo)\s+install\b",
        "Package installation",
        RiskLevel::Medium,
        OsScope::All,
    ),
    (
        r"\b(?:killall|pkill)\b|\bkill\s+-(?:9|KILL)\s+-1\b",
        "Process kill by name or of every process",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r"\bkill\s+-(?:9|KILL)\b",
        "Forced process kill",
        RiskLevel::Medium,
        OsScope::Unix,
    ),
    (
        r"\bsystemctl\s+(?:stop|disable|mask|isolate)\b",
        "Service stop or disable",
        RiskLevel::Medium,
        OsScope::Linux,
    ),
    (
        r"\breboot\b",
        "Host reboot",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r"\biptables\s+(?:-F|--flush|-X)\b|\bufw\s+disable\b",
        "Firewall flush",
        RiskLevel::High,
        OsScope::Linux,
    ),
    (
        r"\bcrontab\s+-r\b",
        "Crontab removal",
        RiskLevel::High,
        OsScope::Unix,
    ),
    (
        r"\brm\s+(?:-\S*\s+)*(?:-[a-zA-Z]*[rR]|--recursive\b)",
        "Recursive deletion",
        RiskLevel::Medium,
        OsScope::Unix,
    ),
    (
        r"\bchmod\s+(?:-R\s+)?[0-7]?777\b|\bchown\s+-R\b",
        "Broad permission change",
        RiskLevel::Medium,
        OsScope::Unix,
    ),
    (
        r"(?i)\bStart-Process\b.*-Verb\s+RunAs\b|\brunas\b",
        "Privilege elevation",
        RiskLevel::High,
        OsScope::Windows,
    ),
    (
        r"(?i)\bSet-ExecutionPolicy\b",
        "Script execution policy change",
        RiskLevel::High,
        OsScope::Windows,
    ),
    (
        r"(?i)\b(?:choco|winget|scoop)\s+(?:install|uninstall)\b",
        "Package installation or removal",
        RiskLevel::Medium,
        OsScope::Windows,
    ),
    (
        r"(?i)\breg(?:\.exe)?\s+(?:add|delete)\b",
        "Registry modification",
        RiskLevel::Medium,
        OsScope::Windows,
    ),
    (
        r"(?i)\b(?:Stop-Service|taskkill)\b|\bnet\s+stop\b",
        "Service or process stop",
        RiskLevel::Medium,
        OsScope::Windows,
    ),
];

// ============================================================
// Read-only diagnostics (allowlist default)
// ============================================================

const DIAGNOSTICS: &[&str] = &[
    r"^(?:ls|cat|head|tail|less|grep|egrep|zgrep|wc|find|stat|file)\b",
    r"^(?:df|du|free|uptime|uname|hostname|whoami|id|date|vmstat|iostat|mpstat|lsblk|lscpu)\b",
    r"^(?:ps|pgrep|top\s+-b|htop)\b",
    r"^(?:ss|netstat|ip\s+(?:a|addr|route|link)|ping|traceroute|dig|nslookup|host)\b",
    r"^curl\s+(?:-[sSIfkv]+\s+)*https?://",
    r"^journalctl\b",
    r"^systemctl\s+(?:status|is-active|is-enabled|list-units|show)\b",
    r"^(?:docker|podman)\s+(?:ps|logs|inspect|stats)\b",
    r"^kubectl\s+(?:get|describe|logs|top)\b",
    r"(?i)^(?:Get-[A-Za-z]+|dir|type|ipconfig|tasklist|systeminfo)\b",
];

/// Options that turn an allowlisted diagnostic into a write or an exec
const DIAGNOSTIC_EXCLUSIONS: &[&str] = &[
    r"^find\b.*\s-(?:delete|exec|execdir|ok|okdir|fprint0?|fprintf|fls)\b",
    r"^curl\b.*\s(?:-X|--request|-d|--data\S*|-F|--form|-T|--upload-file|-o|--output|-O|--remote-name)(?:\s|=|$)",
];

/// Shell constructs that hide extra commands or writes from per-segment checks
pub(crate) const SHELL_CONSTRUCTS: &[&str] = &["$(", "`", ">", "<("];

pub(crate) fn builtin_blocklist() -> Vec<CommandRule> {
    compile(BLOCKLIST)
}

pub(crate) fn builtin_suspicious() -> Vec<CommandRule> {
    compile(SUSPICIOUS)
}

pub(crate) fn builtin_allowlist() -> Vec<CommandRule> {
    compile_diagnostics(DIAGNOSTICS, "Read-only diagnostic")
}

pub(crate) fn builtin_allowlist_exclusions() -> Vec<CommandRule> {
    compile_diagnostics(DIAGNOSTIC_EXCLUSIONS, "Diagnostic with side effects")
}

fn compile_diagnostics(patterns: &[&str], reason: &str) -> Vec<CommandRule> {
    patterns
        .iter()
        .filter_map(|pattern| {
            CommandRule::new(*pattern, reason, RiskLevel::Low, OsScope::All)
                .map_err(|e| warn!("Skipping built-in allowlist entry '{}': {}", pattern, e))
                .ok()
        })
        .collect()
}

/// Split on `;`, `|`, `&` and newlines into whitespace-normalized segments
pub(crate) fn command_segments(command: &str) -> Vec<String> {
    command
        .split(|c| matches!(c, ';' | '|' | '&' | '\n'))
        .map(|segment| segment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|segment| !segment.is_empty())
        .collect()
}
