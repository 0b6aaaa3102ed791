//! Environment Detection - target operating system of a proposed command
//!
//! Command validation is OS-scoped: a rule written for Windows registry
//! tampering is irrelevant to a Linux host and vice versa.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Operating system family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsType {
    Windows,
    #[serde(alias = "darwin", alias = "mac")]
    MacOS,
    Linux,
    Unknown,
}

impl OsType {
    /// OS of the machine running Triage
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOS
        } else if cfg!(target_os = "linux") {
            Self::Linux
        } else {
            Self::Unknown
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::MacOS => "macOS",
            Self::Linux => "Linux",
            Self::Unknown => "Unknown",
        }
    }

    /// Linux and macOS share POSIX shell semantics
    pub fn is_unix(&self) -> bool {
        matches!(self, Self::Linux | Self::MacOS)
    }
}

impl Default for OsType {
    fn default() -> Self {
        Self::Linux
    }
}

impl std::fmt::Display for OsType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for OsType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "windows" | "win" | "win32" => Ok(Self::Windows),
            "macos" | "mac" | "darwin" | "osx" => Ok(Self::MacOS),
            "linux" | "unix" => Ok(Self::Linux),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("Unknown OS type: {}", other)),
        }
    }
}
