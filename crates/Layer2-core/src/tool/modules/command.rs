//! Command module - `suggest_command`
//!
//! Records a remediation command for a human operator. Nothing is executed;
//! every proposal is classified by [`CommandValidator`] first.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use triage_foundation::{Error, OsType, Result};

use crate::security::{CommandValidator, RiskLevel, ValidationResult};
use crate::tool::args::{optional_str, required_str};
use crate::tool::{ToolCategory, ToolDefinition, ToolModule, ToolParameter};

pub const SUGGEST_COMMAND: &str = "suggest_command";

pub struct CommandModule {
    validator: Arc<CommandValidator>,
    default_os: OsType,
    definitions: Vec<ToolDefinition>,
}

impl CommandModule {
    pub fn new(validator: Arc<CommandValidator>) -> Self {
        let definitions = vec![ToolDefinition::new(
            SUGGEST_COMMAND,
            "Propose a single shell command for the operator to run on a server. \
             The command is validated and shown to the operator; it is never executed automatically.",
            ToolCategory::Command,
        )
        .risk_level(RiskLevel::Medium)
        .requires_confirmation(true)
        .param(ToolParameter::string("server", "Target host, e.g. web-1", true))
        .param(ToolParameter::string("command", "The exact shell command", true))
        .param(ToolParameter::string(
            "reason",
            "Why this command resolves the issue",
            false,
        ))
        .param(
            ToolParameter::string("os", "Target operating system", false)
                .with_enum(&["linux", "macos", "windows"]),
        )];

        Self {
            validator,
            default_os: OsType::Linux,
            definitions,
        }
    }

    /// OS assumed when the model does not name one
    pub fn with_default_os(mut self, os: OsType) -> Self {
        self.default_os = os;
        self
    }

    fn suggest(&self, args: &Value) -> Result<String> {
        let server = required_str(args, "server")?;
        let command = required_str(args, "command")?;
        let reason = optional_str(args, "reason");
        let os = match optional_str(args, "os") {
            Some(raw) => raw.parse::<OsType>().unwrap_or_else(|_| {
                warn!("Unknown os '{}', assuming {}", raw, self.default_os);
                self.default_os
            }),
            None => self.default_os,
        };

        let validation = self.validator.validate(command, os);
        if validation.is_blocked() {
            warn!(
                "Refused command for {}: {} ({})",
                server, validation.command, validation.reason
            );
            return Err(Error::validation_blocked(
                validation
                    .matched_pattern
                    .unwrap_or_else(|| validation.reason.clone()),
                validation.risk_level.as_str(),
            ));
        }

        info!(
            "Command suggested for {}: {} [{}]",
            server, command, validation.result
        );

        let mut out = format!(
            "Command suggestion recorded for server '{}' ({}):\n\n    {}\n",
            server, os, command
        );
        if let Some(reason) = reason {
            out.push_str(&format!("\nReason: {}", reason));
        }
        out.push_str(&format!(
            "\nValidation: {} (risk {})",
            validation.result, validation.risk_level
        ));
        if validation.result == ValidationResult::Suspicious {
            out.push_str(&format!(
                "\nWarning: {}. The operator must review this command carefully before running it.",
                validation.reason
            ));
        }
        out.push_str(
            "\n\nThe command has NOT been executed. Present it to the operator for manual \
             execution and stop; do not call further tools.",
        );
        Ok(out)
    }
}

#[async_trait]
impl ToolModule for CommandModule {
    fn name(&self) -> &str {
        "command"
    }

    fn read_only(&self) -> bool {
        false
    }

    fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    async fn execute(&self, tool: &str, args: Value) -> Result<String> {
        match tool {
            SUGGEST_COMMAND => self.suggest(&args),
            other => Err(Error::ToolNotFound(other.to_string())),
        }
    }
}
