//! MCP Bridge - exposes MCP-discovered tools as a [`ToolModule`]

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use triage_foundation::{Error, Result};

use super::client::McpClient;
use super::types::McpTool;
use crate::security::RiskLevel;
use crate::tool::{ToolCategory, ToolDefinition, ToolModule, ToolParameter};

pub struct McpToolModule {
    name: String,
    client: Arc<McpClient>,
    read_only: bool,
    definitions: Vec<ToolDefinition>,
}

impl McpToolModule {
    /// List the server's tools and wrap them
    pub async fn discover(client: Arc<McpClient>, read_only: bool) -> Result<Self> {
        let tools = client.list_tools().await?;
        Ok(Self::from_tools(client, read_only, &tools))
    }

    pub fn from_tools(client: Arc<McpClient>, read_only: bool, tools: &[McpTool]) -> Self {
        let definitions = tools
            .iter()
            .map(|tool| tool_definition(client.name(), tool, read_only))
            .collect::<Vec<_>>();
        info!(
            "Bridged {} tools from MCP server '{}'",
            definitions.len(),
            client.name()
        );

        Self {
            name: format!("mcp:{}", client.name()),
            client,
            read_only,
            definitions,
        }
    }

    async fn call(&self, tool: &str, args: Value) -> Result<String> {
        let result = match self.client.call_tool(tool, args.clone()).await {
            Err(Error::McpConnection(reason)) => {
                warn!(
                    "MCP '{}' unavailable ({}), reconnecting once",
                    self.client.name(),
                    reason
                );
                let _ = self.client.disconnect().await;
                self.client.connect().await?;
                self.client.call_tool(tool, args).await?
            }
            other => other?,
        };

        if result.is_error {
            return Err(Error::tool_execution(tool, result.flatten_text()));
        }
        Ok(result.flatten_text())
    }
}

/// JSON Schema `properties` → ordered parameter list
fn tool_definition(server: &str, tool: &McpTool, read_only: bool) -> ToolDefinition {
    let description = tool
        .description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Tool provided by MCP server '{}'", server));

    let required: Vec<&str> = tool.input_schema["required"]
        .as_array()
        .map(|r| r.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut definition = ToolDefinition::new(&tool.name, description, ToolCategory::External)
        .risk_level(if read_only { RiskLevel::Low } else { RiskLevel::Medium })
        .requires_confirmation(!read_only);

    if let Some(properties) = tool.input_schema["properties"].as_object() {
        for (name, schema) in properties {
            let mut param = ToolParameter::new(
                name,
                schema["type"].as_str().unwrap_or("string"),
                schema["description"].as_str().unwrap_or_default(),
                required.contains(&name.as_str()),
            );
            if let Some(default) = schema.get("default") {
                param = param.with_default(default.clone());
            }
            if let Some(values) = schema["enum"].as_array() {
                let values: Vec<&str> = values.iter().filter_map(Value::as_str).collect();
                if !values.is_empty() {
                    param = param.with_enum(&values);
                }
            }
            if let Some(items) = schema.get("items") {
                param = param.with_items(items.clone());
            }
            definition = definition.param(param);
        }
    }

    definition
}

#[async_trait]
impl ToolModule for McpToolModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    async fn execute(&self, tool: &str, args: Value) -> Result<String> {
        self.call(tool, args).await
    }
}
