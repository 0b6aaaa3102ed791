//! Tool Registry - module composition and dispatch
//!
//! Modules contribute tool definitions; the registry indexes them by name,
//! renders them for providers, and routes calls back to the owning module.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use triage_foundation::{AgentMode, Error, Result};
use triage_provider::ToolDef;

use super::definition::ToolDefinition;

/// A group of related tools sharing one backend
#[async_trait]
pub trait ToolModule: Send + Sync {
    fn name(&self) -> &str;

    /// Read-only modules are the only ones offered to background runs
    fn read_only(&self) -> bool;

    fn definitions(&self) -> &[ToolDefinition];

    async fn execute(&self, tool: &str, args: Value) -> Result<String>;
}

// ============================================================================
// ToolOutcome
// ============================================================================

/// Result of one dispatch. `Display` is the text fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Success { content: String },
    UnknownTool { name: String, available: Vec<String> },
    Failed { tool: String, message: String },
}

impl ToolOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_error(&self) -> bool {
        !self.is_success()
    }
}

impl std::fmt::Display for ToolOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success { content } => f.write_str(content),
            Self::UnknownTool { name, available } => write!(
                f,
                "Error: unknown tool '{}'. Available tools: {}",
                name,
                available.join(", ")
            ),
            Self::Failed { tool, message } => {
                write!(f, "Error: tool '{}' failed: {}", tool, message)
            }
        }
    }
}

fn failure_message(error: &Error) -> String {
    match error {
        Error::ToolExecution { message, .. } => message.clone(),
        Error::ValidationBlocked { .. } => format!(
            "{}. The command was refused and must not be run; suggest a safer alternative.",
            error
        ),
        other => other.to_string(),
    }
}

// ============================================================================
// ToolRegistry
// ============================================================================

struct Entry {
    definition: ToolDefinition,
    module: usize,
}

pub struct ToolRegistry {
    mode: AgentMode,
    modules: Vec<Arc<dyn ToolModule>>,
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn mode(&self) -> AgentMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.entries[i].definition)
    }

    /// Registration order
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .map(|e| e.definition.name.as_str())
            .collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.entries.iter().map(|e| &e.definition)
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn function_schemas(&self) -> Vec<Value> {
        self.definitions().map(|d| d.function_schema()).collect()
    }

    pub fn anthropic_schemas(&self) -> Vec<Value> {
        self.definitions().map(|d| d.anthropic_schema()).collect()
    }

    pub fn text_description(&self) -> String {
        self.definitions()
            .map(|d| d.text_description())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.definitions().map(|d| d.to_tool_def()).collect()
    }

    /// Dispatch by name. Failures are folded into the outcome.
    pub async fn execute(&self, name: &str, args: Value) -> ToolOutcome {
        let Some(&i) = self.index.get(name) else {
            warn!("Model requested unknown tool: {}", name);
            return ToolOutcome::UnknownTool {
                name: name.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            };
        };

        let module = &self.modules[self.entries[i].module];
        info!("Tool {} started ({})", name, module.name());
        let start = Instant::now();

        match module.execute(name, args).await {
            Ok(content) => {
                info!(
                    "Tool {} finished in {}ms ({} bytes)",
                    name,
                    start.elapsed().as_millis(),
                    content.len()
                );
                ToolOutcome::Success { content }
            }
            Err(e) => {
                warn!(
                    "Tool {} failed after {}ms: {}",
                    name,
                    start.elapsed().as_millis(),
                    e
                );
                ToolOutcome::Failed {
                    tool: name.to_string(),
                    message: failure_message(&e),
                }
            }
        }
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    mode: AgentMode,
    modules: Vec<Arc<dyn ToolModule>>,
}

impl ToolRegistryBuilder {
    pub fn mode(mut self, mode: AgentMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn module(self, module: impl ToolModule + 'static) -> Self {
        self.shared_module(Arc::new(module))
    }

    pub fn shared_module(mut self, module: Arc<dyn ToolModule>) -> Self {
        self.modules.push(module);
        self
    }

    pub fn modules(mut self, modules: impl IntoIterator<Item = Arc<dyn ToolModule>>) -> Self {
        self.modules.extend(modules);
        self
    }

    pub fn build(self) -> ToolRegistry {
        let mut registry = ToolRegistry {
            mode: self.mode,
            modules: Vec::new(),
            entries: Vec::new(),
            index: HashMap::new(),
        };

        for module in self.modules {
            if self.mode == AgentMode::Background && !module.read_only() {
                debug!("Skipping module '{}' in background mode", module.name());
                continue;
            }

            let slot = registry.modules.len();
            for definition in module.definitions() {
                if let Some(&existing) = registry.index.get(&definition.name) {
                    let owner = registry.modules[registry.entries[existing].module].name();
                    warn!(
                        "Tool '{}' from module '{}' already registered by '{}', skipping",
                        definition.name,
                        module.name(),
                        owner
                    );
                    continue;
                }
                registry
                    .index
                    .insert(definition.name.clone(), registry.entries.len());
                registry.entries.push(Entry {
                    definition: definition.clone(),
                    module: slot,
                });
            }
            registry.modules.push(module);
        }

        info!(
            "Tool registry ready: {} tools from {} modules ({:?} mode)",
            registry.entries.len(),
            registry.modules.len(),
            registry.mode
        );
        registry
    }
}
