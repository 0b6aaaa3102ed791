//! Wiring - builds the validator, tool modules and MCP bridges from config

use std::sync::Arc;
use tracing::{info, warn};
use triage_core::{
    CommandModule, CommandValidator, HttpObservabilityBackend, JsonKnowledgeBase, JsonRuleStore,
    KnowledgeModule, McpClient, McpToolModule, ObservabilityModule, ToolModule, ToolRegistry,
    ValidatorOptions,
};
use triage_foundation::{CommandSettings, JsonStore, TriageConfig};

/// Registry plus the MCP connections it depends on
pub struct Tools {
    pub registry: Arc<ToolRegistry>,
    mcp_clients: Vec<Arc<McpClient>>,
}

impl Tools {
    /// Close every MCP stream
    pub async fn shutdown(&self) {
        for client in &self.mcp_clients {
            if let Err(e) = client.disconnect().await {
                warn!("Failed to disconnect MCP server {}: {}", client.name(), e);
            }
        }
    }
}

/// Store holding `filename`: the project `.triage/` when present, else global
pub fn data_store(filename: &str) -> Option<JsonStore> {
    let project = JsonStore::current_project().ok();
    if let Some(store) = project.as_ref().filter(|s| s.exists(filename)) {
        return Some(store.clone());
    }
    JsonStore::global().ok().or(project)
}

pub fn build_validator(settings: &CommandSettings) -> CommandValidator {
    let validator = CommandValidator::with_options(ValidatorOptions {
        enforce_allowlist: settings.enforce_allowlist.unwrap_or(false),
        allowlist: settings.allowlist.clone(),
    });

    let rules_file = settings.effective_rules_file();
    if let Some(store) = data_store(rules_file) {
        if let Err(e) = validator.load_custom_rules(&JsonRuleStore::new(store, rules_file)) {
            warn!("Ignoring custom command rules: {}", e);
        }
    }
    validator
}

pub async fn build_tools(config: &TriageConfig) -> anyhow::Result<Tools> {
    let mode = config.agent.effective_mode();
    let mut builder = ToolRegistry::builder().mode(mode);

    // Knowledge
    let runbooks_file = config.knowledge.effective_runbooks_file();
    let knowledge = match data_store(runbooks_file) {
        Some(store) => JsonKnowledgeBase::load(&store, runbooks_file).unwrap_or_else(|e| {
            warn!("Failed to load runbooks: {}", e);
            JsonKnowledgeBase::new(Vec::new())
        }),
        None => JsonKnowledgeBase::new(Vec::new()),
    };
    info!("Knowledge base: {} runbooks", knowledge.len());
    builder = builder.module(KnowledgeModule::new(Arc::new(knowledge)));

    // Observability
    let observability = &config.observability;
    if observability.prometheus_url.is_some() || observability.loki_url.is_some() {
        let backend = HttpObservabilityBackend::from_settings(observability)?;
        builder = builder.module(ObservabilityModule::new(Arc::new(backend)));
    } else {
        info!("No Prometheus or Loki configured; observability tools disabled");
    }

    // Commands
    let validator = Arc::new(build_validator(&config.commands));
    builder = builder.module(CommandModule::new(validator));

    // MCP servers
    let mut mcp_clients = Vec::new();
    for server in config.enabled_mcp_servers() {
        let client = Arc::new(McpClient::from_settings(server));
        let discovered = match client.connect().await {
            Ok(()) => McpToolModule::discover(Arc::clone(&client), server.read_only).await,
            Err(e) => Err(e),
        };
        match discovered {
            Ok(module) => {
                info!("MCP server {}: {} tools", server.name, module.definitions().len());
                builder = builder.module(module);
                mcp_clients.push(client);
            }
            Err(e) => {
                warn!("Skipping MCP server {} ({}): {}", server.name, server.url, e);
                let _ = client.disconnect().await;
            }
        }
    }

    Ok(Tools {
        registry: Arc::new(builder.build()),
        mcp_clients,
    })
}
