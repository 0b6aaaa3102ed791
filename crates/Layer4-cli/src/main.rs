//! Triage CLI - Main entry point

mod cli;
mod setup;

use clap::{Parser, Subcommand};
use std::sync::Arc;
use triage_agent::Orchestrator;
use triage_foundation::{AgentMode, OsType, ProviderSettings, ProviderType, TriageConfig};
use triage_provider::Gateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Triage - agentic troubleshooting for on-call operators
#[derive(Parser, Debug)]
#[command(name = "triage")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Run a single request and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Provider to use (anthropic, openai, gemini, groq, ollama)
    #[arg(long)]
    provider: Option<String>,

    /// Model to use
    #[arg(long)]
    model: Option<String>,

    /// API key for the provider (overrides env and config)
    #[arg(long)]
    api_key: Option<String>,

    /// Base URL for the provider (for ollama or custom endpoints)
    #[arg(long)]
    base_url: Option<String>,

    /// Tool set: interactive (all modules) or background (read-only)
    #[arg(long)]
    mode: Option<AgentMode>,

    /// Extra MCP server SSE url (repeatable)
    #[arg(long = "mcp-url")]
    mcp_urls: Vec<String>,

    /// Model calls per request
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Print only the final answer, without progress lines
    #[arg(long)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a shell command without running an agent
    Validate {
        /// The command to check
        command: String,

        /// Target OS (linux, macos, windows); defaults to this machine
        #[arg(long)]
        os: Option<OsType>,
    },
    /// List the tools the agent would receive
    Tools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load configuration
    let mut config = TriageConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        TriageConfig::default()
    });
    apply_args(&mut config, &args)?;

    match args.command {
        Some(Command::Validate { command, os }) => {
            let validator = setup::build_validator(&config.commands);
            let os = os.unwrap_or_else(OsType::detect);
            cli::print_validation(&validator.validate(&command, os), os);
            return Ok(());
        }
        Some(Command::Tools) => {
            let tools = setup::build_tools(&config).await?;
            println!("{}", tools.registry.text_description());
            tools.shutdown().await;
            return Ok(());
        }
        None => {}
    }

    let tools = setup::build_tools(&config).await?;
    let provider = Gateway::create(&config.provider)?;
    let mut orchestrator = Orchestrator::new(provider, Arc::clone(&tools.registry), &config.agent);
    tracing::info!(
        "Ready: {} agent, {} tools",
        orchestrator.mode(),
        tools.registry.len()
    );

    let outcome = match &args.prompt {
        Some(prompt) => cli::run_once(&mut orchestrator, prompt, args.quiet).await,
        None => cli::run_interactive(&mut orchestrator, args.quiet).await,
    };

    tools.shutdown().await;
    outcome
}

/// Command-line flags win over config files and environment
fn apply_args(config: &mut TriageConfig, args: &Args) -> anyhow::Result<()> {
    if let Some(name) = &args.provider {
        let provider_type: ProviderType = name.parse().map_err(anyhow::Error::msg)?;
        if config.provider.effective_type() != provider_type {
            // Settings of the previous vendor do not carry over
            config.provider = ProviderSettings::new(provider_type);
            config.provider.api_key = provider_type
                .api_key_env()
                .and_then(|var| std::env::var(var).ok());
        }
    }
    if let Some(model) = &args.model {
        config.provider.model = Some(model.clone());
    }
    if let Some(api_key) = &args.api_key {
        config.provider.api_key = Some(api_key.clone());
    }
    if let Some(base_url) = &args.base_url {
        config.provider.base_url = Some(base_url.clone());
    }
    if let Some(mode) = args.mode {
        config.agent.mode = Some(mode);
    }
    if let Some(max) = args.max_iterations {
        config.agent.max_iterations = Some(max);
    }
    for (i, url) in args.mcp_urls.iter().enumerate() {
        config
            .mcp_servers
            .push(triage_foundation::McpServerSettings::new(format!("cli-{}", i + 1), url.clone()));
    }
    Ok(())
}
