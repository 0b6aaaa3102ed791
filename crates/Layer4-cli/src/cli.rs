//! Terminal front end - one-shot and interactive modes

use futures::StreamExt;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use triage_agent::{AgentEvent, EventSink, Orchestrator};
use triage_core::{CommandValidation, ValidationResult};
use triage_foundation::OsType;

const PREVIEW_CHARS: usize = 100;

/// Run a single request; fails when the agent did not finish
pub async fn run_once(orchestrator: &mut Orchestrator, prompt: &str, quiet: bool) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::channel(100);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            match event {
                AgentEvent::ToolStart { tool_name, .. } => {
                    eprintln!("[{}] running...", tool_name);
                }
                AgentEvent::ToolComplete {
                    tool_name,
                    success,
                    result,
                    ..
                } => {
                    let status = if success { "ok" } else { "failed" };
                    eprintln!("[{}] {} {}", tool_name, status, preview(&result));
                }
                AgentEvent::Intervention(_) => eprintln!("[agent] gathering more evidence"),
                _ => {}
            }
        }
    });

    let result = orchestrator
        .run_with_events(prompt, EventSink::new(tx))
        .await;
    let _ = printer.await;

    println!("{}", result.content);
    if !quiet && !result.tool_calls_made.is_empty() {
        eprintln!(
            "\n({} iterations, tools: {})",
            result.iterations,
            result.tool_calls_made.join(", ")
        );
    }

    match result.error {
        Some(error) => anyhow::bail!(error),
        None => Ok(()),
    }
}

/// Read requests from stdin until EOF or `exit`.
///
/// The operator pastes the output of a suggested command as the next request.
pub async fn run_interactive(orchestrator: &mut Orchestrator, quiet: bool) -> anyhow::Result<()> {
    println!(
        "Triage ({} agent). Describe the problem; type 'exit' to quit.\n",
        orchestrator.mode()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("triage> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if matches!(request, "exit" | "quit") {
            break;
        }

        let mut chunks = Box::pin(orchestrator.stream(request));
        while let Some(chunk) = chunks.next().await {
            if quiet && chunk.starts_with('[') {
                continue;
            }
            print!("{}", chunk);
            std::io::stdout().flush()?;
        }
        println!("\n");
    }

    Ok(())
}

pub fn print_validation(validation: &CommandValidation, os: OsType) {
    println!("{} ({}, risk {})", validation.result, os, validation.risk_level);
    println!("  command: {}", validation.command);
    println!("  reason:  {}", validation.reason);
    if let Some(pattern) = &validation.matched_pattern {
        println!("  pattern: {}", pattern);
    }
    if validation.result == ValidationResult::Blocked {
        println!("\nThis command must not be suggested.");
    }
}

fn preview(text: &str) -> String {
    let first = text.lines().next().unwrap_or("");
    if first.chars().count() > PREVIEW_CHARS {
        format!("{}...", first.chars().take(PREVIEW_CHARS).collect::<String>())
    } else {
        first.to_string()
    }
}
