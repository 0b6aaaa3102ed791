//! Native agent loop against a scripted provider

mod common;

use common::*;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use triage_agent::{Agent, AgentContext, NativeAgent};
use triage_foundation::ProviderType;
use triage_provider::{MessageRole, ProviderError, ProviderResponse, ToolCall};

fn agent(provider: &Arc<ScriptedProvider>, max_iterations: usize) -> NativeAgent {
    NativeAgent::new(AgentContext::new(
        provider.clone(),
        registry(),
        &settings(max_iterations),
    ))
}

#[tokio::test]
async fn test_restart_request_ends_at_suggested_command() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Openai,
        vec![
            tool_reply(vec![call("get_runbook", json!({"service": "apache"}))]),
            tool_reply(vec![call("query_metrics", metrics_args())]),
            ProviderResponse::with_tool_calls(
                "The runbook says to restart and web-1 reports down.",
                vec![call(
                    "suggest_command",
                    json!({"server": "web-1", "command": "systemctl restart apache2"}),
                )],
            ),
        ],
    ));
    let mut agent = agent(&provider, 10);

    let result = agent.run("restart apache on web-1").await;

    assert!(result.finished, "{:?}", result);
    assert!(result.error.is_none());
    assert_eq!(
        result.tool_calls_made,
        vec!["get_runbook", "query_metrics", "suggest_command"]
    );
    assert_eq!(result.iterations, 3);
    // No model call after the suggestion
    assert_eq!(provider.call_count(), 3);

    assert!(result.content.contains("Suggested command for web-1"));
    assert!(result.content.contains("systemctl restart apache2"));
    assert!(result.content.contains("https://wiki.example.com/runbooks/apache"));

    let last = agent.history().last().unwrap();
    assert_eq!(last.role, MessageRole::Tool);
    assert_eq!(last.tool_result.as_ref().unwrap().tool_name, "suggest_command");
}

#[tokio::test]
async fn test_early_answers_are_rejected_until_two_tools_ran() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Anthropic,
        vec![
            ProviderResponse::text("Apache is probably fine."),
            tool_reply(vec![call("get_runbook", json!({"service": "apache"}))]),
            ProviderResponse::text("Restart apache."),
            tool_reply(vec![call("query_metrics", metrics_args())]),
            ProviderResponse::text("web-1 reports up=0 and the runbook recommends a restart."),
        ],
    ));
    let mut agent = agent(&provider, 10);

    let result = agent.run("why is apache down on web-1?").await;

    assert!(result.finished);
    assert_eq!(result.tool_calls_made, vec!["get_runbook", "query_metrics"]);
    assert_eq!(result.iterations, 5);
    assert_eq!(provider.call_count(), 5);
    assert!(result.content.starts_with("web-1 reports up=0"));

    // The second model call saw the injected instruction
    let second = &provider.calls()[1];
    let last = second.messages.last().unwrap();
    assert_eq!(last.role, MessageRole::User);
    assert!(last.content.contains("0 of the required 2"));
    assert_eq!(second.tool_count, 6);
    assert!(second.system_prompt.as_deref().unwrap().contains("suggest_command"));
}

#[tokio::test]
async fn test_greeting_finishes_without_tools() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Openai,
        vec![ProviderResponse::text("Hi! I can look at runbooks, metrics, logs and alerts.")],
    ));
    let mut agent = agent(&provider, 10);

    let result = agent.run("hello").await;

    assert!(result.finished);
    assert!(result.tool_calls_made.is_empty());
    assert_eq!(result.iterations, 1);
}

#[tokio::test]
async fn test_budget_exhaustion_is_reported() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderType::Openai, vec![])
            .with_fallback(ProviderResponse::text("Everything looks fine.")),
    );
    let mut agent = agent(&provider, 3);

    let result = agent.run("disk usage alarm on db-2").await;

    assert!(!result.finished);
    assert_eq!(result.iterations, 3);
    assert_eq!(provider.call_count(), 3);
    assert!(result.error.as_deref().unwrap().contains("3 iterations"));
    assert_eq!(result.content, "Everything looks fine.");
}

#[tokio::test]
async fn test_provider_error_becomes_result() {
    let provider = Arc::new(ScriptedProvider::new(ProviderType::Openai, vec![]));
    provider.push_error(ProviderError::Authentication("invalid x-api-key".into()));
    let mut agent = agent(&provider, 5);

    let result = agent.run("why is checkout slow?").await;

    assert!(!result.finished);
    assert_eq!(result.iterations, 1);
    assert!(result.error.as_deref().unwrap().contains("invalid x-api-key"));
    assert!(result.content.contains("could not be completed"));
}

#[tokio::test]
async fn test_tool_failures_are_fed_back_not_raised() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Openai,
        vec![
            tool_reply(vec![call("delete_everything", json!({}))]),
            tool_reply(vec![call(
                "suggest_command",
                json!({"server": "web-1", "command": "rm -rf /"}),
            )]),
            tool_reply(vec![call("get_runbook", json!({"service": "apache"}))]),
            ProviderResponse::text("Do not wipe the disk; restart apache instead."),
        ],
    ));
    let mut agent = agent(&provider, 10);

    let result = agent.run("web-1 is out of disk, clean it up").await;

    assert!(result.finished);
    assert_eq!(
        result.tool_calls_made,
        vec!["delete_everything", "suggest_command", "get_runbook"]
    );

    let tool_turns: Vec<_> = agent
        .history()
        .messages()
        .iter()
        .filter_map(|m| m.tool_result.as_ref())
        .collect();
    assert_eq!(tool_turns.len(), 3);

    assert!(tool_turns[0].is_error);
    assert!(tool_turns[0].content.contains("unknown tool"));

    assert!(tool_turns[1].is_error);
    assert!(tool_turns[1].content.contains("critical"));
    assert!(tool_turns[1].content.contains("safer alternative"));

    assert!(!tool_turns[2].is_error);
}

#[tokio::test]
async fn test_duplicate_call_ids_are_replaced() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Openai,
        vec![
            tool_reply(vec![
                ToolCall::new("dup", "get_runbook", json!({"service": "apache"})),
                ToolCall::new("dup", "query_metrics", metrics_args()),
            ]),
            ProviderResponse::text("Apache is down on web-1."),
        ],
    ));
    let mut agent = agent(&provider, 5);

    let result = agent.run("check apache on web-1").await;
    assert!(result.finished);

    let messages = agent.history().messages();
    let assistant = messages
        .iter()
        .find(|m| m.has_tool_calls())
        .unwrap();
    let ids: HashSet<_> = assistant
        .tool_calls
        .as_ref()
        .unwrap()
        .iter()
        .map(|c| c.id.clone())
        .collect();
    assert_eq!(ids.len(), 2);

    for result in messages.iter().filter_map(|m| m.tool_result.as_ref()) {
        assert!(ids.contains(&result.tool_call_id));
    }
}

#[tokio::test]
async fn test_repeated_calls_trigger_change_of_approach() {
    let provider = Arc::new(
        ScriptedProvider::new(ProviderType::Openai, vec![])
            .with_fallback(tool_reply(vec![call("get_runbook", json!({"service": "apache"}))])),
    );
    let mut agent = agent(&provider, 4);

    let result = agent.run("apache keeps crashing on web-1").await;

    assert!(!result.finished);
    assert_eq!(result.tool_calls_made.len(), 4);

    let fourth = &provider.calls()[3];
    let last = fourth.messages.last().unwrap();
    assert_eq!(last.role, MessageRole::User);
    assert!(last.content.contains("Change approach"));
}

#[tokio::test]
async fn test_suggestion_before_enough_evidence_keeps_going() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Openai,
        vec![
            tool_reply(vec![call(
                "suggest_command",
                json!({"server": "web-1", "command": "systemctl restart apache2"}),
            )]),
            tool_reply(vec![call("query_logs", json!({"query": "{job=\"apache\"}"}))]),
            ProviderResponse::text("Logs show a segfault; the restart above is the fix."),
        ],
    ));
    let mut agent = agent(&provider, 10);

    let result = agent.run("restart apache on web-1").await;

    assert!(result.finished);
    assert_eq!(result.tool_calls_made, vec!["suggest_command", "query_logs"]);
    assert_eq!(provider.call_count(), 3);
}

#[tokio::test]
async fn test_history_carries_into_the_next_run() {
    let provider = Arc::new(ScriptedProvider::new(
        ProviderType::Openai,
        vec![
            ProviderResponse::text("Hello, how can I help?"),
            ProviderResponse::text("You're welcome."),
        ],
    ));
    let mut agent = agent(&provider, 5);

    agent.run("hi").await;
    let result = agent.run("thanks").await;

    assert!(result.finished);
    let second = &provider.calls()[1];
    let contents: Vec<_> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hi", "Hello, how can I help?", "thanks"]);
}
