//! Scripted provider and in-memory backends shared by the agent tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use triage_core::tool::modules::{Alert, LogLine, MetricSeries, Runbook};
use triage_core::{
    CommandModule, CommandValidator, JsonKnowledgeBase, KnowledgeModule, ObservabilityBackend,
    ObservabilityModule, ToolRegistry,
};
use triage_foundation::{AgentMode, AgentSettings, ProviderType, Result};
use triage_provider::{Message, Provider, ProviderError, ProviderResponse, ToolCall, ToolDef};

// ============================================================================
// Provider
// ============================================================================

/// One recorded `complete` call
#[derive(Debug, Clone)]
pub struct SeenCall {
    pub messages: Vec<Message>,
    pub tool_count: usize,
    pub system_prompt: Option<String>,
}

/// Replies in order; once the script is exhausted the fallback (if any) repeats
pub struct ScriptedProvider {
    provider_type: ProviderType,
    replies: Mutex<VecDeque<std::result::Result<ProviderResponse, ProviderError>>>,
    fallback: Option<ProviderResponse>,
    seen: Mutex<Vec<SeenCall>>,
}

impl ScriptedProvider {
    pub fn new(provider_type: ProviderType, replies: Vec<ProviderResponse>) -> Self {
        Self {
            provider_type,
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            fallback: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_fallback(mut self, reply: ProviderResponse) -> Self {
        self.fallback = Some(reply);
        self
    }

    pub fn push_error(&self, error: ProviderError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn call_count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<SeenCall> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        system_prompt: Option<&str>,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        self.seen.lock().unwrap().push(SeenCall {
            messages: messages.to_vec(),
            tool_count: tools.len(),
            system_prompt: system_prompt.map(String::from),
        });

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| ProviderError::Unknown("script exhausted".into())),
        }
    }

    fn is_available(&self) -> bool {
        true
    }
}

pub fn call(name: &str, arguments: Value) -> ToolCall {
    ToolCall::new(ToolCall::generate_id(), name, arguments)
}

pub fn tool_reply(calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse::with_tool_calls("", calls)
}

// ============================================================================
// Backends
// ============================================================================

pub struct FakeObservability;

#[async_trait]
impl ObservabilityBackend for FakeObservability {
    async fn query_metrics(&self, _query: &str, _window: Duration) -> Result<Vec<MetricSeries>> {
        let mut labels = BTreeMap::new();
        labels.insert("instance".to_string(), "web-1".to_string());
        Ok(vec![MetricSeries {
            labels,
            points: vec![(1.0, 0.0), (2.0, 0.0)],
        }])
    }

    async fn query_logs(&self, _query: &str, _limit: usize, _window: Duration) -> Result<Vec<LogLine>> {
        Ok(vec![LogLine {
            timestamp: None,
            labels: BTreeMap::new(),
            line: "AH00060: seg fault or similar nasty error detected in the parent process".into(),
        }])
    }

    async fn list_alerts(&self) -> Result<Vec<Alert>> {
        Ok(vec![])
    }
}

pub fn apache_runbook() -> Runbook {
    Runbook {
        service: "apache".into(),
        title: "Apache HTTP Server".into(),
        tags: vec!["web".into(), "httpd".into()],
        steps: vec![
            "Check `systemctl status apache2`".into(),
            "Restart with `systemctl restart apache2`".into(),
        ],
        content: "Restarting clears hung workers.".into(),
        links: vec!["https://wiki.example.com/runbooks/apache".into()],
    }
}

/// Knowledge, observability and command modules over in-memory backends
pub fn registry() -> Arc<ToolRegistry> {
    Arc::new(
        ToolRegistry::builder()
            .mode(AgentMode::Interactive)
            .module(KnowledgeModule::new(Arc::new(JsonKnowledgeBase::new(vec![
                apache_runbook(),
            ]))))
            .module(ObservabilityModule::new(Arc::new(FakeObservability)))
            .module(CommandModule::new(Arc::new(CommandValidator::new())))
            .build(),
    )
}

pub fn settings(max_iterations: usize) -> AgentSettings {
    AgentSettings {
        max_iterations: Some(max_iterations),
        ..Default::default()
    }
}

pub fn metrics_args() -> Value {
    json!({"query": "up{instance=\"web-1\"}", "minutes": 15})
}
