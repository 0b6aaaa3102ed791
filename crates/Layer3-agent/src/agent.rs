//! Agent trait shared by the native and ReAct loops

use crate::event::EventSink;
use crate::history::MessageHistory;
use crate::result::AgentResult;
use async_trait::async_trait;
use std::fmt;

/// Which loop drives the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentKind {
    /// Structured function calling
    Native,
    /// Text-parsed Thought / Action / Observation
    React,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Native => "native",
            AgentKind::React => "react",
        }
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One conversation driven to a terminal [`AgentResult`].
///
/// `run` takes `&mut self`: the history has a single writer.
#[async_trait]
pub trait Agent: Send {
    fn kind(&self) -> AgentKind;

    /// Conversation so far (kept across runs so operator follow-ups have context)
    fn history(&self) -> &MessageHistory;

    /// Drive one request to completion, reporting progress on `events`.
    /// Never fails: errors end up in [`AgentResult::error`].
    async fn run_with_events(&mut self, message: &str, events: EventSink) -> AgentResult;

    async fn run(&mut self, message: &str) -> AgentResult {
        self.run_with_events(message, EventSink::none()).await
    }
}
