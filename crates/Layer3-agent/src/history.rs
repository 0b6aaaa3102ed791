//! Conversation history owned by one agent

use triage_provider::{Message, MessageRole, ToolCall};

/// Ordered, append-only turns of one conversation.
///
/// An agent owns exactly one history and mutates it only from `run(&mut self)`,
/// so a conversation never has two writers.
#[derive(Debug, Clone, Default)]
pub struct MessageHistory {
    messages: Vec<Message>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    pub fn add_assistant_with_tools(&mut self, content: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.messages
            .push(Message::assistant_with_tools(content, tool_calls));
    }

    /// Tool-role turn answering `tool_call_id`
    pub fn add_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) {
        self.messages.push(Message::tool_result(
            tool_call_id,
            tool_name,
            content,
            is_error,
        ));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_user(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
    }

    /// Last assistant turn that carried text
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.trim())
            .find(|c| !c.is_empty())
    }

    /// Rough token estimate (4 bytes per token)
    pub fn estimate_tokens(&self) -> usize {
        self.messages
            .iter()
            .map(|m| {
                let calls: usize = m
                    .tool_calls
                    .iter()
                    .flatten()
                    .map(|tc| tc.name.len() + tc.arguments.to_string().len())
                    .sum();
                (m.content.len() + calls) / 4
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_order_is_preserved() {
        let mut history = MessageHistory::new();
        history.add_user("why is web-1 slow?");
        history.add_assistant_with_tools(
            "",
            vec![ToolCall::new("call_1", "query_metrics", json!({"query": "up"}))],
        );
        history.add_tool_result("call_1", "query_metrics", "up: latest=1", false);
        history.add_assistant("CPU is saturated.");

        let roles: Vec<_> = history.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::Tool,
                MessageRole::Assistant
            ]
        );
        let tool_turn = &history.messages()[2];
        let result = tool_turn.tool_result.as_ref().unwrap();
        assert_eq!(result.tool_call_id, "call_1");
        assert_eq!(result.tool_name, "query_metrics");
    }

    #[test]
    fn test_last_assistant_text_skips_tool_only_turns() {
        let mut history = MessageHistory::new();
        history.add_assistant("checking the runbook");
        history.add_assistant_with_tools("", vec![ToolCall::new("c", "get_runbook", json!({}))]);
        assert_eq!(history.last_assistant_text(), Some("checking the runbook"));
        assert_eq!(history.last_user().map(|m| m.content.as_str()), None);
    }

    #[test]
    fn test_estimate_tokens_counts_tool_calls() {
        let mut history = MessageHistory::new();
        history.add_user("abcdabcd");
        let plain = history.estimate_tokens();
        history.add_assistant_with_tools("", vec![ToolCall::new("c", "get_runbook", json!({"service": "apache"}))]);
        assert!(history.estimate_tokens() > plain);
    }
}
