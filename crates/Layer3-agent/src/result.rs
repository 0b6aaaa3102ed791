//! Terminal value of one agent run

use serde::{Deserialize, Serialize};
use triage_foundation::Error;

/// Outcome of a run. Agents always return one, even when the loop failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Final answer shown to the operator
    pub content: String,

    /// Tool names in invocation order
    pub tool_calls_made: Vec<String>,

    /// Model calls made
    pub iterations: usize,

    /// A qualifying final answer was produced
    pub finished: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResult {
    pub fn finished(content: impl Into<String>, tool_calls_made: Vec<String>, iterations: usize) -> Self {
        Self {
            content: content.into(),
            tool_calls_made,
            iterations,
            finished: true,
            error: None,
        }
    }

    pub fn failed(
        content: impl Into<String>,
        tool_calls_made: Vec<String>,
        iterations: usize,
        error: &Error,
    ) -> Self {
        Self {
            content: content.into(),
            tool_calls_made,
            iterations,
            finished: false,
            error: Some(error.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn used_tool(&self, name: &str) -> bool {
        self.tool_calls_made.iter().any(|t| t == name)
    }
}

/// Per-run bookkeeping shared by both agent loops
#[derive(Debug, Default)]
pub(crate) struct RunLog {
    pub tool_calls_made: Vec<String>,
    /// Successful tool output, scanned for reference links
    pub outputs: Vec<String>,
    pub iterations: usize,
}

impl RunLog {
    pub fn record(&mut self, tool: &str, output: Option<&str>) {
        self.tool_calls_made.push(tool.to_string());
        if let Some(output) = output {
            self.outputs.push(output.to_string());
        }
    }

    pub fn finish(self, content: impl Into<String>) -> AgentResult {
        AgentResult::finished(content, self.tool_calls_made, self.iterations)
    }

    pub fn fail(self, content: impl Into<String>, error: &Error) -> AgentResult {
        AgentResult::failed(content, self.tool_calls_made, self.iterations, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_keeps_progress() {
        let mut log = RunLog::default();
        log.iterations = 10;
        log.record("get_runbook", Some("# Apache"));
        log.record("query_metrics", None);

        let result = log.fail("partial", &Error::IterationBudgetExhausted(10));
        assert!(!result.finished);
        assert!(result.is_error());
        assert_eq!(result.iterations, 10);
        assert_eq!(result.tool_calls_made, vec!["get_runbook", "query_metrics"]);
        assert!(result.used_tool("query_metrics"));
    }

    #[test]
    fn test_serialized_shape() {
        let result = AgentResult::finished("ok", vec!["list_alerts".into()], 2);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["finished"], true);
        assert_eq!(value["tool_calls_made"][0], "list_alerts");
        assert!(value.get("error").is_none());
    }
}
