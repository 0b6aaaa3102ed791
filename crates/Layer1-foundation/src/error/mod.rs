//! Error types for Triage
//!
//! Every crate in the workspace funnels its failures into [`Error`].

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Triage error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Provider
    // ========================================================================
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("API error: {provider} - {message}")]
    Api { provider: String, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // ========================================================================
    // MCP transport
    // ========================================================================
    /// Endpoint discovery, stream setup or a closed stream
    #[error("MCP connection error: {0}")]
    McpConnection(String),

    /// The envelope could not be delivered to the server
    #[error("MCP request error: {0}")]
    Request(String),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    // ========================================================================
    // Tool
    // ========================================================================
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool execution failed: {tool} - {message}")]
    ToolExecution { tool: String, message: String },

    #[error("Command blocked ({risk}): matched pattern '{pattern}'")]
    ValidationBlocked { pattern: String, risk: String },

    // ========================================================================
    // Agent
    // ========================================================================
    #[error("Iteration budget exhausted after {0} iterations without a final answer")]
    IterationBudgetExhausted(usize),

    #[error("Agent error: {0}")]
    Agent(String),

    // ========================================================================
    // Execution
    // ========================================================================
    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // General
    // ========================================================================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // External conversions
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::RateLimited(_) | Error::McpConnection(_) | Error::Http(_)
        )
    }

    /// Tool-level failures are fed back to the model instead of aborting a run
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            Error::ToolNotFound(_)
                | Error::ToolExecution { .. }
                | Error::ValidationBlocked { .. }
                | Error::InvalidInput(_)
        )
    }

    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn tool_execution(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn mcp_connection(message: impl Into<String>) -> Self {
        Error::McpConnection(message.into())
    }

    pub fn validation_blocked(pattern: impl Into<String>, risk: impl Into<String>) -> Self {
        Error::ValidationBlocked {
            pattern: pattern.into(),
            risk: risk.into(),
        }
    }
}

// ============================================================================
// From conversions
// ============================================================================

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(Error::mcp_connection("stream closed").is_retryable());
        assert!(Error::Timeout("60s".into()).is_retryable());
        assert!(!Error::tool_execution("query_metrics", "bad query").is_retryable());
        assert!(!Error::IterationBudgetExhausted(10).is_retryable());
    }

    #[test]
    fn test_tool_level_classification() {
        assert!(Error::tool_execution("x", "y").is_tool_level());
        assert!(Error::validation_blocked("rm -rf /", "critical").is_tool_level());
        assert!(!Error::mcp_connection("down").is_tool_level());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::validation_blocked(r"rm\s+-rf\s+/", "critical");
        assert_eq!(
            err.to_string(),
            r"Command blocked (critical): matched pattern 'rm\s+-rf\s+/'"
        );
        assert!(Error::IterationBudgetExhausted(3).to_string().contains("3 iterations"));
    }
}
