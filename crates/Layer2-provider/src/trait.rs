//! Provider trait and common types

use crate::error::ProviderError;
use crate::{Message, ToolCall, ToolDef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use triage_foundation::ProviderType;

/// Token usage reported by the vendor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// LLM Provider trait
///
/// The completion call is treated as an opaque request/response exchange.
/// Implementations translate the neutral [`Message`] / [`ToolDef`] types into
/// their vendor wire format.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Vendor this provider talks to
    fn provider_type(&self) -> ProviderType;

    /// Current model id
    fn model(&self) -> &str;

    /// Whether tool schemas may be passed and structured tool calls returned
    fn supports_function_calling(&self) -> bool {
        self.provider_type().supports_function_calling()
    }

    /// Send the conversation and wait for the complete reply
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Credentials present (local vendors are always available)
    fn is_available(&self) -> bool;
}

/// Complete response from a provider
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    /// Text content
    pub content: String,

    /// Tool calls, in the order the model emitted them
    pub tool_calls: Vec<ToolCall>,

    pub usage: TokenUsage,

    pub finish_reason: FinishReason,

    /// Model that actually answered
    pub model: String,
}

impl ProviderResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            finish_reason: FinishReason::Stop,
            ..Default::default()
        }
    }

    pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            finish_reason: FinishReason::ToolUse,
            ..Default::default()
        }
    }
}

/// Reason for completion finishing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FinishReason {
    Stop,
    MaxTokens,
    ToolUse,
    ContentFilter,
    #[default]
    Other,
}
