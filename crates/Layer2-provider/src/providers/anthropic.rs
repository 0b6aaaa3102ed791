//! Anthropic (Claude) provider
//!
//! Claude's Messages API uses content blocks and strictly alternating
//! user/assistant roles, which the OpenAI-style translation cannot express.
//! Turns are therefore re-encoded directly into the native shape:
//!
//! - tool-role turns become `tool_result` blocks inside a user turn
//! - consecutive turns with the same role are merged into one turn
//! - system turns are lifted into the top-level `system` field

use crate::{
    error::ProviderError,
    r#trait::{FinishReason, Provider, ProviderResponse, TokenUsage},
    retry::{with_retry, RetryConfig},
    tool_call::{extract_all, AnthropicToolUse, RawToolCall},
    Message, MessageRole, ToolDef,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use triage_foundation::ProviderType;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    retry_config: RetryConfig,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ProviderType::Anthropic.default_timeout()))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            base_url: ProviderType::Anthropic.default_base_url().to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.base_url.trim_end_matches('/'))
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        system_prompt: Option<&str>,
    ) -> AnthropicRequest {
        // System turns inside the history join the system prompt
        let mut system_parts: Vec<&str> = system_prompt.into_iter().collect();
        system_parts.extend(
            messages
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.content.as_str()),
        );

        AnthropicRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: if system_parts.is_empty() {
                None
            } else {
                Some(system_parts.join("\n\n"))
            },
            messages: encode_messages(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(ToolDef::input_schema_tool).collect())
            },
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        system_prompt: Option<&str>,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = self.build_request(messages, tools, system_prompt);
        debug!(
            "anthropic request: {} native turns (from {}), {} tools",
            request.messages.len(),
            messages.len(),
            tools.len()
        );

        let api_response = with_retry(&self.retry_config, "anthropic_complete", || {
            self.send(&request)
        })
        .await?;

        Ok(parse_response(api_response))
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ============================================================================
// Native encoding
// ============================================================================

/// Re-encode neutral turns into Anthropic's alternating content-block form
pub(crate) fn encode_messages(messages: &[Message]) -> Vec<AnthropicMessage> {
    let mut encoded: Vec<AnthropicMessage> = Vec::new();

    for msg in messages {
        let (role, blocks) = match msg.role {
            MessageRole::System => continue,
            MessageRole::Tool => {
                let Some(result) = msg.tool_result.as_ref() else {
                    continue;
                };
                (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: result.tool_call_id.clone(),
                        content: result.content.clone(),
                        is_error: result.is_error.then_some(true),
                    }],
                )
            }
            MessageRole::User => ("user", text_block(&msg.content).into_iter().collect()),
            MessageRole::Assistant => {
                let mut blocks: Vec<ContentBlock> = text_block(&msg.content).into_iter().collect();
                for tc in msg.tool_calls.iter().flatten() {
                    blocks.push(ContentBlock::ToolUse {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        input: tc.arguments.clone(),
                    });
                }
                ("assistant", blocks)
            }
        };

        if blocks.is_empty() {
            continue;
        }

        match encoded.last_mut() {
            Some(last) if last.role == role => last.content.extend(blocks),
            _ => encoded.push(AnthropicMessage {
                role: role.to_string(),
                content: blocks,
            }),
        }
    }

    encoded
}

fn text_block(text: &str) -> Option<ContentBlock> {
    if text.trim().is_empty() {
        None
    } else {
        Some(ContentBlock::Text {
            text: text.to_string(),
        })
    }
}

fn parse_response(api_response: AnthropicResponse) -> ProviderResponse {
    let mut content = String::new();
    let mut raw_calls = Vec::new();

    for block in api_response.content {
        match block {
            ContentBlock::Text { text } => content.push_str(&text),
            ContentBlock::ToolUse { id, name, input } => {
                raw_calls.push(RawToolCall::Anthropic(AnthropicToolUse { id, name, input }))
            }
            _ => {}
        }
    }

    let finish_reason = match api_response.stop_reason.as_deref() {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::MaxTokens,
        Some("tool_use") => FinishReason::ToolUse,
        _ => FinishReason::Other,
    };

    ProviderResponse {
        content,
        tool_calls: extract_all(raw_calls),
        usage: TokenUsage {
            input_tokens: api_response.usage.input_tokens,
            output_tokens: api_response.usage.output_tokens,
        },
        finish_reason,
        model: api_response.model,
    }
}

// ============================================================================
// Anthropic API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
