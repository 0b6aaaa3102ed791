//! OpenAI-compatible chat completions provider
//!
//! Serves every vendor exposing `/chat/completions` in the OpenAI dialect:
//! OpenAI itself, Groq, and Gemini's compatibility endpoint.

use crate::{
    error::ProviderError,
    r#trait::{FinishReason, Provider, ProviderResponse, TokenUsage},
    retry::{with_retry, RetryConfig},
    tool_call::{extract_all, OpenAiFunctionCall, OpenAiToolCall, RawToolCall},
    Message, MessageRole, ToolDef,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use triage_foundation::ProviderType;

/// OpenAI-compatible provider
pub struct OpenAiProvider {
    client: Client,
    provider_type: ProviderType,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    base_url: String,
    retry_config: RetryConfig,
}

impl OpenAiProvider {
    pub fn new(
        provider_type: ProviderType,
        api_key: Option<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(provider_type.default_timeout()))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            provider_type,
            api_key,
            model: model.into(),
            max_tokens,
            base_url: provider_type.default_base_url().to_string(),
            retry_config: RetryConfig::default(),
        })
    }

    /// Override the URL prefix (proxies, self-hosted gateways)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ProviderError> {
        self.client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;
        Ok(self)
    }

    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        system_prompt: Option<&str>,
    ) -> OpenAiRequest {
        let mut api_messages: Vec<OpenAiMessage> = vec![];

        if let Some(system) = system_prompt {
            api_messages.push(OpenAiMessage::text("system", system));
        }

        api_messages.extend(
            messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(OpenAiMessage::from),
        );

        OpenAiRequest {
            model: self.model.clone(),
            messages: api_messages,
            max_tokens: Some(self.max_tokens),
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(ToolDef::function_schema).collect())
            },
        }
    }

    async fn send(&self, request: &OpenAiRequest) -> Result<OpenAiResponse, ProviderError> {
        let mut builder = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(ProviderError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    fn parse_error_response(status: reqwest::StatusCode, body: &str) -> ProviderError {
        if let Ok(error_response) = serde_json::from_str::<OpenAiErrorResponse>(body) {
            let error = error_response.error;
            return match error.code.as_deref() {
                Some("rate_limit_exceeded") => ProviderError::RateLimited {
                    retry_after_ms: None,
                },
                Some("context_length_exceeded") => {
                    ProviderError::ContextLengthExceeded(error.message)
                }
                Some("invalid_api_key") => ProviderError::Authentication(error.message),
                Some("model_not_found") => ProviderError::ModelNotAvailable(error.message),
                _ => ProviderError::from_http_status(status.as_u16(), &error.message),
            };
        }

        ProviderError::from_http_status(status.as_u16(), body)
    }

    fn parse_response(
        &self,
        api_response: OpenAiResponse,
    ) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response.choices.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("No choices in response".to_string())
        })?;

        let raw_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(RawToolCall::OpenAi)
            .collect();

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::MaxTokens,
            Some("tool_calls") => FinishReason::ToolUse,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        };

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ProviderResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls: extract_all(raw_calls),
            usage,
            finish_reason,
            model: api_response.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn provider_type(&self) -> ProviderType {
        self.provider_type
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
            "{} request: {} messages, {} tools",
            self.provider_type,
            request.messages.len(),
            tools.len()
        );

        let api_response = with_retry(&self.retry_config, "openai_complete", || {
            self.send(&request)
        })
        .await?;

        self.parse_response(api_response)
    }

    fn is_available(&self) -> bool {
        !self.provider_type.requires_api_key()
            || self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl OpenAiMessage {
    fn text(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
    code: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        if let Some(ref tool_result) = msg.tool_result {
            return OpenAiMessage {
                role: "tool".to_string(),
                content: Some(tool_result.content.clone()),
                tool_calls: None,
                tool_call_id: Some(tool_result.tool_call_id.clone()),
                name: Some(tool_result.tool_name.clone()),
            };
        }

        let tool_calls = msg.tool_calls.as_ref().filter(|c| !c.is_empty()).map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    call_type: "function".to_string(),
                    function: OpenAiFunctionCall {
                        name: tc.name.clone(),
                        arguments: serde_json::Value::String(tc.arguments.to_string()),
                    },
                })
                .collect()
        });

        OpenAiMessage {
            role: msg.role.as_str().to_string(),
            content: if msg.content.is_empty() && tool_calls.is_some() {
                None
            } else {
                Some(msg.content.clone())
            },
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }
}
