//! Ollama provider (native `/api/chat`)
//!
//! Local models are driven through text-parsed ReAct prompting, so requests
//! normally carry no tool schemas. Tool calls are still decoded when a model
//! returns them.

use crate::{
    error::ProviderError,
    r#trait::{FinishReason, Provider, ProviderResponse, TokenUsage},
    tool_call::{extract_all, OllamaFunctionCall, OllamaToolCall, RawToolCall},
    Message, MessageRole, ToolDef,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use triage_foundation::ProviderType;

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(ProviderType::Ollama.default_timeout()))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDef],
        system_prompt: Option<&str>,
    ) -> OllamaRequest {
        let mut api_messages: Vec<OllamaMessage> = vec![];

        if let Some(system) = system_prompt {
            api_messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
                tool_calls: None,
            });
        }

        api_messages.extend(
            messages
                .iter()
                .filter(|m| m.role != MessageRole::System)
                .map(OllamaMessage::from),
        );

        OllamaRequest {
            model: self.model.clone(),
            messages: api_messages,
            tools: if tools.is_empty() {
                None
            } else {
                Some(tools.iter().map(ToolDef::function_schema).collect())
            },
            stream: false,
        }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Ollama
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

        let response = self
            .client
            .post(self.chat_url())
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 => ProviderError::ModelNotAvailable(format!(
                    "Model '{}' not found. Run 'ollama pull {}' first.",
                    self.model, self.model
                )),
                code => ProviderError::from_http_status(code, &body),
            });
        }

        let api_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(parse_response(api_response, &self.model))
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn parse_response(api_response: OllamaResponse, model: &str) -> ProviderResponse {
    let raw_calls: Vec<RawToolCall> = api_response
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(RawToolCall::Ollama)
        .collect();

    let finish_reason = match (api_response.done, raw_calls.is_empty()) {
        (true, false) => FinishReason::ToolUse,
        (true, true) => FinishReason::Stop,
        _ => FinishReason::Other,
    };

    ProviderResponse {
        content: api_response.message.content,
        tool_calls: extract_all(raw_calls),
        usage: TokenUsage {
            input_tokens: api_response.prompt_eval_count.unwrap_or(0),
            output_tokens: api_response.eval_count.unwrap_or(0),
        },
        finish_reason,
        model: model.to_string(),
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    done: bool,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        if let Some(ref tool_result) = msg.tool_result {
            return OllamaMessage {
                role: "tool".to_string(),
                content: tool_result.content.clone(),
                tool_calls: None,
            };
        }

        let tool_calls = msg.tool_calls.as_ref().filter(|c| !c.is_empty()).map(|calls| {
            calls
                .iter()
                .map(|tc| OllamaToolCall {
                    function: OllamaFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    },
                })
                .collect()
        });

        OllamaMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
            tool_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chat_url() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3").unwrap();
        assert_eq!(provider.chat_url(), "http://localhost:11434/api/chat");
        assert!(!provider.supports_function_calling());
    }

    #[test]
    fn test_request_without_tools() {
        let provider = OllamaProvider::new("http://localhost:11434", "llama3").unwrap();
        let request = provider.build_request(&[Message::user("hello")], &[], Some("system"));
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hello");
    }

    #[test]
    fn test_parse_native_tool_calls() {
        let api_response: OllamaResponse = serde_json::from_value(json!({
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [ { "function": { "name": "list_alerts", "arguments": { "state": "firing" } } } ]
            },
            "done": true,
            "eval_count": 4
        }))
        .unwrap();

        let response = parse_response(api_response, "llama3");
        assert_eq!(response.finish_reason, FinishReason::ToolUse);
        assert_eq!(response.tool_calls[0].arguments, json!({ "state": "firing" }));
        assert!(response.tool_calls[0].id.is_empty());
        assert_eq!(response.usage.output_tokens, 4);
    }
}
