//! Vendor tool-call shapes
//!
//! Each vendor returns tool calls in its own JSON shape. Providers decode
//! into the matching [`RawToolCall`] variant and convert once, through the
//! extraction function for that shape, into a neutral [`ToolCall`].
//!
//! | Variant | Wire shape |
//! |---------|------------|
//! | `OpenAi` | `{id, type:"function", function:{name, arguments:"<json string>"}}` |
//! | `Anthropic` | `{type:"tool_use", id, name, input:{...}}` |
//! | `Ollama` | `{function:{name, arguments:{...}}}` (no id) |

use crate::ToolCall;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum RawToolCall {
    OpenAi(OpenAiToolCall),
    Anthropic(AnthropicToolUse),
    Ollama(OllamaToolCall),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: OpenAiFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiFunctionCall {
    pub name: String,
    /// Normally a JSON-encoded string; some compatible servers send an object
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicToolUse {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

fn function_type() -> String {
    "function".to_string()
}

impl RawToolCall {
    pub fn into_tool_call(self) -> ToolCall {
        match self {
            RawToolCall::OpenAi(call) => from_openai(call),
            RawToolCall::Anthropic(call) => from_anthropic(call),
            RawToolCall::Ollama(call) => from_ollama(call),
        }
    }
}

/// Convert a batch, preserving order
pub fn extract_all(raw: Vec<RawToolCall>) -> Vec<ToolCall> {
    raw.into_iter().map(RawToolCall::into_tool_call).collect()
}

fn from_openai(call: OpenAiToolCall) -> ToolCall {
    let arguments = normalize_arguments(call.function.arguments);
    ToolCall::new(call.id, call.function.name, arguments)
}

fn from_anthropic(call: AnthropicToolUse) -> ToolCall {
    ToolCall::new(call.id, call.name, normalize_arguments(call.input))
}

/// Ollama never assigns ids; the caller's uniqueness pass fills them in
fn from_ollama(call: OllamaToolCall) -> ToolCall {
    ToolCall::new(
        String::new(),
        call.function.name,
        normalize_arguments(call.function.arguments),
    )
}

/// Arguments always end up as a JSON object.
///
/// - object: unchanged
/// - string holding JSON: decoded (and re-normalized)
/// - empty string / null: `{}`
/// - anything else: `{"input": <value>}`
pub fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::Object(_) => arguments,
        Value::Null => Value::Object(Map::new()),
        Value::String(s) if s.trim().is_empty() => Value::Object(Map::new()),
        Value::String(s) => match serde_json::from_str::<Value>(&s) {
            Ok(Value::Object(map)) => Value::Object(map),
            Ok(Value::String(inner)) => normalize_arguments(Value::String(inner)),
            _ => wrap_input(Value::String(s)),
        },
        other => wrap_input(other),
    }
}

fn wrap_input(value: Value) -> Value {
    let mut map = Map::new();
    map.insert("input".to_string(), value);
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_openai_string_arguments() {
        let raw: OpenAiToolCall = serde_json::from_value(json!({
            "id": "call_1",
            "type": "function",
            "function": { "name": "get_runbook", "arguments": "{\"service\":\"apache\"}" }
        }))
        .unwrap();

        let call = RawToolCall::OpenAi(raw).into_tool_call();
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, "get_runbook");
        assert_eq!(call.arguments, json!({ "service": "apache" }));
    }

    #[test]
    fn test_openai_object_arguments() {
        let raw: OpenAiToolCall = serde_json::from_value(json!({
            "id": "call_2",
            "function": { "name": "query_metrics", "arguments": { "query": "up" } }
        }))
        .unwrap();
        assert_eq!(raw.call_type, "function");
        let call = RawToolCall::OpenAi(raw).into_tool_call();
        assert_eq!(call.arguments, json!({ "query": "up" }));
    }

    #[test]
    fn test_anthropic_tool_use() {
        let raw: AnthropicToolUse = serde_json::from_value(json!({
            "id": "toolu_01",
            "name": "suggest_command",
            "input": { "server": "web-1", "command": "systemctl restart apache2" }
        }))
        .unwrap();
        let call = RawToolCall::Anthropic(raw).into_tool_call();
        assert_eq!(call.id, "toolu_01");
        assert_eq!(call.arguments["server"], "web-1");
    }

    #[test]
    fn test_ollama_has_no_id() {
        let raw: OllamaToolCall = serde_json::from_value(json!({
            "function": { "name": "list_alerts", "arguments": {} }
        }))
        .unwrap();
        let call = RawToolCall::Ollama(raw).into_tool_call();
        assert!(call.id.is_empty());
        assert_eq!(call.name, "list_alerts");
    }

    #[test]
    fn test_normalize_arguments() {
        assert_eq!(normalize_arguments(Value::Null), json!({}));
        assert_eq!(normalize_arguments(json!("")), json!({}));
        assert_eq!(normalize_arguments(json!("not json")), json!({ "input": "not json" }));
        assert_eq!(normalize_arguments(json!([1, 2])), json!({ "input": [1, 2] }));
        assert_eq!(
            normalize_arguments(json!("\"{\\\"a\\\":1}\"")),
            json!({ "a": 1 })
        );
    }

    #[test]
    fn test_extract_all_preserves_order() {
        let calls = extract_all(vec![
            RawToolCall::Anthropic(AnthropicToolUse {
                id: "a".into(),
                name: "first".into(),
                input: json!({}),
            }),
            RawToolCall::Ollama(OllamaToolCall {
                function: OllamaFunctionCall {
                    name: "second".into(),
                    arguments: json!({}),
                },
            }),
        ]);
        let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
    }
}
