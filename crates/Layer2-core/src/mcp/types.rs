//! MCP Types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection lifecycle of one MCP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpClientState {
    Disconnected,
    /// Event stream GET issued, read task running
    Connecting,
    /// Waiting for the `endpoint` event
    AwaitingEndpoint,
    /// POST endpoint known
    Connected,
    /// `initialize` handshake in flight
    Initializing,
    Ready,
    Error,
}

impl std::fmt::Display for McpClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingEndpoint => "awaiting-endpoint",
            Self::Connected => "connected",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

/// Tool advertised by an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// `tools/call` result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpToolResult {
    #[serde(default)]
    pub content: Vec<McpContent>,

    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpContent {
    Text {
        text: String,
    },

    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },

    Resource {
        resource: McpResource,
    },

    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResource {
    pub uri: String,

    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl McpToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![McpContent::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Render every block as text, one block per line
    pub fn flatten_text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                McpContent::Text { text } => Some(text.clone()),
                McpContent::Image { mime_type, data } => {
                    Some(format!("[image {} ({} bytes base64)]", mime_type, data.len()))
                }
                McpContent::Resource { resource } => Some(match &resource.text {
                    Some(text) => format!("[resource {}]\n{}", resource.uri, text),
                    None => format!("[resource {}]", resource.uri),
                }),
                McpContent::Unknown => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_blocks() {
        let result: McpToolResult = serde_json::from_str(
            r#"{
                "content": [
                    {"type": "text", "text": "cpu at 97%"},
                    {"type": "image", "data": "aGVsbG8=", "mimeType": "image/png"},
                    {"type": "resource", "resource": {"uri": "file:///var/log/app.log", "text": "boom"}},
                    {"type": "audio", "data": "xx"}
                ],
                "isError": false
            }"#,
        )
        .unwrap();

        assert_eq!(result.content.len(), 4);
        assert_eq!(result.content[3], McpContent::Unknown);
        assert_eq!(
            result.flatten_text(),
            "cpu at 97%\n[image image/png (8 bytes base64)]\n[resource file:///var/log/app.log]\nboom"
        );
    }

    #[test]
    fn test_tool_defaults() {
        let tool: McpTool = serde_json::from_str(r#"{"name": "ping"}"#).unwrap();
        assert!(tool.description.is_none());
        assert!(tool.input_schema.is_null());

        let result = McpToolResult::error("denied");
        assert!(result.is_error);
        assert_eq!(result.flatten_text(), "denied");
    }
}
