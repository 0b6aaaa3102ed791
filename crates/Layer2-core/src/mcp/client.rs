//! MCP Client - handshake, discovery, invocation
//!
//! Owns one transport at a time and tracks [`McpClientState`]. Every method
//! takes `&self` so a client can be shared behind `Arc` by the bridge.

use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use triage_foundation::{Error, McpServerSettings, Result};

use super::transport::{McpTransport, SharedState, SseOptions, SseTransport};
use super::types::{McpClientState, McpTool, McpToolResult};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Upper bound on `tools/list` pages
const MAX_TOOL_PAGES: usize = 50;

#[derive(Debug, Clone, Deserialize)]
struct ServerInfo {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeResult {
    #[serde(default)]
    protocol_version: Option<String>,
    #[serde(default)]
    server_info: Option<ServerInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolsPage {
    #[serde(default)]
    tools: Vec<McpTool>,
    #[serde(default)]
    next_cursor: Option<String>,
}

pub struct McpClient {
    name: String,
    url: String,
    options: SseOptions,
    transport: RwLock<Option<Arc<dyn McpTransport>>>,
    state: SharedState,
    tools: RwLock<Vec<McpTool>>,
    server_info: RwLock<Option<ServerInfo>>,
}

impl McpClient {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            options: SseOptions::default(),
            transport: RwLock::new(None),
            state: Arc::new(RwLock::new(McpClientState::Disconnected)),
            tools: RwLock::new(Vec::new()),
            server_info: RwLock::new(None),
        }
    }

    pub fn from_settings(settings: &McpServerSettings) -> Self {
        Self::new(&settings.name, &settings.url).with_options(SseOptions {
            request_timeout: Duration::from_secs(settings.effective_timeout()),
            ..SseOptions::default()
        })
    }

    pub fn with_options(mut self, options: SseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> McpClientState {
        *self.state.read()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == McpClientState::Ready && self.current_transport().is_some()
    }

    /// Server name and version reported by `initialize`
    pub fn server_version(&self) -> Option<String> {
        self.server_info
            .read()
            .as_ref()
            .map(|info| format!("{} {}", info.name, info.version))
    }

    /// Tools from the last `list_tools`
    pub fn tools(&self) -> Vec<McpTool> {
        self.tools.read().clone()
    }

    fn set_state(&self, state: McpClientState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            debug!("MCP '{}' state: {} -> {}", self.name, previous, state);
        }
    }

    fn current_transport(&self) -> Option<Arc<dyn McpTransport>> {
        self.transport
            .read()
            .as_ref()
            .filter(|t| t.is_connected())
            .cloned()
    }

    fn ready_transport(&self) -> Result<Arc<dyn McpTransport>> {
        let state = self.state();
        if state != McpClientState::Ready {
            return Err(Error::mcp_connection(format!(
                "MCP server '{}' is not connected (state: {})",
                self.name, state
            )));
        }
        self.current_transport().ok_or_else(|| {
            Error::mcp_connection(format!("MCP server '{}' connection closed", self.name))
        })
    }

    /// Open the SSE transport and run the handshake
    pub async fn connect(&self) -> Result<()> {
        if self.is_ready() {
            return Ok(());
        }

        self.set_state(McpClientState::Connecting);
        let transport =
            match SseTransport::connect(&self.url, self.options, Arc::clone(&self.state)).await {
                Ok(t) => t,
                Err(e) => {
                    warn!("MCP '{}' connect failed: {}", self.name, e);
                    self.set_state(McpClientState::Error);
                    return Err(e);
                }
            };

        self.attach(Arc::new(transport)).await
    }

    /// Adopt an already-connected transport and run the handshake
    pub async fn attach(&self, transport: Arc<dyn McpTransport>) -> Result<()> {
        let previous = self.transport.write().replace(Arc::clone(&transport));
        if let Some(old) = previous {
            let _ = old.close().await;
        }
        self.set_state(McpClientState::Connected);

        if let Err(e) = self.initialize(transport.as_ref()).await {
            warn!("MCP '{}' handshake failed: {}", self.name, e);
            let _ = transport.close().await;
            self.transport.write().take();
            self.set_state(McpClientState::Error);
            return Err(e);
        }

        self.set_state(McpClientState::Ready);
        info!(
            "MCP server '{}' ready ({})",
            self.name,
            self.server_version().unwrap_or_else(|| "unknown server".to_string())
        );
        Ok(())
    }

    async fn initialize(&self, transport: &dyn McpTransport) -> Result<()> {
        self.set_state(McpClientState::Initializing);

        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "triage",
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let response = transport.request("initialize", Some(params)).await?;
        if let Some(error) = response.error {
            return Err(Error::Protocol(format!("initialize rejected: {}", error)));
        }

        let result: InitializeResult =
            serde_json::from_value(response.result.unwrap_or(Value::Null))
                .map_err(|e| Error::Protocol(format!("Invalid initialize response: {}", e)))?;

        if let Some(version) = result.protocol_version.as_deref() {
            if version != MCP_PROTOCOL_VERSION {
                warn!(
                    "MCP '{}' negotiated protocol {} (requested {})",
                    self.name, version, MCP_PROTOCOL_VERSION
                );
            }
        }
        *self.server_info.write() = result.server_info;

        transport
            .notify("notifications/initialized", None)
            .await
    }

    /// Fetch every tool page
    pub async fn list_tools(&self) -> Result<Vec<McpTool>> {
        let transport = self.ready_transport()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let response = transport.request("tools/list", params).await?;
            if let Some(error) = response.error {
                return Err(Error::Protocol(format!("tools/list failed: {}", error)));
            }

            let page: ToolsPage = serde_json::from_value(response.result.unwrap_or(Value::Null))
                .map_err(|e| Error::Protocol(format!("Invalid tools/list response: {}", e)))?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
                _ => break,
            }
        }

        info!("MCP '{}' advertises {} tools", self.name, tools.len());
        *self.tools.write() = tools.clone();
        Ok(tools)
    }

    /// Invoke a tool. RPC-level errors become tool execution errors.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<McpToolResult> {
        let transport = self.ready_transport()?;

        debug!("Calling MCP tool {} on '{}'", name, self.name);
        let response = transport
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": arguments })),
            )
            .await?;

        if let Some(error) = response.error {
            return Err(Error::tool_execution(name, error.to_string()));
        }

        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| Error::Protocol(format!("Invalid tools/call response: {}", e)))
    }

    /// Close the transport and fail every pending request
    pub async fn disconnect(&self) -> Result<()> {
        let transport = self.transport.write().take();
        if let Some(transport) = transport {
            transport.close().await?;
        }
        self.tools.write().clear();
        self.set_state(McpClientState::Disconnected);
        info!("Disconnected from MCP server: {}", self.name);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::mcp::{JsonRpcError, JsonRpcResponse, PendingRequests};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    type Handler = Box<dyn Fn(&str, Option<Value>) -> Option<JsonRpcResponse> + Send + Sync>;

    /// In-memory transport answering through a closure. `None` leaves the
    /// request pending until the transport is closed.
    pub(crate) struct ScriptedTransport {
        handler: Handler,
        next_id: AtomicU64,
        pending: PendingRequests,
        connected: AtomicBool,
        pub(crate) log: Mutex<Vec<(String, bool)>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(
            handler: impl Fn(&str, Option<Value>) -> Option<Value> + Send + Sync + 'static,
        ) -> Self {
            Self::raw(move |method, params| handler(method, params).map(|v| JsonRpcResponse::success(0, v)))
        }

        pub(crate) fn raw(
            handler: impl Fn(&str, Option<Value>) -> Option<JsonRpcResponse> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                next_id: AtomicU64::new(1),
                pending: PendingRequests::new(),
                connected: AtomicBool::new(true),
                log: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn methods(&self) -> Vec<String> {
            self.log.lock().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl McpTransport for ScriptedTransport {
        async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
            if !self.is_connected() {
                return Err(Error::mcp_connection("transport not connected"));
            }
            self.log.lock().push((method.to_string(), true));

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            let rx = self.pending.register(id);
            if let Some(mut reply) = (self.handler)(method, params) {
                reply.id = Some(Value::from(id));
                self.pending.resolve(reply);
            }
            rx.await
                .map_err(|_| Error::mcp_connection("connection closed"))
        }

        async fn notify(&self, method: &str, _params: Option<Value>) -> Result<()> {
            self.log.lock().push((method.to_string(), false));
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.connected.store(false, Ordering::SeqCst);
            self.pending.cancel_all();
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn echo_server() -> ScriptedTransport {
        ScriptedTransport::raw(|method, params| match method {
            "initialize" => Some(JsonRpcResponse::success(
                0,
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "serverInfo": {"name": "ops-mcp", "version": "1.2.0"},
                    "capabilities": {"tools": {}}
                }),
            )),
            "tools/list" => {
                let cursor = params.and_then(|p| p["cursor"].as_str().map(String::from));
                Some(JsonRpcResponse::success(
                    0,
                    match cursor.as_deref() {
                        None => json!({
                            "tools": [{"name": "echo", "description": "Echo text",
                                       "inputSchema": {"type": "object",
                                                       "properties": {"text": {"type": "string"}},
                                                       "required": ["text"]}}],
                            "nextCursor": "page2"
                        }),
                        _ => json!({"tools": [{"name": "fail"}]}),
                    },
                ))
            }
            "tools/call" => {
                let params = params.unwrap_or_default();
                match params["name"].as_str() {
                    Some("echo") => Some(JsonRpcResponse::success(
                        0,
                        json!({"content": [{"type": "text", "text": params["arguments"]["text"]}]}),
                    )),
                    Some("fail") => Some(JsonRpcResponse::success(
                        0,
                        json!({"content": [{"type": "text", "text": "backend down"}], "isError": true}),
                    )),
                    Some("hang") => None,
                    _ => Some(JsonRpcResponse::failure(0, JsonRpcError::new(-32602, "Unknown tool"))),
                }
            }
            _ => Some(JsonRpcResponse::failure(0, JsonRpcError::new(-32601, "Method not found"))),
        })
    }

    #[tokio::test]
    async fn test_call_before_connect() {
        let client = McpClient::new("ops", "http://localhost:1/sse");
        let err = client.call_tool("echo", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::McpConnection(_)));
        assert_eq!(client.state(), McpClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_handshake_order() {
        let client = McpClient::new("ops", "http://localhost:1/sse");
        let transport = Arc::new(echo_server());
        client.attach(transport.clone()).await.unwrap();

        assert_eq!(client.state(), McpClientState::Ready);
        assert_eq!(client.server_version().as_deref(), Some("ops-mcp 1.2.0"));
        assert_eq!(
            *transport.log.lock(),
            vec![
                ("initialize".to_string(), true),
                ("notifications/initialized".to_string(), false)
            ]
        );
    }

    #[tokio::test]
    async fn test_older_protocol_still_served() {
        let client = McpClient::new("legacy", "http://localhost:1/sse");
        let transport = Arc::new(ScriptedTransport::new(|method, _| match method {
            "initialize" => Some(json!({
                "protocolVersion": "2024-10-07",
                "serverInfo": {"name": "legacy-mcp", "version": "0.9.0"},
                "capabilities": {"tools": {}}
            })),
            "tools/call" => Some(json!({"content": [{"type": "text", "text": "ok"}]})),
            _ => None,
        }));
        client.attach(transport.clone()).await.unwrap();

        let result = client.call_tool("status", json!({})).await.unwrap();
        assert_eq!(result.flatten_text(), "ok");
        assert_eq!(
            transport.methods(),
            vec!["initialize", "notifications/initialized", "tools/call"]
        );
    }

    #[tokio::test]
    async fn test_list_tools_paginates() {
        let client = McpClient::new("ops", "http://localhost:1/sse");
        client.attach(Arc::new(echo_server())).await.unwrap();

        let tools = client.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "fail"]);
        assert_eq!(client.tools().len(), 2);
    }

    #[tokio::test]
    async fn test_call_tool_results() {
        let client = McpClient::new("ops", "http://localhost:1/sse");
        client.attach(Arc::new(echo_server())).await.unwrap();

        let ok = client.call_tool("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(ok.flatten_text(), "hi");

        let tool_error = client.call_tool("fail", json!({})).await.unwrap();
        assert!(tool_error.is_error);

        let rpc_error = client.call_tool("missing", json!({})).await.unwrap_err();
        match rpc_error {
            Error::ToolExecution { tool, message } => {
                assert_eq!(tool, "missing");
                assert!(message.contains("Unknown tool"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_initialize_rejected() {
        let client = McpClient::new("ops", "http://localhost:1/sse");
        let transport = ScriptedTransport::raw(|_, _| {
            Some(JsonRpcResponse::failure(0, JsonRpcError::new(-32600, "bad version")))
        });

        let err = client.attach(Arc::new(transport)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(client.state(), McpClientState::Error);
        assert!(client.call_tool("echo", json!({})).await.is_err());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending() {
        let client = Arc::new(McpClient::new("ops", "http://localhost:1/sse"));
        client.attach(Arc::new(echo_server())).await.unwrap();

        let waiter = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.call_tool("hang", json!({})).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        client.disconnect().await.unwrap();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::McpConnection(ref m) if m == "connection closed"));
        assert_eq!(client.state(), McpClientState::Disconnected);
    }
}
