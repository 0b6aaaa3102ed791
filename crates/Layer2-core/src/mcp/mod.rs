//! MCP - Model Context Protocol client
//!
//! Reaches an external tool provider over JSON-RPC 2.0 carried on an
//! SSE stream (server → client) plus HTTP POST (client → server).
//!
//! ```text
//! McpClient ──request/notify──▶ McpTransport (SseTransport)
//!     ▲                              │ GET  /sse    (event stream, read task)
//!     │                              │ POST /messages?session=..
//! McpToolModule ◀── ToolRegistry     ▼
//!                              PendingRequests (id → oneshot)
//! ```
//!
//! ## References
//! - https://modelcontextprotocol.io/

mod bridge;
mod client;
mod protocol;
mod transport;
mod types;

pub use bridge::McpToolModule;
pub use client::{McpClient, MCP_PROTOCOL_VERSION};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use transport::{
    route_event, McpTransport, PendingRequests, SharedState, SseOptions, SseRoute, SseTransport,
};
pub use types::{McpClientState, McpContent, McpResource, McpTool, McpToolResult};
