//! MCP Transport - SSE stream + POST channel
//!
//! The server pushes every reply on one long-lived event stream. The first
//! event (`endpoint`) names the URL that requests must be POSTed to.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::{Mutex, RwLock};
use reqwest::Url;
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use triage_foundation::{Error, Result};

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use super::types::McpClientState;

/// Client state shared with the transport's read task
pub type SharedState = Arc<RwLock<McpClientState>>;

/// Transport seam between [`super::McpClient`] and the wire
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a request and wait for its reply
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse>;

    /// Fire-and-forget notification
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()>;

    /// Stop reading and fail every pending request
    async fn close(&self) -> Result<()>;

    fn is_connected(&self) -> bool;
}

// ============================================================================
// Pending request table
// ============================================================================

/// Maps request id → waiter
#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: u64) -> oneshot::Receiver<JsonRpcResponse> {
        let (tx, rx) = oneshot::channel();
        self.inner.lock().insert(id, tx);
        rx
    }

    /// Register only while `connected` holds.
    ///
    /// Checked under the table lock: closers clear the flag before
    /// `cancel_all`, so a waiter is either refused here or drained there.
    pub fn register_while(
        &self,
        id: u64,
        connected: &AtomicBool,
    ) -> Option<oneshot::Receiver<JsonRpcResponse>> {
        let mut table = self.inner.lock();
        if !connected.load(Ordering::SeqCst) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        table.insert(id, tx);
        Some(rx)
    }

    /// Deliver a reply to its waiter. Unmatched replies are dropped.
    pub fn resolve(&self, response: JsonRpcResponse) -> bool {
        let Some(id) = response.request_id() else {
            warn!("Dropping reply without usable id: {:?}", response.id);
            return false;
        };

        let sender = self.inner.lock().remove(&id);
        match sender {
            Some(tx) => {
                if tx.send(response).is_err() {
                    debug!("Waiter for request {} is gone", id);
                }
                true
            }
            None => {
                warn!("Dropping unmatched reply for request {}", id);
                false
            }
        }
    }

    pub fn remove(&self, id: u64) {
        self.inner.lock().remove(&id);
    }

    /// Drop every sender; waiters observe a closed channel
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<_> = self.inner.lock().drain().collect();
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Event routing
// ============================================================================

/// What to do with one SSE event
#[derive(Debug)]
pub enum SseRoute {
    Endpoint(Url),
    Reply(JsonRpcResponse),
    Ignored,
}

/// Classify an SSE event.
///
/// `endpoint` payloads are a bare path or `{"endpoint": "..."}` and are
/// resolved against `base_url`. They only count while no endpoint is known.
pub fn route_event(event_type: &str, data: &str, base_url: &Url, awaiting_endpoint: bool) -> SseRoute {
    if event_type == "endpoint" {
        if !awaiting_endpoint {
            debug!("Ignoring repeated endpoint event");
            return SseRoute::Ignored;
        }
        return match resolve_endpoint(data, base_url) {
            Some(url) => SseRoute::Endpoint(url),
            None => {
                warn!("Unusable endpoint event payload: {}", data);
                SseRoute::Ignored
            }
        };
    }

    let data = data.trim();
    if data.is_empty() {
        return SseRoute::Ignored;
    }

    match serde_json::from_str::<JsonRpcResponse>(data) {
        Ok(response) if response.is_reply() => SseRoute::Reply(response),
        Ok(_) => {
            debug!("Ignoring server-initiated message: {}", data);
            SseRoute::Ignored
        }
        Err(e) => {
            debug!("Ignoring non JSON-RPC event '{}': {}", event_type, e);
            SseRoute::Ignored
        }
    }
}

fn resolve_endpoint(data: &str, base_url: &Url) -> Option<Url> {
    let data = data.trim();
    let path = if data.starts_with('{') {
        let value: Value = serde_json::from_str(data).ok()?;
        value.get("endpoint")?.as_str()?.to_string()
    } else {
        data.to_string()
    };

    if path.is_empty() {
        return None;
    }
    base_url.join(&path).ok()
}

// ============================================================================
// SSE transport
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct SseOptions {
    /// Bound on the wait for the `endpoint` event
    pub endpoint_timeout: Duration,
    /// Bound on each request's reply
    pub request_timeout: Duration,
}

impl Default for SseOptions {
    fn default() -> Self {
        Self {
            endpoint_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }
}

pub struct SseTransport {
    message_url: Url,
    client: reqwest::Client,
    request_id: AtomicU64,
    pending: PendingRequests,
    connected: Arc<AtomicBool>,
    reader: Mutex<Option<JoinHandle<()>>>,
    request_timeout: Duration,
}

impl SseTransport {
    /// Open the event stream and wait for the POST endpoint
    pub async fn connect(url: &str, options: SseOptions, state: SharedState) -> Result<Self> {
        info!("Connecting to MCP SSE server: {}", url);

        let base_url = Url::parse(url)
            .map_err(|e| Error::mcp_connection(format!("Invalid MCP url '{}': {}", url, e)))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::mcp_connection(format!("Failed to create HTTP client: {}", e)))?;

        let stream = EventSource::new(client.get(base_url.clone()))
            .map_err(|e| Error::mcp_connection(format!("Failed to open event stream: {}", e)))?;

        let pending = PendingRequests::new();
        let connected = Arc::new(AtomicBool::new(false));
        let (endpoint_tx, endpoint_rx) = oneshot::channel();

        // Before the spawn, so a reader that exits at once has the last word
        *state.write() = McpClientState::AwaitingEndpoint;
        debug!("MCP state: {}", McpClientState::AwaitingEndpoint);

        let reader = tokio::spawn(read_loop(
            stream,
            base_url,
            pending.clone(),
            Arc::clone(&connected),
            Arc::clone(&state),
            endpoint_tx,
        ));

        let message_url = match tokio::time::timeout(options.endpoint_timeout, endpoint_rx).await {
            Ok(Ok(Ok(endpoint))) => endpoint,
            Ok(Ok(Err(message))) => {
                reader.abort();
                return Err(Error::mcp_connection(message));
            }
            Ok(Err(_)) => {
                reader.abort();
                return Err(Error::mcp_connection(
                    "event stream closed before endpoint event",
                ));
            }
            Err(_) => {
                reader.abort();
                return Err(Error::Timeout(format!(
                    "no endpoint event from {} within {}s",
                    url,
                    options.endpoint_timeout.as_secs()
                )));
            }
        };

        info!("MCP endpoint discovered: {}", message_url);
        connected.store(true, Ordering::SeqCst);

        Ok(Self {
            message_url,
            client,
            request_id: AtomicU64::new(1),
            pending,
            connected,
            reader: Mutex::new(Some(reader)),
            request_timeout: options.request_timeout,
        })
    }

    pub fn message_url(&self) -> &Url {
        &self.message_url
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.lock().take() {
            reader.abort();
        }
        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {} pending MCP requests", cancelled);
        }
    }

    async fn post(&self, body: &JsonRpcRequest) -> Result<()> {
        let response = self
            .client
            .post(self.message_url.clone())
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Request(format!("{}: {}", body.method, e)))?;

        // Replies travel on the stream; only the status matters here
        if !response.status().is_success() {
            return Err(Error::Request(format!(
                "{}: HTTP {}",
                body.method,
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        if !self.is_connected() {
            return Err(Error::mcp_connection("transport not connected"));
        }

        let id = self.next_id();
        let request = JsonRpcRequest::new(id, method, params);
        let Some(rx) = self.pending.register_while(id, &self.connected) else {
            return Err(Error::mcp_connection("connection closed"));
        };

        if let Err(e) = self.post(&request).await {
            self.pending.remove(id);
            return Err(e);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(Error::mcp_connection("connection closed")),
            Err(_) => {
                self.pending.remove(id);
                Err(Error::Timeout(format!(
                    "{} (id {}) got no reply within {}s",
                    method,
                    id,
                    self.request_timeout.as_secs()
                )))
            }
        }
    }

    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::mcp_connection("transport not connected"));
        }
        self.post(&JsonRpcRequest::notification(method, params))
            .await
    }

    async fn close(&self) -> Result<()> {
        self.shutdown();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn read_loop(
    mut stream: EventSource,
    base_url: Url,
    pending: PendingRequests,
    connected: Arc<AtomicBool>,
    state: SharedState,
    endpoint_tx: oneshot::Sender<std::result::Result<Url, String>>,
) {
    let mut endpoint_tx = Some(endpoint_tx);

    while let Some(event) = stream.next().await {
        match event {
            Ok(Event::Open) => debug!("SSE stream opened: {}", base_url),
            Ok(Event::Message(message)) => {
                match route_event(&message.event, &message.data, &base_url, endpoint_tx.is_some()) {
                    SseRoute::Endpoint(url) => {
                        if let Some(tx) = endpoint_tx.take() {
                            let _ = tx.send(Ok(url));
                        }
                    }
                    SseRoute::Reply(response) => {
                        pending.resolve(response);
                    }
                    SseRoute::Ignored => {}
                }
            }
            Err(e) => {
                error!("SSE stream error: {}", e);
                if let Some(tx) = endpoint_tx.take() {
                    let _ = tx.send(Err(format!("event stream failed: {}", e)));
                }
                break;
            }
        }
    }

    stream.close();
    connected.store(false, Ordering::SeqCst);
    let cancelled = pending.cancel_all();
    *state.write() = McpClientState::Disconnected;
    info!(
        "SSE stream closed ({} pending requests cancelled)",
        cancelled
    );
}
