//! MCP client against a minimal in-process SSE server

use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use triage_core::mcp::{McpClient, McpClientState, SharedState, SseOptions, SseTransport};
use triage_foundation::Error;

type StreamSlot = Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>;

/// How the fake server behaves
#[derive(Debug, Clone, Copy, PartialEq)]
enum Mode {
    Normal,
    /// Never sends the `endpoint` event
    NoEndpoint,
    /// Ends the event stream right after the response headers
    CloseAtOnce,
    /// Accepts `tools/call` but ends the event stream instead of replying
    DropStreamOnCall,
}

struct FakeServer {
    url: String,
}

impl FakeServer {
    async fn start(mode: Mode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let slot: StreamSlot = Arc::new(Mutex::new(None));

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let slot = Arc::clone(&slot);
                tokio::spawn(handle_connection(stream, slot, mode));
            }
        });

        Self {
            url: format!("http://{}/sse", addr),
        }
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<(String, String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 2048];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some((method, path, body))
}

async fn handle_connection(mut stream: TcpStream, slot: StreamSlot, mode: Mode) {
    let Some((method, path, body)) = read_request(&mut stream).await else {
        return;
    };

    if method == "GET" && path.starts_with("/sse") {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *slot.lock().await = Some(tx);

        let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nCache-Control: no-cache\r\n\r\n";
        if stream.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        if mode == Mode::CloseAtOnce {
            let _ = stream.shutdown().await;
            return;
        }
        if mode != Mode::NoEndpoint {
            let event = "event: endpoint\ndata: /messages?sessionId=test-1\n\n";
            if stream.write_all(event.as_bytes()).await.is_err() {
                return;
            }
        }
        let _ = stream.flush().await;

        while let Some(payload) = rx.recv().await {
            let frame = format!("event: message\ndata: {}\n\n", payload);
            if stream.write_all(frame.as_bytes()).await.is_err() {
                break;
            }
            let _ = stream.flush().await;
        }
        return;
    }

    if method == "POST" && path.starts_with("/messages") {
        let _ = stream
            .write_all(b"HTTP/1.1 202 Accepted\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await;
        let _ = stream.shutdown().await;

        let Ok(request) = serde_json::from_slice::<Value>(&body) else {
            return;
        };
        if mode == Mode::DropStreamOnCall && request["method"] == "tools/call" {
            // Dropping the sender ends the SSE handler and closes its socket
            slot.lock().await.take();
            return;
        }
        if let Some(reply) = answer(&request) {
            if let Some(tx) = slot.lock().await.as_ref() {
                let _ = tx.send(reply.to_string());
            }
        }
        return;
    }

    let _ = stream
        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .await;
}

fn answer(request: &Value) -> Option<Value> {
    let id = request.get("id")?.clone();
    let result = match request["method"].as_str()? {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": {"name": "fake-ops", "version": "0.1.0"},
            "capabilities": {"tools": {}}
        }),
        "tools/list" => json!({
            "tools": [{
                "name": "disk_usage",
                "description": "Filesystem usage for a host",
                "inputSchema": {
                    "type": "object",
                    "properties": {"host": {"type": "string"}},
                    "required": ["host"]
                }
            }]
        }),
        "tools/call" => {
            let host = request["params"]["arguments"]["host"].as_str().unwrap_or("?");
            json!({"content": [{"type": "text", "text": format!("{}: / is 91% full", host)}]})
        }
        _ => {
            return Some(json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found"}
            }))
        }
    };
    Some(json!({"jsonrpc": "2.0", "id": id, "result": result}))
}

fn options() -> SseOptions {
    SseOptions {
        endpoint_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_connect_discover_and_call() {
    let server = FakeServer::start(Mode::Normal).await;
    let client = McpClient::new("fake", &server.url).with_options(options());

    client.connect().await.unwrap();
    assert_eq!(client.state(), McpClientState::Ready);
    assert_eq!(client.server_version().as_deref(), Some("fake-ops 0.1.0"));

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "disk_usage");

    let result = client
        .call_tool("disk_usage", json!({"host": "web-1"}))
        .await
        .unwrap();
    assert_eq!(result.flatten_text(), "web-1: / is 91% full");

    client.disconnect().await.unwrap();
    assert_eq!(client.state(), McpClientState::Disconnected);
    assert!(matches!(
        client.call_tool("disk_usage", json!({"host": "web-1"})).await,
        Err(Error::McpConnection(_))
    ));
}

#[tokio::test]
async fn test_concurrent_requests_are_routed_by_id() {
    let server = FakeServer::start(Mode::Normal).await;
    let client = Arc::new(McpClient::new("fake", &server.url).with_options(options()));
    client.connect().await.unwrap();

    let calls = ["web-1", "web-2", "db-1"].map(|host| {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .call_tool("disk_usage", json!({ "host": host }))
                .await
                .map(|r| r.flatten_text())
        })
    });

    for (handle, host) in calls.into_iter().zip(["web-1", "web-2", "db-1"]) {
        let text = handle.await.unwrap().unwrap();
        assert_eq!(text, format!("{}: / is 91% full", host));
    }
}

#[tokio::test]
async fn test_missing_endpoint_event_times_out() {
    let server = FakeServer::start(Mode::NoEndpoint).await;
    let client = McpClient::new("fake", &server.url).with_options(SseOptions {
        endpoint_timeout: Duration::from_millis(300),
        request_timeout: Duration::from_secs(1),
    });

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(client.state(), McpClientState::Error);
}

async fn wait_for_state(state: impl Fn() -> McpClientState, expected: McpClientState) {
    for _ in 0..50 {
        if state() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state(), expected);
}

#[tokio::test]
async fn test_stream_end_fails_outstanding_call() {
    let server = FakeServer::start(Mode::DropStreamOnCall).await;
    let client = McpClient::new("fake", &server.url).with_options(SseOptions {
        endpoint_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(30),
    });
    client.connect().await.unwrap();

    let started = Instant::now();
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client.call_tool("disk_usage", json!({"host": "web-1"})),
    )
    .await
    .expect("waiter was not released when the stream ended");

    let err = outcome.unwrap_err();
    assert!(
        matches!(err, Error::McpConnection(ref m) if m == "connection closed"),
        "{}",
        err
    );
    assert!(started.elapsed() < Duration::from_secs(5));

    wait_for_state(|| client.state(), McpClientState::Disconnected).await;
    assert!(matches!(
        client.call_tool("disk_usage", json!({"host": "web-1"})).await,
        Err(Error::McpConnection(_))
    ));
}

#[tokio::test]
async fn test_stream_closed_before_endpoint() {
    let server = FakeServer::start(Mode::CloseAtOnce).await;
    let state: SharedState = Arc::new(RwLock::new(McpClientState::Connecting));

    let result = SseTransport::connect(&server.url, options(), Arc::clone(&state)).await;

    assert!(matches!(result, Err(Error::McpConnection(_))));
    // The reader's final write is not overwritten by connect
    wait_for_state(|| *state.read(), McpClientState::Disconnected).await;
}
