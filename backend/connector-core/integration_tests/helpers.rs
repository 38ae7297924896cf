// Test doubles shared by the integration tests: a recording observer and
// a minimal raw-TCP host-app stand-in that can hold an SSE connection
// open, which wiremock cannot.

use connector_core::config::ConnectorConfig;
use connector_core::connectivity::ConnectorObserver;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Observer that records every notification it receives.
#[derive(Default)]
pub struct RecordingObserver {
    state_changes: Mutex<Vec<(bool, Option<String>)>>,
    version_mismatches: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<(bool, Option<String>)> {
        self.state_changes
            .lock()
            .map(|changes| changes.clone())
            .unwrap_or_default()
    }

    pub fn offline_count(&self) -> usize {
        self.states().iter().filter(|(online, _)| !online).count()
    }

    pub fn mismatches(&self) -> Vec<(String, String)> {
        self.version_mismatches
            .lock()
            .map(|mismatches| mismatches.clone())
            .unwrap_or_default()
    }
}

impl ConnectorObserver for RecordingObserver {
    fn on_state_change(&self, online: bool, host_version: Option<&str>) {
        if let Ok(mut changes) = self.state_changes.lock() {
            changes.push((online, host_version.map(str::to_string)));
        }
    }

    fn on_incompatible_version(&self, client_version: &str, host_version: &str) {
        if let Ok(mut mismatches) = self.version_mismatches.lock() {
            mismatches.push((client_version.to_string(), host_version.to_string()));
        }
    }
}

/// Config pointing at a test server, with a version the tests can assert
/// on and a long backoff so reconnect timing is fully test-controlled
/// unless a test shortens it.
pub fn test_config(base_url: &str) -> ConnectorConfig {
    ConnectorConfig {
        base_url: base_url.to_string(),
        client_version: "5.0.0".to_string(),
        reconnect_backoff_secs: 60,
        ..ConnectorConfig::default()
    }
}

/// Poll `predicate` every 25 ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, predicate: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[derive(Debug, Clone)]
enum StreamDirective {
    Frame(String),
    CloseConnections,
}

/// Hand-rolled host-app stand-in.
///
/// Serves `GET /connector/sse` as a long-lived event stream fed from the
/// test, and answers every other request (the connector's pings) with a
/// minimal JSON 200. Each connection is handled on its own task so an
/// open stream never blocks an RPC response.
pub struct SseTestServer {
    pub base_url: String,
    directives: broadcast::Sender<StreamDirective>,
    sse_connections: Arc<AtomicUsize>,
    rpc_requests: Arc<Mutex<Vec<String>>>,
    reject_handshake: Arc<AtomicBool>,
}

impl SseTestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");

        let (directives, _) = broadcast::channel(64);
        let sse_connections = Arc::new(AtomicUsize::new(0));
        let rpc_requests = Arc::new(Mutex::new(Vec::new()));
        let reject_handshake = Arc::new(AtomicBool::new(false));

        let server = Self {
            base_url: format!("http://{addr}"),
            directives: directives.clone(),
            sse_connections: Arc::clone(&sse_connections),
            rpc_requests: Arc::clone(&rpc_requests),
            reject_handshake: Arc::clone(&reject_handshake),
        };

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(handle_connection(
                    socket,
                    directives.subscribe(),
                    Arc::clone(&sse_connections),
                    Arc::clone(&rpc_requests),
                    Arc::clone(&reject_handshake),
                ));
            }
        });

        server
    }

    /// Number of stream handshakes attempted so far.
    pub fn sse_connection_count(&self) -> usize {
        self.sse_connections.load(Ordering::SeqCst)
    }

    /// Request lines of every non-stream request received.
    pub fn rpc_request_lines(&self) -> Vec<String> {
        self.rpc_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn saw_rpc_method(&self, method: &str) -> bool {
        self.rpc_request_lines()
            .iter()
            .any(|line| line.contains(&format!("/connector/{method}")))
    }

    /// Answer subsequent stream handshakes with 500 instead of opening.
    pub fn reject_handshakes(&self, reject: bool) {
        self.reject_handshake.store(reject, Ordering::SeqCst);
    }

    /// Push one event envelope to every open stream.
    pub fn send_envelope(&self, envelope: Value) {
        let _ = self
            .directives
            .send(StreamDirective::Frame(format!("data: {envelope}\n\n")));
    }

    /// Drop every open stream connection, simulating a host-app restart.
    pub fn close_streams(&self) {
        let _ = self.directives.send(StreamDirective::CloseConnections);
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    mut directives: broadcast::Receiver<StreamDirective>,
    sse_connections: Arc<AtomicUsize>,
    rpc_requests: Arc<Mutex<Vec<String>>>,
    reject_handshake: Arc<AtomicBool>,
) {
    // One read is enough for the small requests these tests produce
    let mut buffer = [0u8; 8192];
    let Ok(read) = socket.read(&mut buffer).await else {
        return;
    };
    let head = String::from_utf8_lossy(&buffer[..read]).to_string();
    let request_line = head.lines().next().unwrap_or_default().to_string();

    if request_line.starts_with("GET /connector/sse") {
        sse_connections.fetch_add(1, Ordering::SeqCst);

        if reject_handshake.load(Ordering::SeqCst) {
            let _ = socket
                .write_all(
                    b"HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                )
                .await;
            return;
        }

        // No content-length: the body runs until the connection closes
        let _ = socket
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\r\n")
            .await;

        loop {
            match directives.recv().await {
                Ok(StreamDirective::Frame(frame)) => {
                    if socket.write_all(frame.as_bytes()).await.is_err() {
                        return;
                    }
                    let _ = socket.flush().await;
                }
                Ok(StreamDirective::CloseConnections) => return,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    if let Ok(mut requests) = rpc_requests.lock() {
        requests.push(request_line);
    }

    let body = r#"{"prefs": {}}"#;
    let response = format!(
        "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
}
