// Shared fakes for unit tests: an in-memory transport and a recording
// observer.

use crate::config::ConnectorConfig;
use crate::connectivity::{ConnectivityTracker, ConnectorObserver};
use crate::rpc::RpcClient;
use crate::session::SessionHandle;
use crate::transport::{Transport, TransportRequest, TransportResponse};

use common::HttpStatusCode;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Transport that replays canned responses and records every request.
#[derive(Default)]
pub(crate) struct FakeTransport {
    responses: Mutex<VecDeque<TransportResponse>>,
    pub requests: Arc<Mutex<Vec<TransportRequest>>>,
}

impl FakeTransport {
    pub fn with_responses(responses: Vec<TransportResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Arc::default(),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl Transport for FakeTransport {
    async fn send(&self, request: TransportRequest) -> TransportResponse {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        self.responses
            .lock()
            .ok()
            .and_then(|mut responses| responses.pop_front())
            .unwrap_or_else(TransportResponse::unreachable)
    }
}

/// Observer that records every notification it receives.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub state_changes: Mutex<Vec<(bool, Option<String>)>>,
    pub version_mismatches: Mutex<Vec<(String, String)>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<(bool, Option<String>)> {
        self.state_changes
            .lock()
            .map(|changes| changes.clone())
            .unwrap_or_default()
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

pub(crate) struct Harness {
    pub rpc: RpcClient<Arc<FakeTransport>>,
    pub transport: Arc<FakeTransport>,
    pub session: SessionHandle,
    pub observer: Arc<RecordingObserver>,
}

impl Transport for Arc<FakeTransport> {
    async fn send(&self, request: TransportRequest) -> TransportResponse {
        self.as_ref().send(request).await
    }
}

/// RPC client wired to a fake transport and a recording observer.
pub(crate) fn harness(responses: Vec<TransportResponse>, probe_once: bool) -> Harness {
    let transport = Arc::new(FakeTransport::with_responses(responses));
    let session = SessionHandle::new();
    let observer = Arc::new(RecordingObserver::default());
    let config = ConnectorConfig {
        base_url: "http://127.0.0.1:23119".to_string(),
        client_version: "5.0.0".to_string(),
        probe_once,
        ..ConnectorConfig::default()
    };
    let tracker = Arc::new(ConnectivityTracker::new(
        session.clone(),
        observer.clone(),
        config.client_version.clone(),
    ));
    let rpc = RpcClient::new(
        Arc::clone(&transport),
        config,
        session.clone(),
        tracker,
    );

    Harness {
        rpc,
        transport,
        session,
        observer,
    }
}

pub(crate) fn response(status: u16, content_type: &str, body: &str) -> TransportResponse {
    let mut headers = HashMap::new();
    if !content_type.is_empty() {
        headers.insert("content-type".to_string(), content_type.to_string());
    }
    TransportResponse {
        status: HttpStatusCode(status),
        headers,
        body: body.to_string(),
    }
}

pub(crate) fn json_response(status: u16, body: &str) -> TransportResponse {
    response(status, "application/json", body)
}
