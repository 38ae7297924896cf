//! Server-push event stream client.
//!
//! Maintains one persistent connection to `<base>/connector/sse` and
//! dispatches named events to subscribers in registration order. The
//! reconnect loop lives in a single spawned task with an explicit
//! shutdown signal, so tests and embedders can tear it down cleanly.

use crate::config::ConnectorConfig;
use crate::connectivity::ConnectivityTracker;
use crate::rpc::{RpcClient, CONNECTOR_PATH_PREFIX};
use crate::transport::Transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const SSE_ENDPOINT: &str = "sse";
const ACCEPT_HEADER: &str = "Accept";
const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";
const DATA_FIELD_PREFIX: &str = "data:";
const DEBUG_PAYLOAD_PREVIEW_CHARS: usize = 100;

/// A named event delivered over the stream.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// A subscriber registered for a named event. Invoked synchronously in
/// arrival order; implementations must not block the stream.
pub trait EventSubscriber: Send + Sync {
    fn notify(&self, data: &Value);
}

impl<F> EventSubscriber for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn notify(&self, data: &Value) {
        self(data)
    }
}

/// Ordered subscriber lists keyed by event name.
///
/// Clones share the same registry. Removal is by exact reference match
/// on the `Arc` returned from [`add`](Self::add); removing a subscriber
/// that was never registered is a no-op.
#[derive(Clone, Default)]
pub struct EventRegistry {
    inner: Arc<RwLock<HashMap<String, Vec<Arc<dyn EventSubscriber>>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber for `event`. Returns the handle used for
    /// later removal.
    pub fn add(
        &self,
        event: &str,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Arc<dyn EventSubscriber> {
        let mut map = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.entry(event.to_string())
            .or_default()
            .push(Arc::clone(&subscriber));
        subscriber
    }

    /// Remove a previously registered subscriber by reference.
    pub fn remove(&self, event: &str, subscriber: &Arc<dyn EventSubscriber>) {
        let mut map = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(subscribers) = map.get_mut(event) {
            subscribers.retain(|existing| !Arc::ptr_eq(existing, subscriber));
        }
    }

    /// Invoke every subscriber registered for `event`, in registration
    /// order. Events nobody subscribed to are dropped silently.
    pub fn dispatch(&self, event: &str, data: &Value) {
        let subscribers = {
            let map = self
                .inner
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            map.get(event).cloned().unwrap_or_default()
        };

        for subscriber in subscribers {
            subscriber.notify(data);
        }
    }
}

/// Reassembles SSE frames from arbitrarily-chunked stream data.
///
/// Only `data:` fields are used; the envelope's own `event` key carries
/// the event name, matching the host app's wire format.
#[derive(Default)]
pub(crate) struct FrameBuffer {
    buffer: String,
}

impl FrameBuffer {
    /// Feed a chunk and return every envelope completed by it.
    pub(crate) fn push(&mut self, chunk: &str) -> Vec<Envelope> {
        // CRLF is a legal SSE line ending; normalize so the blank-line
        // boundary scan below only has one shape to find. A \r\n split
        // across chunks leaves a stray \r that parse_frame trims.
        self.buffer.push_str(&chunk.replace("\r\n", "\n"));

        let mut envelopes = Vec::new();
        while let Some(boundary) = self.buffer.find("\n\n") {
            let frame = self.buffer[..boundary].to_string();
            self.buffer.drain(..boundary + 2);
            if let Some(envelope) = parse_frame(&frame) {
                envelopes.push(envelope);
            }
        }
        envelopes
    }
}

fn parse_frame(frame: &str) -> Option<Envelope> {
    let data = frame
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix(DATA_FIELD_PREFIX))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<Envelope>(&data) {
        Ok(envelope) => Some(envelope),
        Err(err) => {
            warn!("Connector: discarding unparsable stream frame: {err}");
            None
        }
    }
}

/// Handle to the running stream task.
pub struct EventStreamHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    available: Arc<AtomicBool>,
}

impl EventStreamHandle {
    /// Whether the stream handshake has succeeded and the connection is
    /// currently live.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Stop the reconnect loop and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

enum ConnectionEnd {
    /// Shutdown was requested while connected or connecting.
    Shutdown,
    /// The connection failed or dropped. `was_open` distinguishes a
    /// drop after a successful handshake from a failure to connect.
    Dropped { was_open: bool },
}

/// Spawn the stream task: connect, dispatch, reconnect until shutdown.
pub fn spawn<T: Transport + 'static>(
    config: ConnectorConfig,
    registry: EventRegistry,
    tracker: Arc<ConnectivityTracker>,
    rpc: Arc<RpcClient<T>>,
) -> EventStreamHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let available = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(run(
        config,
        registry,
        tracker,
        rpc,
        Arc::clone(&available),
        shutdown_rx,
    ));

    EventStreamHandle {
        shutdown: shutdown_tx,
        task,
        available,
    }
}

async fn run<T: Transport + 'static>(
    config: ConnectorConfig,
    registry: EventRegistry,
    tracker: Arc<ConnectivityTracker>,
    rpc: Arc<RpcClient<T>>,
    available: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let client = reqwest::Client::new();
    let url = format!(
        "{}/{}/{}",
        config.base(),
        CONNECTOR_PATH_PREFIX,
        SSE_ENDPOINT
    );

    loop {
        let end = connect_once(
            &client,
            &url,
            &registry,
            &tracker,
            &rpc,
            &available,
            &mut shutdown,
        )
        .await;

        available.store(false, Ordering::SeqCst);

        match end {
            ConnectionEnd::Shutdown => break,
            ConnectionEnd::Dropped { was_open } => {
                // The tracker dedupes, so repeated drops while already
                // offline notify nobody.
                tracker.record(false, None);

                if was_open {
                    // Likely a plain HTTP timeout; retry at once
                    debug!("Connector: event stream dropped, reconnecting immediately");
                    continue;
                }

                debug!(
                    "Connector: event stream connection failed, retrying in {:?}",
                    config.reconnect_backoff()
                );
                tokio::select! {
                    _ = sleep(config.reconnect_backoff()) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    debug!("Connector: event stream task stopped");
}

async fn connect_once<T: Transport + 'static>(
    client: &reqwest::Client,
    url: &str,
    registry: &EventRegistry,
    tracker: &ConnectivityTracker,
    rpc: &Arc<RpcClient<T>>,
    available: &Arc<AtomicBool>,
    shutdown: &mut watch::Receiver<bool>,
) -> ConnectionEnd {
    let request = client
        .get(url)
        .header(ACCEPT_HEADER, EVENT_STREAM_CONTENT_TYPE)
        .send();

    let response = tokio::select! {
        result = request => result,
        _ = shutdown.changed() => return ConnectionEnd::Shutdown,
    };

    let response = match response {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            debug!(
                "Connector: event stream handshake rejected with status {}",
                response.status().as_u16()
            );
            return ConnectionEnd::Dropped { was_open: false };
        }
        Err(err) => {
            debug!("Connector: event stream connection failed: {err}");
            return ConnectionEnd::Dropped { was_open: false };
        }
    };

    // Open: the handshake succeeded, so the host app is reachable
    available.store(true, Ordering::SeqCst);
    tracker.record(true, None);
    info!("Connector: event stream open");

    // One proactive ping refreshes the host app's preference flags
    if let Err(err) = rpc.ping(Value::Object(Default::default())).await {
        debug!("Connector: post-open ping failed: {err}");
    }

    let mut stream = response.bytes_stream();
    let mut frames = FrameBuffer::default();

    loop {
        let chunk = tokio::select! {
            chunk = stream.next() => chunk,
            _ = shutdown.changed() => return ConnectionEnd::Shutdown,
        };

        match chunk {
            Some(Ok(bytes)) => {
                for envelope in frames.push(&String::from_utf8_lossy(&bytes)) {
                    let preview: String = envelope
                        .data
                        .to_string()
                        .chars()
                        .take(DEBUG_PAYLOAD_PREVIEW_CHARS)
                        .collect();
                    debug!("Connector: stream event '{}': {preview}", envelope.event);
                    registry.dispatch(&envelope.event, &envelope.data);
                }
            }
            Some(Err(err)) => {
                debug!("Connector: event stream read failed: {err}");
                return ConnectionEnd::Dropped { was_open: true };
            }
            None => {
                debug!("Connector: event stream ended");
                return ConnectionEnd::Dropped { was_open: true };
            }
        }
    }
}
