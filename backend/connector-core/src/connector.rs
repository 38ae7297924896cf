//! Top-level connector facade.
//!
//! Owns the session state, the RPC client and the event stream, and
//! exposes the collaborator-facing surface: `call`, `call_with_cookies`,
//! `check_is_online`, `ping`, `report_active_url`,
//! `get_selected_collection` and event subscription.

use crate::config::ConnectorConfig;
use crate::connectivity::{ConnectivityTracker, ConnectorObserver};
use crate::error::config::ConfigError;
use crate::error::rpc::CommunicationError;
use crate::events::{self, EventRegistry, EventStreamHandle, EventSubscriber};
use crate::rpc::{CallDescriptor, CookieProvider, RpcClient, RpcValue};
use crate::session::{Selected, SelectedCollection, SelectedLibrary, SessionHandle};
use crate::transport::{HttpTransport, Transport};

use common::ErrorLocation;

use std::panic::Location;
use std::sync::{Arc, Mutex};

use serde_json::Value;

const GET_SELECTED_COLLECTION_METHOD: &str = "getSelectedCollection";
const INIT_EVENT: &str = "init";
const SELECT_EVENT: &str = "select";

pub struct Connector<T: Transport + 'static = HttpTransport> {
    config: ConnectorConfig,
    session: SessionHandle,
    tracker: Arc<ConnectivityTracker>,
    rpc: Arc<RpcClient<T>>,
    registry: EventRegistry,
    stream: Mutex<Option<EventStreamHandle>>,
}

impl Connector<HttpTransport> {
    /// Connector backed by a real HTTP transport.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config fails validation.
    pub fn new(
        config: ConnectorConfig,
        observer: Arc<dyn ConnectorObserver>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(config.request_timeout());
        Ok(Self::with_transport(config, observer, transport))
    }
}

impl<T: Transport + 'static> Connector<T> {
    /// Connector with an injected transport; used by tests and embedders
    /// that bring their own HTTP stack.
    pub fn with_transport(
        config: ConnectorConfig,
        observer: Arc<dyn ConnectorObserver>,
        transport: T,
    ) -> Self {
        let session = SessionHandle::new();
        let tracker = Arc::new(ConnectivityTracker::new(
            session.clone(),
            observer,
            config.client_version.clone(),
        ));
        let rpc = Arc::new(RpcClient::new(
            transport,
            config.clone(),
            session.clone(),
            Arc::clone(&tracker),
        ));

        Self {
            config,
            session,
            tracker,
            rpc,
            registry: EventRegistry::new(),
            stream: Mutex::new(None),
        }
    }

    /// Register the built-in selection listeners and open the event
    /// stream. Idempotent: a live stream is kept.
    pub fn init(&self) {
        {
            let session = self.session.clone();
            self.registry.add(
                INIT_EVENT,
                Arc::new(move |data: &Value| {
                    let selected = data
                        .get("selected")
                        .and_then(|value| serde_json::from_value(value.clone()).ok())
                        .unwrap_or_default();
                    session.replace_selected(selected);
                }),
            );
        }
        {
            let session = self.session.clone();
            self.registry.add(
                SELECT_EVENT,
                Arc::new(move |data: &Value| {
                    session.merge_selected(data);
                }),
            );
        }

        let mut stream = self
            .stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if stream.is_none() {
            *stream = Some(events::spawn(
                self.config.clone(),
                self.registry.clone(),
                Arc::clone(&self.tracker),
                Arc::clone(&self.rpc),
            ));
        }
    }

    /// Stop the event stream task. Safe to call when never initialized.
    pub async fn shutdown(&self) {
        let handle = self
            .stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    /// Whether the event stream handshake has succeeded and the
    /// connection is live.
    pub fn stream_available(&self) -> bool {
        self.stream
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(EventStreamHandle::is_available)
            .unwrap_or(false)
    }

    /// Read-only snapshot of the session state.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Execute one RPC call against the host app.
    pub async fn call(
        &self,
        descriptor: impl Into<CallDescriptor>,
        data: Option<Value>,
    ) -> Result<RpcValue, CommunicationError> {
        self.rpc.call(descriptor, data).await
    }

    /// [`call`](Self::call) with the calling context's cookies attached.
    pub async fn call_with_cookies<P: CookieProvider>(
        &self,
        descriptor: impl Into<CallDescriptor>,
        data: Value,
        provider: &P,
        context_url: &str,
    ) -> Result<RpcValue, CommunicationError> {
        self.rpc
            .call_with_cookies(descriptor, data, provider, context_url)
            .await
    }

    /// Ping the host app, latching any preference flags it reports.
    pub async fn ping(&self, payload: Value) -> Result<RpcValue, CommunicationError> {
        self.rpc.ping(payload).await
    }

    /// Report the active tab URL to the host app (best effort).
    pub async fn report_active_url(&self, url: &str) {
        self.rpc.report_active_url(url).await;
    }

    /// Current connectivity.
    ///
    /// Returns the cached flag when the event stream is live or when the
    /// environment only probes once and a probe already happened.
    /// Otherwise issues a lightweight ping and answers with the flag the
    /// ping's status derived — a host error response still counts as
    /// online, because something answered.
    pub async fn check_is_online(&self) -> bool {
        let cached = self.session.online();

        if self.config.probe_once {
            if let Some(flag) = cached {
                return flag;
            }
        }

        if self.stream_available() {
            return cached.unwrap_or(false);
        }

        let _ = self.rpc.ping(Value::Object(Default::default())).await;
        self.session.online().unwrap_or(false)
    }

    /// Last-known selection in the host app.
    ///
    /// Served from session state when the event stream keeps it fresh;
    /// otherwise fetched with a single `getSelectedCollection` call.
    ///
    /// # Errors
    ///
    /// Returns [`CommunicationError::Offline`] when the host app is not
    /// known to be online.
    pub async fn get_selected_collection(&self) -> Result<Selected, CommunicationError> {
        if self.session.online() != Some(true) {
            return Err(CommunicationError::Offline {
                method: GET_SELECTED_COLLECTION_METHOD.to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if self.stream_available() {
            return Ok(self.session.selected());
        }

        let response = self.call(GET_SELECTED_COLLECTION_METHOD, None).await?;
        let json = response
            .as_json()
            .ok_or_else(|| CommunicationError::MalformedResponse {
                method: GET_SELECTED_COLLECTION_METHOD.to_string(),
                message: "expected a JSON body".to_string(),
                location: ErrorLocation::from(Location::caller()),
            })?;

        Ok(Selected {
            library: Some(SelectedLibrary {
                id: json.get("id").and_then(Value::as_i64),
                editable: json.get("libraryEditable").and_then(Value::as_bool),
            }),
            collection: Some(SelectedCollection {
                id: None,
                name: json
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            item: None,
        })
    }

    /// Subscribe to a named stream event. Returns the handle used for
    /// removal.
    pub fn add_event_listener(
        &self,
        event: &str,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> Arc<dyn EventSubscriber> {
        self.registry.add(event, subscriber)
    }

    /// Unsubscribe a previously registered handle. A no-op for handles
    /// that were never registered.
    pub fn remove_event_listener(&self, event: &str, subscriber: &Arc<dyn EventSubscriber>) {
        self.registry.remove(event, subscriber);
    }
}
