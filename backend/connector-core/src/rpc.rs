//! RPC method-call layer of the connector protocol.
//!
//! One logical call maps to one HTTP request against
//! `<base>/connector/<method>`. Success is any status in [200, 400);
//! everything else becomes a [`CommunicationError`] variant. Every
//! response, success or failure, also feeds the connectivity tracker
//! before the call resolves.

use crate::config::ConnectorConfig;
use crate::connectivity::ConnectivityTracker;
use crate::error::rpc::CommunicationError;
use crate::session::SessionHandle;
use crate::transport::{HttpMethod, Transport, TransportRequest, TransportResponse};
use crate::CONNECTOR_API_VERSION;

use common::ErrorLocation;

use std::future::Future;
use std::panic::Location;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub(crate) const CONNECTOR_PATH_PREFIX: &str = "connector";

const CONTENT_TYPE_HEADER: &str = "Content-Type";
const JSON_CONTENT_TYPE: &str = "application/json";
const CLIENT_VERSION_HEADER: &str = "X-Client-Version";
const API_VERSION_HEADER: &str = "X-Client-Protocol-Version";
/// Response header in which the host app advertises its own version.
pub const HOST_VERSION_HEADER: &str = "X-Host-Version";

const UNKNOWN_HOST_VERSION: &str = "<unknown>";

const PING_METHOD: &str = "ping";
const PREFS_KEY: &str = "prefs";
const REPORT_ACTIVE_URL_PREF: &str = "reportActiveURL";
const AUTO_SNAPSHOT_PREF: &str = "automaticSnapshots";
const ACTIVE_URL_KEY: &str = "activeURL";
const DETAILED_COOKIES_KEY: &str = "detailedCookies";
const PLAIN_COOKIE_KEY: &str = "cookie";
const COOKIE_URI_KEY: &str = "uri";

/// A logical RPC call: method name plus optional extra headers and a
/// query string.
#[derive(Debug, Clone, Default)]
pub struct CallDescriptor {
    pub method: String,
    /// Extra headers; these win over the fixed header set on name
    /// collision (last-write-wins).
    pub headers: Vec<(String, String)>,
    /// Query string without the leading `?`.
    pub query_string: Option<String>,
}

impl CallDescriptor {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = Some(query.into());
        self
    }
}

impl From<&str> for CallDescriptor {
    fn from(method: &str) -> Self {
        CallDescriptor::new(method)
    }
}

impl From<String> for CallDescriptor {
    fn from(method: String) -> Self {
        CallDescriptor::new(method)
    }
}

/// Parsed body of an RPC response: JSON when the host app declared it,
/// raw text otherwise, or nothing at all.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcValue {
    Json(Value),
    Text(String),
    Empty,
}

impl RpcValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            RpcValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RpcValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RpcValue::Empty)
    }
}

/// A cookie visible to the browsing context that initiated a call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: Option<String>,
    pub host_only: bool,
    pub secure: bool,
}

impl Cookie {
    /// Header-style serialization understood by the host app's cookie
    /// sandbox: `name=value;Domain=…[;Path=…][;hostOnly][;secure]`.
    fn serialize_entry(&self) -> String {
        let mut entry = format!("{}={};Domain={}", self.name, self.value, self.domain);
        if let Some(path) = &self.path {
            entry.push_str(";Path=");
            entry.push_str(path);
        }
        if self.host_only {
            entry.push_str(";hostOnly");
        }
        if self.secure {
            entry.push_str(";secure");
        }
        entry
    }
}

/// Enumerates cookies visible to a browsing context. Returning `None`
/// signals the environment has no same-context cookie visibility, in
/// which case calls proceed without cookie data.
pub trait CookieProvider: Send + Sync {
    fn cookies_for(&self, url: &str) -> impl Future<Output = Option<Vec<Cookie>>> + Send;
}

pub struct RpcClient<T: Transport> {
    transport: T,
    config: ConnectorConfig,
    session: SessionHandle,
    tracker: Arc<ConnectivityTracker>,
}

impl<T: Transport> RpcClient<T> {
    pub fn new(
        transport: T,
        config: ConnectorConfig,
        session: SessionHandle,
        tracker: Arc<ConnectivityTracker>,
    ) -> Self {
        Self {
            transport,
            config,
            session,
            tracker,
        }
    }

    /// Execute one RPC call.
    ///
    /// `data`, if present, is serialized as the request body and forces a
    /// POST; absence of `data` forces a GET.
    ///
    /// # Errors
    ///
    /// Returns [`CommunicationError`] per the protocol's failure
    /// taxonomy. No variant is retried automatically.
    pub async fn call(
        &self,
        descriptor: impl Into<CallDescriptor>,
        data: Option<Value>,
    ) -> Result<RpcValue, CommunicationError> {
        let descriptor = descriptor.into();
        let method = descriptor.method.clone();

        // Without a push channel the cached flag is all we will ever
        // have, so a known-offline host fails fast instead of stalling
        // on the network.
        if self.config.probe_once && self.session.online() == Some(false) {
            debug!("Connector: method {method} short-circuited, host app known offline");
            return Err(CommunicationError::Offline {
                method,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let request = self.build_request(&descriptor, data);
        let response = self.transport.send(request).await;
        self.handle_response(&method, response)
    }

    /// Same contract as [`call`](Self::call), but first enumerates the
    /// cookies visible to `context_url` and attaches them to `data`
    /// along with the originating URI. Falls back to a plain call when
    /// the provider reports no cookie visibility.
    pub async fn call_with_cookies<P: CookieProvider>(
        &self,
        descriptor: impl Into<CallDescriptor>,
        mut data: Value,
        provider: &P,
        context_url: &str,
    ) -> Result<RpcValue, CommunicationError> {
        let Some(cookies) = provider.cookies_for(context_url).await else {
            return self.call(descriptor, Some(data)).await;
        };

        if let Some(map) = data.as_object_mut() {
            let cookie_header = cookies
                .iter()
                .map(Cookie::serialize_entry)
                .collect::<Vec<_>>()
                .join("\n");

            if !cookie_header.is_empty() {
                map.insert(DETAILED_COOKIES_KEY.to_string(), Value::String(cookie_header));
                map.remove(PLAIN_COOKIE_KEY);
            }

            // The host app needs the originating URI to scope its cookie sandbox
            map.insert(
                COOKIE_URI_KEY.to_string(),
                Value::String(context_url.to_string()),
            );
        }

        self.call(descriptor, Some(data)).await
    }

    /// Ping the host app and latch any preference flags it reports.
    pub async fn ping(&self, payload: Value) -> Result<RpcValue, CommunicationError> {
        let response = self.call(PING_METHOD, Some(payload)).await?;

        if let Some(prefs) = response.as_json().and_then(|value| value.get(PREFS_KEY)) {
            let report_active_url = prefs
                .get(REPORT_ACTIVE_URL_PREF)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let auto_snapshot = prefs
                .get(AUTO_SNAPSHOT_PREF)
                .and_then(Value::as_bool)
                .unwrap_or(false);
            self.session.apply_prefs(report_active_url, auto_snapshot);
        }

        Ok(response)
    }

    /// Report the active tab URL to the host app. A no-op unless the
    /// connector is online and the host app asked for URL reports; ping
    /// failures are logged, never surfaced.
    pub async fn report_active_url(&self, url: &str) {
        let state = self.session.snapshot();
        if state.online != Some(true) || !state.report_active_url {
            return;
        }

        let payload = serde_json::json!({ ACTIVE_URL_KEY: url });
        if let Err(err) = self.ping(payload).await {
            debug!("Connector: active URL report failed: {err}");
        }
    }

    fn build_request(&self, descriptor: &CallDescriptor, data: Option<Value>) -> TransportRequest {
        let mut headers: Vec<(String, String)> = vec![
            (CONTENT_TYPE_HEADER.to_string(), JSON_CONTENT_TYPE.to_string()),
            (
                CLIENT_VERSION_HEADER.to_string(),
                self.config.client_version.clone(),
            ),
            (
                API_VERSION_HEADER.to_string(),
                CONNECTOR_API_VERSION.to_string(),
            ),
        ];

        // Caller headers win on name collision, last write taking effect
        for (name, value) in &descriptor.headers {
            if let Some(existing) = headers
                .iter_mut()
                .find(|(existing_name, _)| existing_name.eq_ignore_ascii_case(name))
            {
                existing.1 = value.clone();
            } else {
                headers.push((name.clone(), value.clone()));
            }
        }

        let query = descriptor
            .query_string
            .as_ref()
            .map(|query| format!("?{query}"))
            .unwrap_or_default();

        let url = format!(
            "{}/{}/{}{}",
            self.config.base(),
            CONNECTOR_PATH_PREFIX,
            descriptor.method,
            query
        );

        let method = if data.is_none() {
            HttpMethod::Get
        } else {
            HttpMethod::Post
        };

        let json_body = headers
            .iter()
            .any(|(name, value)| {
                name.eq_ignore_ascii_case(CONTENT_TYPE_HEADER) && value == JSON_CONTENT_TYPE
            });
        let body = data.map(|value| {
            if json_body {
                value.to_string()
            } else {
                match value {
                    Value::String(text) => text,
                    other => other.to_string(),
                }
            }
        });

        TransportRequest {
            method,
            url,
            headers,
            body,
        }
    }

    fn handle_response(
        &self,
        method: &str,
        response: TransportResponse,
    ) -> Result<RpcValue, CommunicationError> {
        let status = response.status;
        let host_version = response.header(HOST_VERSION_HEADER).map(str::to_string);

        // The connectivity flag update is part of the call's resolution,
        // whatever the outcome of body parsing below.
        self.tracker.record_status(status, host_version.as_deref());

        let value = parse_body(method, &response)?;

        if status.is_failure() {
            debug!("Connector: method {method} failed with status {status}");

            if status.is_version_mismatch() {
                let host_version =
                    host_version.unwrap_or_else(|| UNKNOWN_HOST_VERSION.to_string());
                self.tracker.report_version_mismatch(&host_version);
                return Err(CommunicationError::VersionMismatch {
                    method: method.to_string(),
                    client_version: self.config.client_version.clone(),
                    host_version,
                    payload: value,
                    location: ErrorLocation::from(Location::caller()),
                });
            }

            return Err(match status.0 {
                0 => CommunicationError::Unreachable {
                    method: method.to_string(),
                    location: ErrorLocation::from(Location::caller()),
                },
                403 => CommunicationError::Forbidden {
                    method: method.to_string(),
                    payload: value,
                    location: ErrorLocation::from(Location::caller()),
                },
                _ => CommunicationError::Host {
                    method: method.to_string(),
                    status,
                    payload: value,
                    location: ErrorLocation::from(Location::caller()),
                },
            });
        }

        debug!("Connector: method {method} succeeded");
        Ok(value)
    }
}

fn parse_body(method: &str, response: &TransportResponse) -> Result<RpcValue, CommunicationError> {
    if response.body.is_empty() {
        return Ok(RpcValue::Empty);
    }

    if response.content_type() == Some(JSON_CONTENT_TYPE) {
        let value = serde_json::from_str(&response.body).map_err(|err| {
            CommunicationError::MalformedResponse {
                method: method.to_string(),
                message: err.to_string(),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;
        Ok(RpcValue::Json(value))
    } else {
        Ok(RpcValue::Text(response.body.clone()))
    }
}
