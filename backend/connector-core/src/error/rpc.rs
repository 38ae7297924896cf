//! Failure taxonomy for connector RPC calls.
//!
//! One closed enum replaces the loosely-typed `{message, status, value}`
//! error objects of the wire protocol. Callers pattern-match on the
//! variant; `status()` and `payload()` recover the raw fields where a
//! collaborator still wants them.

use crate::rpc::RpcValue;

use common::{ErrorLocation, HttpStatusCode};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CommunicationError {
    /// Status 0: the request never reached the host app.
    #[error("Method {method} failed: host app unreachable {location}")]
    Unreachable {
        method: String,
        location: ErrorLocation,
    },

    /// The connector already knew it was offline and refused to try the
    /// network at all. Only produced in probe-once mode.
    #[error("Host app offline; method {method} not attempted {location}")]
    Offline {
        method: String,
        location: ErrorLocation,
    },

    /// Status 403: the host app refused the request.
    #[error("Method {method} rejected by host app (403) {location}")]
    Forbidden {
        method: String,
        payload: RpcValue,
        location: ErrorLocation,
    },

    /// Status 412: the host app rejected our protocol version. Carries
    /// both advertised versions; reported to the observer, never retried.
    #[error(
        "Method {method} failed: version mismatch (client {client_version}, host {host_version}) {location}"
    )]
    VersionMismatch {
        method: String,
        client_version: String,
        host_version: String,
        payload: RpcValue,
        location: ErrorLocation,
    },

    /// Any other status >= 400. The host app did respond, so the
    /// connector still counts as online despite the failed call.
    #[error("Method {method} failed with status {status} {location}")]
    Host {
        method: String,
        status: HttpStatusCode,
        payload: RpcValue,
        location: ErrorLocation,
    },

    /// The response declared a JSON content type but the body did not parse.
    #[error("Malformed response for method {method}: {message} {location}")]
    MalformedResponse {
        method: String,
        message: String,
        location: ErrorLocation,
    },
}

impl CommunicationError {
    /// The RPC method this failure belongs to.
    pub fn method(&self) -> &str {
        match self {
            CommunicationError::Unreachable { method, .. }
            | CommunicationError::Offline { method, .. }
            | CommunicationError::Forbidden { method, .. }
            | CommunicationError::VersionMismatch { method, .. }
            | CommunicationError::Host { method, .. }
            | CommunicationError::MalformedResponse { method, .. } => method,
        }
    }

    /// HTTP status associated with this failure; 0 when no usable
    /// response was received.
    pub fn status(&self) -> HttpStatusCode {
        match self {
            CommunicationError::Unreachable { .. }
            | CommunicationError::Offline { .. }
            | CommunicationError::MalformedResponse { .. } => HttpStatusCode::UNREACHABLE,
            CommunicationError::Forbidden { .. } => HttpStatusCode(403),
            CommunicationError::VersionMismatch { .. } => HttpStatusCode(412),
            CommunicationError::Host { status, .. } => *status,
        }
    }

    /// Whatever body the host app sent alongside the failure, if any.
    pub fn payload(&self) -> Option<&RpcValue> {
        match self {
            CommunicationError::Forbidden { payload, .. }
            | CommunicationError::VersionMismatch { payload, .. }
            | CommunicationError::Host { payload, .. } => Some(payload),
            _ => None,
        }
    }
}
