//! Connectivity tracking derived from RPC outcomes and event-stream
//! signals.
//!
//! The tracker is the single writer of the session's online flag. Both
//! the RPC client and the stream task feed it; the UI observer is
//! notified only when the flag actually flips, so repeated failures
//! while already offline stay quiet.

use crate::session::SessionHandle;

use std::sync::Arc;

use common::HttpStatusCode;
use log::{info, warn};

/// UI-side collaborator interface. Both methods default to no-ops so an
/// embedder can implement only what it surfaces.
pub trait ConnectorObserver: Send + Sync {
    /// The online flag changed value. `host_version` is the host app's
    /// advertised version, present only on transitions to online where
    /// the host supplied it.
    fn on_state_change(&self, online: bool, host_version: Option<&str>) {
        let _ = (online, host_version);
    }

    /// The host app rejected our protocol version (HTTP 412). Called
    /// once per occurrence, never deduplicated.
    fn on_incompatible_version(&self, client_version: &str, host_version: &str) {
        let _ = (client_version, host_version);
    }
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl ConnectorObserver for NoopObserver {}

pub struct ConnectivityTracker {
    session: SessionHandle,
    observer: Arc<dyn ConnectorObserver>,
    client_version: String,
}

impl ConnectivityTracker {
    pub fn new(
        session: SessionHandle,
        observer: Arc<dyn ConnectorObserver>,
        client_version: String,
    ) -> Self {
        Self {
            session,
            observer,
            client_version,
        }
    }

    pub fn is_online(&self) -> Option<bool> {
        self.session.online()
    }

    /// Record a connectivity signal. Notifies the observer only when the
    /// flag flips.
    pub fn record(&self, online: bool, host_version: Option<&str>) {
        if self.session.set_online(online) {
            if online {
                info!("Host app is online");
            } else {
                info!("Host app went offline");
            }
            self.observer
                .on_state_change(online, if online { host_version } else { None });
        }
    }

    /// Derive the connectivity signal from an RPC response status.
    pub fn record_status(&self, status: HttpStatusCode, host_version: Option<&str>) {
        self.record(status.indicates_online(), host_version);
    }

    /// Report an incompatible host app version (HTTP 412).
    pub fn report_version_mismatch(&self, host_version: &str) {
        warn!(
            "Version mismatch: client {}, host {}",
            self.client_version, host_version
        );
        self.observer
            .on_incompatible_version(&self.client_version, host_version);
    }
}
