//! HTTP status classification for the connector protocol.

/// HTTP status code as observed by the connector.
///
/// Status `0` is the transport-level sentinel for "host app never
/// responded", mirroring the convention of browser XHR objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpStatusCode(pub u16);

impl HttpStatusCode {
    /// Sentinel for a request that never reached the host app.
    pub const UNREACHABLE: HttpStatusCode = HttpStatusCode(0);

    /// The request never reached the host app.
    pub fn is_unreachable(&self) -> bool {
        self.0 == 0
    }

    /// [200, 400): the call itself succeeded.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.0)
    }

    /// The call failed: no response at all, or a 4xx/5xx response.
    pub fn is_failure(&self) -> bool {
        self.0 == 0 || self.0 >= 400
    }

    /// Whether this response counts as "host app online".
    ///
    /// 0 means the host never answered. 403 and 412 are answers the
    /// host uses to refuse this client outright, so they count as
    /// offline too. Every other code, including 5xx, proves something
    /// is listening and counts as online.
    pub fn indicates_online(&self) -> bool {
        !matches!(self.0, 0 | 403 | 412)
    }

    /// 412: the host app rejected the connector protocol version.
    pub fn is_version_mismatch(&self) -> bool {
        self.0 == 412
    }
}

impl From<u16> for HttpStatusCode {
    fn from(code: u16) -> Self {
        HttpStatusCode(code)
    }
}

impl std::fmt::Display for HttpStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
