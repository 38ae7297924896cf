//! Single-request HTTP transport.
//!
//! The transport owns no protocol state: it takes one fully-built
//! request and returns whatever came back. Connection-level failures are
//! folded into a response with status 0 so the RPC layer sees the same
//! shape either way, like an XHR object would.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use common::HttpStatusCode;
use log::debug;
use reqwest::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: HttpStatusCode,
    /// Response headers, keys lowercased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl TransportResponse {
    /// Response representing "the host app never answered".
    pub fn unreachable() -> Self {
        Self {
            status: HttpStatusCode::UNREACHABLE,
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Media type of the body, with any parameters stripped.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
            .map(|value| value.split(';').next().unwrap_or(value).trim())
    }
}

/// Issues a single HTTP request. Implemented by [`HttpTransport`] in
/// production and by in-memory fakes in tests.
pub trait Transport: Send + Sync {
    fn send(&self, request: TransportRequest) -> impl Future<Output = TransportResponse> + Send;
}

/// Production transport backed by a shared reqwest client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self { client }
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> TransportResponse {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        match builder.send().await {
            Ok(response) => {
                let status = HttpStatusCode(response.status().as_u16());

                let mut headers = HashMap::new();
                for (name, value) in response.headers() {
                    if let Ok(value) = value.to_str() {
                        headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
                    }
                }

                let body = response.text().await.unwrap_or_default();

                TransportResponse {
                    status,
                    headers,
                    body,
                }
            }
            Err(err) => {
                debug!("Transport: request to {} failed: {err}", request.url);
                TransportResponse::unreachable()
            }
        }
    }
}
