//! Transport Module
//!
//! The seam between `HttpClient` and the network, plus the reqwest-backed
//! implementation used by default.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Method, StatusCode, Url};

use crate::error::{HttpError, HttpResult};
use crate::http::{ClientSettings, ProtocolVersion};

/// Content type used when a body does not name one
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

// == Request Body ==
/// Text payload with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBody {
    pub content: String,
    pub content_type: String,
}

impl RequestBody {
    pub fn new(content: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: content_type.into(),
        }
    }

    pub fn json(content: impl Into<String>) -> Self {
        Self::new(content, DEFAULT_CONTENT_TYPE)
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new(content, "text/plain; charset=utf-8")
    }
}

impl From<String> for RequestBody {
    fn from(content: String) -> Self {
        Self::json(content)
    }
}

impl From<&str> for RequestBody {
    fn from(content: &str) -> Self {
        Self::json(content)
    }
}

// == Transport Request ==
/// Fully resolved request handed to a transport. Cloned once per attempt.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
}

// == Http Response ==
/// Response as returned by a transport, of any status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

// == Transport Trait ==
/// Sends one request and returns its response.
///
/// Non-2xx statuses are returned as `Ok` responses. An `Err` means no
/// usable response was received.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: TransportRequest) -> impl Future<Output = HttpResult<HttpResponse>> + Send;
}

// == Reqwest Transport ==
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a `reqwest::Client` honouring the handler and protocol settings.
    pub fn new(settings: &ClientSettings) -> HttpResult<Self> {
        let handler = settings.handler();
        let redirect = if handler.follow_redirects {
            Policy::limited(handler.max_redirects)
        } else {
            Policy::none()
        };

        let builder = reqwest::Client::builder()
            .redirect(redirect)
            .gzip(handler.decompression)
            .deflate(handler.decompression)
            .cookie_store(handler.cookies);

        let builder = match settings.protocol() {
            ProtocolVersion::Auto => builder,
            ProtocolVersion::Http1 => builder.http1_only(),
            ProtocolVersion::Http2 => builder.http2_prior_knowledge(),
        };

        let client = builder
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;

        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> HttpResult<HttpResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder
                .header(CONTENT_TYPE, body.content_type)
                .body(body.content);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> HttpError {
    if error.is_timeout() {
        return HttpError::Timeout;
    }
    match error.status() {
        Some(status) => HttpError::Transport {
            status: Some(status),
            message: error.without_url().to_string(),
        },
        None => HttpError::Network(error.without_url().to_string()),
    }
}
