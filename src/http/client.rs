//! HTTP Client Module
//!
//! `HttpClient` wraps a `Transport` with default headers, URL resolution,
//! bounded concurrency, retries, metrics, cancellation and disposal.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{HttpError, HttpResult};
use crate::http::{
    CancelSignals, ClientSettings, ConcurrencyGate, HttpResponse, RequestBody, RequestExecutor,
    RequestMetrics, ReqwestTransport, RetryPolicy, Transport, TransportRequest,
};

// == Http Client ==
/// Resilient HTTP client.
///
/// Every verb takes a caller `CancellationToken`; the client's own shutdown
/// token is observed as well. Calls fail with `HttpError::Disposed` once
/// `dispose` has run.
pub struct HttpClient<T = ReqwestTransport> {
    settings: ClientSettings,
    transport: RwLock<Option<Arc<T>>>,
    owns_transport: bool,
    executor: RequestExecutor,
    default_headers: RwLock<HeaderMap>,
    timeout: RwLock<Duration>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl HttpClient<ReqwestTransport> {
    // == Constructors ==
    /// Creates a client that builds and owns a reqwest transport.
    pub fn new(settings: ClientSettings) -> HttpResult<Self> {
        settings.validate()?;
        let transport = ReqwestTransport::new(&settings)?;
        Ok(Self::assemble(settings, Arc::new(transport), true))
    }

    /// Creates a client from `HTTP_*` environment variables.
    pub fn from_env() -> HttpResult<Self> {
        Self::new(ClientSettings::from_env()?)
    }
}

impl<T: Transport> HttpClient<T> {
    /// Creates a client over a transport shared with other owners.
    ///
    /// Disposing the client leaves the transport alone.
    pub fn with_transport(settings: ClientSettings, transport: Arc<T>) -> HttpResult<Self> {
        settings.validate()?;
        Ok(Self::assemble(settings, transport, false))
    }

    /// Creates a client that takes ownership of `transport`.
    ///
    /// Disposing the client releases the transport.
    pub fn with_owned_transport(settings: ClientSettings, transport: T) -> HttpResult<Self> {
        settings.validate()?;
        Ok(Self::assemble(settings, Arc::new(transport), true))
    }

    fn assemble(settings: ClientSettings, transport: Arc<T>, owns_transport: bool) -> Self {
        let executor = RequestExecutor::new(
            ConcurrencyGate::new(settings.max_concurrent_requests()),
            RetryPolicy::from_settings(&settings),
            RequestMetrics::new(settings.max_metrics_count()),
        );

        info!(
            "HTTP client initialized: timeout={:?}, retries={}, max_concurrent={}",
            settings.timeout(),
            settings.retry_count(),
            settings.max_concurrent_requests()
        );

        Self {
            timeout: RwLock::new(settings.timeout()),
            settings,
            transport: RwLock::new(Some(transport)),
            owns_transport,
            executor,
            default_headers: RwLock::new(HeaderMap::new()),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        }
    }

    // == Verbs ==
    /// GET, returning the body of a 2xx response.
    pub async fn get(&self, url: &str, cancel: &CancellationToken) -> HttpResult<String> {
        let response = self.send(Method::GET, url, None, cancel).await?;
        Ok(response.body)
    }

    /// GET, deserializing a 2xx JSON body into `D`.
    pub async fn get_json<D>(&self, url: &str, cancel: &CancellationToken) -> HttpResult<D>
    where
        D: DeserializeOwned,
    {
        let body = self.get(url, cancel).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn post(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        cancel: &CancellationToken,
    ) -> HttpResult<String> {
        let response = self.send(Method::POST, url, Some(body.into()), cancel).await?;
        Ok(response.body)
    }

    pub async fn put(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        cancel: &CancellationToken,
    ) -> HttpResult<String> {
        let response = self.send(Method::PUT, url, Some(body.into()), cancel).await?;
        Ok(response.body)
    }

    pub async fn patch(
        &self,
        url: &str,
        body: impl Into<RequestBody>,
        cancel: &CancellationToken,
    ) -> HttpResult<String> {
        let response = self.send(Method::PATCH, url, Some(body.into()), cancel).await?;
        Ok(response.body)
    }

    pub async fn delete(&self, url: &str, cancel: &CancellationToken) -> HttpResult<String> {
        let response = self.send(Method::DELETE, url, None, cancel).await?;
        Ok(response.body)
    }

    /// HEAD, returning status and headers of a 2xx response.
    pub async fn head(&self, url: &str, cancel: &CancellationToken) -> HttpResult<HttpResponse> {
        let mut response = self.send(Method::HEAD, url, None, cancel).await?;
        response.body.clear();
        Ok(response)
    }

    // == Send ==
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<RequestBody>,
        cancel: &CancellationToken,
    ) -> HttpResult<HttpResponse> {
        self.ensure_live()?;
        let url = self.resolve_url(url)?;
        let transport = self.transport.read().clone().ok_or(HttpError::Disposed)?;

        debug!(method = %method, url = %url, "Sending request");

        let request = TransportRequest {
            method,
            url,
            headers: self.default_headers.read().clone(),
            body,
            timeout: *self.timeout.read(),
        };

        let signals = CancelSignals::new(&self.shutdown, cancel);
        self.executor
            .execute(signals, || {
                let transport = Arc::clone(&transport);
                let request = request.clone();
                async move {
                    let response = transport.send(request).await?;
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err(HttpError::Status {
                            status: response.status,
                            body: response.body,
                        })
                    }
                }
            })
            .await
    }

    /// Resolves `url` against the base address, if any.
    ///
    /// Only http and https URLs are accepted.
    pub fn resolve_url(&self, url: &str) -> HttpResult<Url> {
        let resolved = match self.settings.base_address() {
            Some(base) => base.join(url),
            None => Url::parse(url),
        }
        .map_err(|e| HttpError::InvalidUrl(format!("{url}: {e}")))?;

        match resolved.scheme() {
            "http" | "https" => Ok(resolved),
            scheme => Err(HttpError::InvalidUrl(format!(
                "{url}: unsupported scheme {scheme}"
            ))),
        }
    }

    // == Default Headers ==
    /// Adds a header sent with every request. Repeated names accumulate.
    pub fn add_default_header(&self, name: &str, value: &str) -> HttpResult<()> {
        self.ensure_live()?;
        let name = parse_header_name(name)?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| HttpError::InvalidHeader(format!("invalid value for {name}")))?;

        self.default_headers.write().append(name, value);
        Ok(())
    }

    /// Removes every value of a default header. Returns false if none was set.
    pub fn remove_default_header(&self, name: &str) -> HttpResult<bool> {
        self.ensure_live()?;
        let name = parse_header_name(name)?;
        Ok(self.default_headers.write().remove(name).is_some())
    }

    pub fn default_headers(&self) -> HeaderMap {
        self.default_headers.read().clone()
    }

    // == Timeout ==
    /// Changes the per-request timeout for subsequent requests.
    pub fn set_timeout(&self, timeout: Duration) -> HttpResult<()> {
        self.ensure_live()?;
        if timeout.is_zero() {
            return Err(HttpError::InvalidTimeout);
        }
        *self.timeout.write() = timeout;
        Ok(())
    }

    // == Pending Requests ==
    /// Waits until no request holds a gate slot.
    pub async fn wait_for_pending_requests(&self, cancel: &CancellationToken) -> HttpResult<()> {
        self.ensure_live()?;
        self.executor.gate().wait_idle(cancel).await
    }

    /// Transport currently in use; `None` once an owned transport is released.
    pub fn transport(&self) -> Option<Arc<T>> {
        self.transport.read().clone()
    }
}

impl<T> HttpClient<T> {
    fn ensure_live(&self) -> HttpResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(HttpError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Cancels in-flight and future requests. Safe to call at any time.
    pub fn cancel_pending_requests(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Cancelling pending HTTP requests");
        }
        self.shutdown.cancel();
    }

    // == Dispose ==
    /// Cancels pending work, closes the gate and releases an owned transport.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.shutdown.cancel();
        self.executor.gate().close();
        if self.owns_transport {
            self.transport.write().take();
        }

        info!(
            "HTTP client disposed after {} requests ({} failed)",
            self.executor.metrics().total(),
            self.executor.metrics().failed()
        );
    }

    // == Diagnostics ==
    /// True while the client is neither disposed nor cancelled.
    pub fn is_ready(&self) -> bool {
        !self.disposed.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Settings the client was built with. Later `set_timeout` calls are
    /// reported by `timeout()`, not here.
    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn timeout(&self) -> Duration {
        *self.timeout.read()
    }

    pub fn base_address(&self) -> Option<&Url> {
        self.settings.base_address()
    }

    pub fn average_response_time(&self) -> Duration {
        self.executor.metrics().average()
    }

    pub fn total_request_count(&self) -> u64 {
        self.executor.metrics().total()
    }

    pub fn failed_request_count(&self) -> u64 {
        self.executor.metrics().failed()
    }

    pub fn in_flight_requests(&self) -> usize {
        self.executor.gate().in_flight()
    }
}

impl<T> Drop for HttpClient<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> fmt::Debug for HttpClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_address", &self.settings.base_address().map(Url::as_str))
            .field("timeout", &self.timeout())
            .field("owns_transport", &self.owns_transport)
            .field("in_flight", &self.in_flight_requests())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn parse_header_name(name: &str) -> HttpResult<HeaderName> {
    if name.trim().is_empty() {
        return Err(HttpError::InvalidHeader("header name is empty".to_string()));
    }
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| HttpError::InvalidHeader(format!("invalid header name {name:?}")))
}
