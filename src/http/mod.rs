//! HTTP Module
//!
//! Resilient HTTP client: retry with exponential backoff, a concurrency
//! gate, request metrics, cancellation and disposal over a pluggable
//! transport.

mod client;
mod executor;
mod gate;
mod metrics;
mod retry;
mod settings;
mod transport;

// Re-export public types
pub use client::HttpClient;
pub use executor::{CancelSignals, RequestExecutor};
pub use gate::{ConcurrencyGate, GatePermit, MAX_GATE_CAPACITY};
pub use metrics::RequestMetrics;
pub use retry::{RetryPolicy, MAX_BACKOFF};
pub use settings::{
    ClientSettings, HandlerOptions, ProtocolVersion, DEFAULT_RETRYABLE_STATUS_CODES,
    DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT,
};
pub use transport::{
    HttpResponse, RequestBody, ReqwestTransport, Transport, TransportRequest, DEFAULT_CONTENT_TYPE,
};
