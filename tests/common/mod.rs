//! Shared helpers for integration tests.
//!
//! - `ScriptedTransport`: in-memory transport replaying canned outcomes
//! - `spawn_backend`: a local axum server for exercising the reqwest transport

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use resilient_net::http::{HttpResponse, Transport, TransportRequest};
use resilient_net::{HttpError, HttpResult};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

// == Tracing ==
static TRACING: Once = Once::new();

/// Installs a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

// == Scripted Transport ==
/// One canned transport outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    Status(u16, &'static str),
    Fail(&'static str),
    Timeout,
}

/// Replays scripted outcomes in order, then the fallback forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<TransportRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>, fallback: Scripted) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers 200 with `body`.
    pub fn ok(body: &'static str) -> Self {
        Self::new(Vec::new(), Scripted::Status(200, body))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: TransportRequest) -> HttpResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        self.requests.lock().push(request);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match next {
            Scripted::Status(code, body) => Ok(HttpResponse {
                status: reqwest::StatusCode::from_u16(code).expect("valid status"),
                headers: reqwest::header::HeaderMap::new(),
                body: body.to_string(),
            }),
            Scripted::Fail(message) => Err(HttpError::Transport {
                message: message.to_string(),
                status: None,
            }),
            Scripted::Timeout => Err(HttpError::Timeout),
        }
    }
}

// == Mock Backend ==
#[derive(Clone, Default)]
struct BackendState {
    flaky_hits: Arc<AtomicUsize>,
}

async fn status_handler(Path(code): Path<u16>) -> (StatusCode, String) {
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {code}"))
}

async fn json_handler() -> Json<Value> {
    Json(json!({ "name": "widget", "count": 3 }))
}

async fn echo_handler(headers: HeaderMap, body: String) -> String {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("none");
    format!("{content_type}|{body}")
}

async fn header_handler(headers: HeaderMap) -> String {
    headers
        .get("x-trace")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("missing")
        .to_string()
}

async fn flaky_handler(State(state): State<BackendState>) -> (StatusCode, &'static str) {
    if state.flaky_hits.fetch_add(1, Ordering::SeqCst) < 2 {
        (StatusCode::SERVICE_UNAVAILABLE, "try again")
    } else {
        (StatusCode::OK, "recovered")
    }
}

async fn slow_handler() -> &'static str {
    tokio::time::sleep(Duration::from_secs(5)).await;
    "late"
}

/// Starts the mock backend on an ephemeral port and returns its address.
pub async fn spawn_backend() -> SocketAddr {
    let app = Router::new()
        .route("/status/:code", get(status_handler))
        .route("/json", get(json_handler))
        .route("/echo", post(echo_handler).put(echo_handler).patch(echo_handler))
        .route("/headers", get(header_handler))
        .route("/flaky", get(flaky_handler))
        .route("/redirect", get(|| async { Redirect::temporary("/json") }))
        .route("/slow", get(slow_handler))
        .route("/resource", axum::routing::delete(|| async { "deleted" }))
        .with_state(BackendState::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind backend");
    let addr = listener.local_addr().expect("backend address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("backend server");
    });

    addr
}
