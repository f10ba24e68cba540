//! Shared fixtures for unit tests.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;

use crate::capture::{CaptureBuilder, CaptureRecord};
use crate::config::CaptureConfig;
use crate::patterns::PatternMatch;
use crate::transaction::{RequestSnapshot, ResponseSnapshot, Transaction};

/// Timestamp `ms` milliseconds after the Unix epoch.
pub(crate) fn at_ms(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap()
}

/// A POST transaction with a JSON response.
pub(crate) fn sample_transaction(host: &str, path: &str, body: &str) -> Transaction {
    Transaction::new(
        RequestSnapshot::new("POST", host, path, body.as_bytes().to_vec())
            .with_header("Content-Type", "application/json"),
        ResponseSnapshot::new(200, r#"{"id":"resp_1"}"#.as_bytes().to_vec())
            .with_header("Content-Type", "application/json"),
    )
}

/// A fully built record.
pub(crate) fn sample_record() -> CaptureRecord {
    let tx = sample_transaction("api.openai.com", "/v1/responses", r#"{"model":"gpt-5"}"#);
    CaptureBuilder::new(&CaptureConfig::default().with_session_id("test"))
        .build(
            &tx,
            &PatternMatch {
                provider: "openai".into(),
                source: None,
            },
        )
        .unwrap()
}

/// In-memory log sink for asserting on emitted diagnostics.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its result plus the
/// formatted log output.
pub(crate) fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock()).into_owned();
    (result, logs)
}

/// A URL on a port nothing listens on.
pub(crate) fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/ingest")
}

#[derive(Clone)]
struct StubState {
    received: Arc<Mutex<Vec<Value>>>,
    status: StatusCode,
    delay: Duration,
}

/// In-process ingest endpoint recording every JSON body it receives.
pub(crate) struct IngestStub {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl IngestStub {
    /// Starts a stub answering every POST with `status`.
    pub async fn start(status: StatusCode) -> Self {
        Self::start_with_delay(status, Duration::ZERO).await
    }

    /// Starts a stub that waits `delay` before answering.
    pub async fn start_with_delay(status: StatusCode, delay: Duration) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = StubState {
            received: Arc::clone(&received),
            status,
            delay,
        };

        let app = Router::new()
            .route("/api/ingest", post(ingest))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{addr}/api/ingest"),
            received,
        }
    }

    /// Bodies received so far.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().clone()
    }
}

// Json extraction rejects requests without an application/json content type.
async fn ingest(State(state): State<StubState>, Json(body): Json<Value>) -> StatusCode {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.received.lock().push(body);
    state.status
}
