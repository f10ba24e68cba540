//! Capture record assembly.
//!
//! Turns a matched [`Transaction`] into the normalized [`CaptureRecord`] sent
//! to the ingest endpoint. The request body must be JSON. The response body is
//! kept as raw text so the exact wire content reaches the analysis side.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::format::ApiFormat;
use crate::patterns::PatternMatch;
use crate::redact::{redact_headers, Direction, RedactedHeaders};
use crate::streaming::is_streaming;
use crate::transaction::Transaction;
use crate::LOG_TARGET;

/// Model name used when the request does not name one.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Phase timings in whole milliseconds.
///
/// Only `total_ms` is measured; the per-phase fields are kept for the ingest
/// schema and are always zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub send_ms: u64,
    pub wait_ms: u64,
    pub receive_ms: u64,
    pub total_ms: u64,
}

impl Timings {
    /// Timings with only the total set.
    pub fn total(total_ms: u64) -> Self {
        Self {
            total_ms,
            ..Self::default()
        }
    }
}

/// Normalized, redacted representation of one LLM API call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRecord {
    /// Capture time, RFC 3339 UTC with millisecond precision.
    pub timestamp: String,
    pub method: String,
    pub path: String,
    pub source: Option<String>,
    pub provider: String,
    pub api_format: ApiFormat,
    pub target_url: String,
    pub request_headers: RedactedHeaders,
    pub request_body: Value,
    pub request_bytes: u64,
    pub response_status: u16,
    pub response_headers: RedactedHeaders,
    pub response_body: String,
    pub response_is_streaming: bool,
    pub response_bytes: u64,
    pub session_id: Option<String>,
    pub timings: Timings,
}

impl CaptureRecord {
    /// Best-effort model name from the request body.
    pub fn model(&self) -> &str {
        model_name(&self.request_body)
    }
}

/// Reads the `model` field of a request body, defaulting to `"unknown"`.
pub fn model_name(body: &Value) -> &str {
    body.get("model")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_MODEL)
}

/// Formats a capture timestamp.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds between request start and response end.
///
/// Zero when either end is unknown or the clock went backwards.
pub fn total_ms(started_at: Option<DateTime<Utc>>, ended_at: Option<DateTime<Utc>>) -> u64 {
    match (started_at, ended_at) {
        (Some(start), Some(end)) => u64::try_from((end - start).num_milliseconds()).unwrap_or(0),
        _ => 0,
    }
}

/// Builds capture records for one process configuration.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuilder {
    session_id: Option<String>,
}

impl CaptureBuilder {
    /// Creates a builder bound to the given configuration.
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            session_id: config.session_id.clone(),
        }
    }

    /// Builds a record stamped with the current time.
    pub fn build(
        &self,
        transaction: &Transaction,
        matched: &PatternMatch,
    ) -> Result<CaptureRecord> {
        self.build_at(transaction, matched, Utc::now())
    }

    /// Builds a record stamped with `now`.
    ///
    /// Fails only when the request body cannot be decoded or is not JSON. An
    /// unreadable response body is captured as empty text.
    pub fn build_at(
        &self,
        transaction: &Transaction,
        matched: &PatternMatch,
        now: DateTime<Utc>,
    ) -> Result<CaptureRecord> {
        let request = &transaction.request;
        let response = &transaction.response;

        let request_body: Value =
            serde_json::from_slice(&request.decoded_body()?).map_err(CaptureError::RequestBody)?;

        let response_body = match response.text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, "Could not read response body: {}", e);
                String::new()
            }
        };
        let response_is_streaming = is_streaming(response.content_type(), &response_body);

        Ok(CaptureRecord {
            timestamp: format_timestamp(now),
            method: request.method.clone(),
            path: request.path.clone(),
            source: matched.source.clone(),
            provider: matched.provider.clone(),
            api_format: ApiFormat::from_path(&request.path),
            target_url: request.url.clone(),
            request_headers: redact_headers(request.headers.iter(), Direction::Request),
            request_body,
            request_bytes: request.bytes,
            response_status: response.status,
            response_headers: redact_headers(response.headers.iter(), Direction::Response),
            response_body,
            response_is_streaming,
            response_bytes: response.bytes,
            session_id: self.session_id.clone(),
            timings: Timings::total(total_ms(request.started_at, response.ended_at)),
        })
    }
}
