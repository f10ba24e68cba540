//! Error types for the capture pipeline.

use std::time::Duration;

use thiserror::Error;

/// Reasons a transaction cannot be turned into a capture record.
///
/// None of these are surfaced to the host runtime; they end in a skipped
/// capture and a diagnostic log line at most.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The request body did not parse as JSON.
    #[error("request body is not valid JSON: {0}")]
    RequestBody(#[source] serde_json::Error),

    /// A body could not be decoded according to its `Content-Encoding`.
    #[error("failed to decode {encoding} body: {source}")]
    Decode {
        /// The content encoding that failed.
        encoding: String,
        /// Underlying decoder error.
        #[source]
        source: std::io::Error,
    },

    /// The runtime could not read the response body.
    #[error("response body unavailable")]
    ResponseUnavailable,
}

/// Failures delivering a capture record to the ingest endpoint.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// Failed to encode the record.
    #[error("failed to serialize capture: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The ingest endpoint did not answer within the configured bound.
    #[error("ingest request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or transport failure.
    #[error("ingest request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The ingest endpoint answered with a non-2xx status.
    #[error("ingest endpoint returned HTTP {0}")]
    Status(u16),
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
