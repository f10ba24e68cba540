//! Delivery of capture records to the ingest endpoint.
//!
//! One POST per record, bounded by the configured timeout. No retries, no
//! queue: a record that fails to send is logged and dropped.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use crate::capture::CaptureRecord;
use crate::config::CaptureConfig;
use crate::error::ForwardError;
use crate::LOG_TARGET;

/// Best-effort HTTP forwarder.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    ingest_url: String,
    timeout: Duration,
}

impl Forwarder {
    /// Creates a forwarder for the configured ingest URL and timeout.
    pub fn new(config: &CaptureConfig) -> Result<Self, ForwardError> {
        let client = Client::builder().timeout(config.forward_timeout).build()?;

        Ok(Self {
            client,
            ingest_url: config.ingest_url.clone(),
            timeout: config.forward_timeout,
        })
    }

    /// Sends one record and reports the failure, if any.
    ///
    /// Only the response status is consulted; the body is never read.
    pub async fn try_send(&self, record: &CaptureRecord) -> Result<(), ForwardError> {
        let payload = serde_json::to_vec(record)?;

        let response = self
            .client
            .post(&self.ingest_url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ForwardError::Timeout(self.timeout)
                } else {
                    ForwardError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status.as_u16()));
        }
        Ok(())
    }

    /// Sends one record, logging the outcome and swallowing any failure.
    ///
    /// Returns whether the ingest endpoint accepted the record.
    pub async fn send(&self, record: &CaptureRecord) -> bool {
        match self.try_send(record).await {
            Ok(()) => {
                tracing::info!(
                    target: LOG_TARGET,
                    "Captured {}/{} request (model={})",
                    record.source.as_deref().unwrap_or("-"),
                    record.provider,
                    record.model()
                );
                true
            }
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, "Failed to ingest: {}", e);
                false
            }
        }
    }
}
