//! Per-transaction entry point.
//!
//! The interception runtime calls [`TransactionHandler::handle`] once for each
//! completed transaction. Every call walks the same linear path and shares
//! nothing mutable with other calls:
//!
//! ```text
//! UNCLASSIFIED ─not POST / no match─→ REJECTED
//!      │
//!   MATCHED ─request not JSON─→ REJECTED
//!      │
//!    BUILT ─→ SENT | SEND_FAILED
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::capture::{CaptureBuilder, CaptureRecord};
use crate::config::CaptureConfig;
use crate::error::ForwardError;
use crate::forwarder::Forwarder;
use crate::patterns::{PatternMatch, PatternMatcher};
use crate::transaction::Transaction;
use crate::LOG_TARGET;

/// Why a transaction was not captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// Only POST requests are API calls.
    NotPost,
    /// Host and path matched no pattern.
    NoMatch,
    /// The request body could not be decoded as JSON.
    UnparseableRequest,
}

/// Terminal state of one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureOutcome {
    /// Skipped before a record was built.
    Rejected(Rejection),
    /// Record accepted by the ingest endpoint.
    Sent,
    /// Record built but delivery failed. Already logged.
    SendFailed,
}

impl CaptureOutcome {
    /// Returns true if a record was built, whether or not it was delivered.
    pub fn was_built(&self) -> bool {
        !matches!(self, CaptureOutcome::Rejected(_))
    }
}

/// Single-method handler invoked by the interception runtime.
#[async_trait]
pub trait TransactionHandler: Send + Sync {
    /// Processes one completed transaction. Never fails.
    async fn handle(&self, transaction: &Transaction) -> CaptureOutcome;
}

/// The capture pipeline: match, build, forward.
#[derive(Debug, Clone)]
pub struct CapturePipeline {
    config: Arc<CaptureConfig>,
    matcher: Arc<PatternMatcher>,
    builder: CaptureBuilder,
    forwarder: Forwarder,
}

impl CapturePipeline {
    /// Creates a pipeline with the built-in pattern tables.
    pub fn new(config: CaptureConfig) -> Result<Self, ForwardError> {
        Self::with_matcher(config, PatternMatcher::with_defaults())
    }

    /// Creates a pipeline with custom pattern tables.
    pub fn with_matcher(
        config: CaptureConfig,
        matcher: PatternMatcher,
    ) -> Result<Self, ForwardError> {
        let forwarder = Forwarder::new(&config)?;
        let builder = CaptureBuilder::new(&config);

        Ok(Self {
            config: Arc::new(config),
            matcher: Arc::new(matcher),
            builder,
            forwarder,
        })
    }

    /// The configuration this pipeline was built with.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Early classification by method, host and path.
    ///
    /// Runtimes use this to decide whether a request is worth buffering at all.
    pub fn classify(&self, method: &str, host: &str, path: &str) -> Result<PatternMatch, Rejection> {
        if method != "POST" {
            return Err(Rejection::NotPost);
        }
        self.matcher
            .match_request(host, path)
            .ok_or(Rejection::NoMatch)
    }

    /// Runs every step up to a built record, without any network I/O.
    pub fn prepare(&self, transaction: &Transaction) -> Result<CaptureRecord, Rejection> {
        let request = &transaction.request;
        let matched = self.classify(&request.method, &request.host, &request.path)?;

        tracing::info!(
            target: LOG_TARGET,
            "Matched {} {}{} as {}",
            request.method,
            request.host,
            request.path,
            matched.provider
        );

        self.builder.build(transaction, &matched).map_err(|e| {
            tracing::info!(target: LOG_TARGET, "Could not parse request body: {}", e);
            Rejection::UnparseableRequest
        })
    }
}

#[async_trait]
impl TransactionHandler for CapturePipeline {
    async fn handle(&self, transaction: &Transaction) -> CaptureOutcome {
        let record = match self.prepare(transaction) {
            Ok(record) => record,
            Err(rejection) => return CaptureOutcome::Rejected(rejection),
        };

        if self.forwarder.send(&record).await {
            CaptureOutcome::Sent
        } else {
            CaptureOutcome::SendFailed
        }
    }
}
