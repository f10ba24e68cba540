//! Lens Core - capture pipeline for intercepted LLM API traffic.
//!
//! Each completed HTTP transaction handed over by the interception runtime is
//! run through a short, linear pipeline:
//!
//! ```text
//! Transaction → Pattern Matcher ──no match / not POST──→ Rejected
//!                     │
//!                     ▼
//!        Format / Redaction / Streaming detection
//!                     │
//!                     ▼
//!              Capture Builder ──request not JSON──→ Rejected
//!                     │
//!                     ▼
//!                 Forwarder ──→ Sent | SendFailed (logged)
//! ```
//!
//! Nothing in the pipeline keeps state between transactions. Configuration is
//! resolved once at startup ([`CaptureConfig::from_env`]) and passed in
//! explicitly.
//!
//! Diagnostics are emitted through `tracing` under the [`LOG_TARGET`] target so
//! they can be filtered and grepped independently of the host's own logs.

pub mod capture;
pub mod config;
mod encoding;
pub mod error;
pub mod format;
pub mod forwarder;
pub mod patterns;
pub mod pipeline;
pub mod redact;
pub mod streaming;
pub mod transaction;

#[cfg(test)]
pub(crate) mod test_support;

pub use capture::{model_name, CaptureBuilder, CaptureRecord, Timings};
pub use config::CaptureConfig;
pub use error::{CaptureError, ForwardError, Result};
pub use format::ApiFormat;
pub use forwarder::Forwarder;
pub use patterns::{CapturePattern, CatchAllPattern, PatternMatch, PatternMatcher};
pub use pipeline::{CaptureOutcome, CapturePipeline, Rejection, TransactionHandler};
pub use redact::{redact_headers, Direction, RedactedHeaders};
pub use streaming::is_streaming;
pub use transaction::{HeaderList, RequestSnapshot, ResponseSnapshot, Transaction};

/// Tracing target for all capture diagnostics.
pub const LOG_TARGET: &str = "context_lens";
