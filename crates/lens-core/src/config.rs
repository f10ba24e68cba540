//! Process-wide capture configuration.
//!
//! Resolved once at startup and then shared read-only by every transaction.

use std::time::Duration;

/// Default ingest endpoint of the local analysis service.
pub const DEFAULT_INGEST_URL: &str = "http://localhost:4041/api/ingest";

/// Environment variable overriding the ingest URL.
pub const INGEST_URL_ENV: &str = "CONTEXT_LENS_INGEST_URL";

/// Environment variable carrying the session id used for grouping.
pub const SESSION_ID_ENV: &str = "CONTEXT_LENS_SESSION_ID";

/// Upper bound on a single forward call.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(5);

/// Immutable capture configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Where capture records are POSTed.
    pub ingest_url: String,
    /// Opaque session id copied into every record. `None` disables grouping.
    pub session_id: Option<String>,
    /// Timeout for one forward call.
    pub forward_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            ingest_url: DEFAULT_INGEST_URL.to_string(),
            session_id: None,
            forward_timeout: DEFAULT_FORWARD_TIMEOUT,
        }
    }
}

impl CaptureConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(INGEST_URL_ENV).filter(|v| !v.trim().is_empty()) {
            config.ingest_url = url.trim().to_string();
        }
        if let Some(session_id) = lookup(SESSION_ID_ENV) {
            config = config.with_session_id(session_id);
        }

        config
    }

    /// Sets the ingest URL.
    pub fn with_ingest_url(mut self, url: impl Into<String>) -> Self {
        self.ingest_url = url.into();
        self
    }

    /// Sets the session id. Surrounding whitespace is trimmed and an empty
    /// value clears it.
    pub fn with_session_id(mut self, session_id: impl AsRef<str>) -> Self {
        let trimmed = session_id.as_ref().trim();
        self.session_id = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Sets the forward timeout.
    pub fn with_forward_timeout(mut self, timeout: Duration) -> Self {
        self.forward_timeout = timeout;
        self
    }
}
