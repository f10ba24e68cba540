//! Recognition of LLM API calls by host and path.
//!
//! Two ordered tables drive the decision:
//!
//! - **Capture patterns**: host-substring plus path-substring, specific rules
//!   first. The first rule that matches wins.
//! - **Catch-all patterns**: path-substring only, for OpenAI-compatible
//!   gateways on arbitrary hosts. The source label is taken from the host's
//!   leading label.
//!
//! A transaction that matches neither table is not an LLM API call.

// =============================================================================
// Pattern Types
// =============================================================================

/// A host-and-path rule identifying a known provider endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePattern {
    /// Substring the host must contain.
    pub host: String,
    /// Substring the path must contain.
    pub path: String,
    /// Provider label, e.g. `openai`.
    pub provider: String,
    /// Fixed source label. `None` leaves tool detection to the ingest side.
    pub source: Option<String>,
}

impl CapturePattern {
    /// Creates a rule without a fixed source.
    pub fn new(
        host: impl Into<String>,
        path: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
            provider: provider.into(),
            source: None,
        }
    }

    /// Sets the source label.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Checks whether this rule applies to `host` and `path`.
    pub fn matches(&self, host: &str, path: &str) -> bool {
        host.contains(&self.host) && path.contains(&self.path)
    }
}

/// A host-agnostic fallback rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatchAllPattern {
    /// Substring the path must contain.
    pub path: String,
    /// Provider label.
    pub provider: String,
}

impl CatchAllPattern {
    /// Creates a catch-all rule.
    pub fn new(path: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            provider: provider.into(),
        }
    }

    /// Checks whether this rule applies to `path`.
    pub fn matches(&self, path: &str) -> bool {
        path.contains(&self.path)
    }
}

/// Outcome of a successful match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Provider label.
    pub provider: String,
    /// Source label, if one applies.
    pub source: Option<String>,
}

// =============================================================================
// Default Tables
// =============================================================================

/// Returns the built-in capture rules, most specific first.
pub fn default_patterns() -> Vec<CapturePattern> {
    vec![
        // Codex subscription traffic has a fixed tool identity
        CapturePattern::new("chatgpt.com", "/backend-api/codex/responses", "chatgpt")
            .with_source("codex"),
        CapturePattern::new("api.openai.com", "/v1/responses", "openai"),
        CapturePattern::new("api.openai.com", "/v1/chat/completions", "openai"),
        CapturePattern::new("api.anthropic.com", "/v1/messages", "anthropic"),
        CapturePattern::new("generativelanguage.googleapis.com", "/v1", "gemini"),
    ]
}

/// Returns the built-in catch-all rules.
pub fn default_catch_all() -> Vec<CatchAllPattern> {
    vec![
        CatchAllPattern::new("/v1/chat/completions", "openai"),
        CatchAllPattern::new("/v1/messages", "anthropic"),
        CatchAllPattern::new("/v1/responses", "openai"),
    ]
}

/// Derives a source label from the host's first dot-delimited label.
///
/// `my-gateway.example.com` gives `my-gateway`; a host without dots is
/// returned unchanged.
pub fn source_from_host(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

// =============================================================================
// Matcher
// =============================================================================

/// Ordered, first-match-wins pattern matcher.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    patterns: Vec<CapturePattern>,
    catch_all: Vec<CatchAllPattern>,
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternMatcher {
    /// Creates a matcher from explicit tables. Order is significant.
    pub fn new(patterns: Vec<CapturePattern>, catch_all: Vec<CatchAllPattern>) -> Self {
        Self {
            patterns,
            catch_all,
        }
    }

    /// Creates a matcher with the built-in tables.
    pub fn with_defaults() -> Self {
        Self::new(default_patterns(), default_catch_all())
    }

    /// Classifies a request by host and path.
    ///
    /// # Examples
    ///
    /// ```
    /// use lens_core::PatternMatcher;
    ///
    /// let matcher = PatternMatcher::with_defaults();
    /// let hit = matcher.match_request("chatgpt.com", "/backend-api/codex/responses").unwrap();
    /// assert_eq!(hit.provider, "chatgpt");
    /// assert_eq!(hit.source.as_deref(), Some("codex"));
    ///
    /// assert!(matcher.match_request("example.com", "/index.html").is_none());
    /// ```
    pub fn match_request(&self, host: &str, path: &str) -> Option<PatternMatch> {
        if let Some(rule) = self.patterns.iter().find(|p| p.matches(host, path)) {
            return Some(PatternMatch {
                provider: rule.provider.clone(),
                source: rule.source.clone(),
            });
        }

        self.catch_all
            .iter()
            .find(|p| p.matches(path))
            .map(|rule| PatternMatch {
                provider: rule.provider.clone(),
                source: Some(source_from_host(host).to_string()),
            })
    }
}
