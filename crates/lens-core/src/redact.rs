//! Allow-list header redaction.
//!
//! Only headers named in the tables below ever leave the process. Everything
//! else, credentials included, is dropped. New entries are added here by hand.

use std::collections::BTreeMap;

/// Request headers kept in a capture.
pub const REQUEST_HEADER_ALLOWLIST: &[&str] = &[
    "content-type",
    "content-encoding",
    "accept",
    "user-agent",
    "anthropic-version",
    "openai-beta",
    "x-request-id",
];

/// Response headers kept in a capture.
pub const RESPONSE_HEADER_ALLOWLIST: &[&str] = &[
    "content-type",
    "x-request-id",
    "x-ratelimit-limit-requests",
    "x-ratelimit-remaining-requests",
    "x-ratelimit-limit-tokens",
    "x-ratelimit-remaining-tokens",
    "openai-processing-ms",
    "anthropic-ratelimit-requests-limit",
    "anthropic-ratelimit-requests-remaining",
];

/// Redacted headers, keyed by lower-case name.
pub type RedactedHeaders = BTreeMap<String, String>;

/// Which side of the transaction a header map belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Outbound request headers.
    Request,
    /// Upstream response headers.
    Response,
}

impl Direction {
    /// The allow-list for this direction.
    pub fn allow_list(&self) -> &'static [&'static str] {
        match self {
            Direction::Request => REQUEST_HEADER_ALLOWLIST,
            Direction::Response => RESPONSE_HEADER_ALLOWLIST,
        }
    }
}

/// Checks whether a header may be captured in the given direction.
pub fn is_allowed(name: &str, direction: Direction) -> bool {
    direction
        .allow_list()
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(name))
}

/// Projects `headers` onto the allow-list for `direction`.
///
/// Names are compared case-insensitively and lower-cased in the output. If a
/// name repeats, the last value wins.
pub fn redact_headers<'a, I>(headers: I, direction: Direction) -> RedactedHeaders
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .filter(|(name, _)| is_allowed(name, direction))
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect()
}
