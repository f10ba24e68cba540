//! The intercepted request/response pair handed over by the runtime.
//!
//! These types are plain snapshots. The pipeline only reads them.

use chrono::{DateTime, Utc};

use crate::encoding::decode_body;
use crate::error::{CaptureError, Result};

/// Ordered header list with case-insensitive lookup.
///
/// Keeps duplicates and original casing exactly as seen on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Returns the first value for `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of header lines.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderList
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Request side of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSnapshot {
    /// HTTP method, e.g. `POST`.
    pub method: String,
    /// Host without port.
    pub host: String,
    /// Path including the query string.
    pub path: String,
    /// Fully resolved URL.
    pub url: String,
    /// Request headers as sent.
    pub headers: HeaderList,
    /// Body bytes as sent (possibly content-encoded).
    pub body: Vec<u8>,
    /// On-wire body length.
    pub bytes: u64,
    /// When the request started, if known.
    pub started_at: Option<DateTime<Utc>>,
}

impl RequestSnapshot {
    /// Creates a request snapshot. `bytes` is taken from the body length.
    pub fn new(
        method: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        let host = host.into();
        let path = path.into();
        let body = body.into();
        Self {
            method: method.into(),
            url: format!("https://{host}{path}"),
            host,
            path,
            headers: HeaderList::new(),
            bytes: body.len() as u64,
            body,
            started_at: None,
        }
    }

    /// Sets the resolved URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Sets the start timestamp.
    pub fn started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Body bytes with any `Content-Encoding` removed.
    pub fn decoded_body(&self) -> Result<Vec<u8>> {
        decode_body(&self.body, self.headers.get("content-encoding")).map(|b| b.into_owned())
    }
}

/// Response side of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    /// HTTP status code.
    pub status: u16,
    /// Response headers as received.
    pub headers: HeaderList,
    /// Body bytes as received, or `None` if the runtime could not read them.
    pub body: Option<Vec<u8>>,
    /// On-wire body length.
    pub bytes: u64,
    /// When the response finished, if known.
    pub ended_at: Option<DateTime<Utc>>,
}

impl ResponseSnapshot {
    /// Creates a response snapshot with a readable body.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        let body = body.into();
        Self {
            status,
            headers: HeaderList::new(),
            bytes: body.len() as u64,
            body: Some(body),
            ended_at: None,
        }
    }

    /// Creates a response snapshot whose body could not be read.
    pub fn unreadable(status: u16) -> Self {
        Self {
            status,
            headers: HeaderList::new(),
            body: None,
            bytes: 0,
            ended_at: None,
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// Sets the end timestamp.
    pub fn ended_at(mut self, at: DateTime<Utc>) -> Self {
        self.ended_at = Some(at);
        self
    }

    /// The `Content-Type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }

    /// Decoded body text. Invalid UTF-8 is replaced rather than rejected.
    pub fn text(&self) -> Result<String> {
        let raw = self.body.as_deref().ok_or(CaptureError::ResponseUnavailable)?;
        let decoded = decode_body(raw, self.headers.get("content-encoding"))?;
        Ok(String::from_utf8_lossy(&decoded).into_owned())
    }
}

/// One intercepted request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// The outbound request.
    pub request: RequestSnapshot,
    /// The upstream response.
    pub response: ResponseSnapshot,
}

impl Transaction {
    /// Pairs a request with its response.
    pub fn new(request: RequestSnapshot, response: ResponseSnapshot) -> Self {
        Self { request, response }
    }
}
