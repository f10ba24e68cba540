//! Event-stream response detection.
//!
//! Streaming bodies are kept verbatim. Splitting them into events happens on
//! the ingest side.

/// Content-type marker for server-sent events.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// First bytes of an event-stream body.
pub const EVENT_STREAM_SENTINEL: &str = "event:";

/// Returns true if the response is an event stream.
///
/// Either signal is enough: a content type containing
/// [`EVENT_STREAM_CONTENT_TYPE`], or a body starting with
/// [`EVENT_STREAM_SENTINEL`].
pub fn is_streaming(content_type: Option<&str>, body: &str) -> bool {
    let by_header = content_type
        .map(|ct| ct.to_ascii_lowercase().contains(EVENT_STREAM_CONTENT_TYPE))
        .unwrap_or(false);

    by_header || body.starts_with(EVENT_STREAM_SENTINEL)
}
