//! `Content-Encoding` handling for captured bodies.
//!
//! gzip, deflate, br and zstd are decoded. Codex sends zstd request bodies.
//! Anything else passes through untouched, which for requests usually ends in
//! a JSON parse failure and a skipped capture.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{CaptureError, Result};

/// Removes the given content encoding from `body`.
pub(crate) fn decode_body<'a>(body: &'a [u8], encoding: Option<&str>) -> Result<Cow<'a, [u8]>> {
    let Some(encoding) = encoding.map(str::trim).filter(|e| !e.is_empty()) else {
        return Ok(Cow::Borrowed(body));
    };

    let mut out = Vec::new();
    let decoded = match encoding.to_ascii_lowercase().as_str() {
        "gzip" | "x-gzip" => GzDecoder::new(body).read_to_end(&mut out),
        "deflate" => ZlibDecoder::new(body).read_to_end(&mut out),
        "br" => brotli_decompressor::Decompressor::new(body, 4096).read_to_end(&mut out),
        "zstd" => {
            zstd::stream::read::Decoder::new(body).and_then(|mut d| d.read_to_end(&mut out))
        }
        _ => return Ok(Cow::Borrowed(body)),
    };

    decoded.map_err(|source| CaptureError::Decode {
        encoding: encoding.to_string(),
        source,
    })?;
    Ok(Cow::Owned(out))
}
