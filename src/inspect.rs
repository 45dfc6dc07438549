//! Heuristics applied to captured messages before they are rendered.

use axum::http::{header, HeaderMap, Method, StatusCode};
use std::error::Error;

/// Number of leading bytes sampled by [`is_plaintext`].
const SAMPLE_BYTES: usize = 64;
/// Number of code points inspected by [`is_plaintext`].
const SAMPLE_CODE_POINTS: usize = 16;

/// Returns true if the buffer probably contains human readable text.
///
/// Uses a small sample of code points to detect control characters commonly used in binary file
/// signatures. A multi-byte sequence that is truncated or invalid inside the sample marks the
/// buffer as binary.
///
/// ```rust
/// use wiretap::inspect::is_plaintext;
///
/// assert!(is_plaintext(b"{\"ok\":true}\n"));
/// assert!(!is_plaintext(b"\x89PNG\r\n\x1a\n"));
/// ```
pub fn is_plaintext(buffer: &[u8]) -> bool {
    let prefix = &buffer[..buffer.len().min(SAMPLE_BYTES)];
    let text = match std::str::from_utf8(prefix) {
        Ok(text) => text,
        Err(e) => {
            let valid = std::str::from_utf8(&prefix[..e.valid_up_to()]).unwrap_or_default();
            // Only matters if the bad sequence falls inside the inspected code points.
            if valid.chars().count() < SAMPLE_CODE_POINTS {
                return false;
            }
            valid
        }
    };

    text.chars()
        .take(SAMPLE_CODE_POINTS)
        .all(|c| !c.is_control() || is_control_whitespace(c))
}

/// Control characters that still count as whitespace: tab, line feed, vertical tab, form feed,
/// carriage return and the four information separators.
fn is_control_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\u{0B}' | '\u{0C}' | '\r' | '\u{1C}'..='\u{1F}')
}

/// Returns true if the headers declare a `Content-Encoding` other than `identity`.
///
/// ```rust
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use wiretap::inspect::is_encoded;
///
/// let mut headers = HeaderMap::new();
/// assert!(!is_encoded(&headers));
/// headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("gzip"));
/// assert!(is_encoded(&headers));
/// ```
pub fn is_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_ENCODING)
        .is_some_and(|value| !value.as_bytes().eq_ignore_ascii_case(b"identity"))
}

/// Character sets the logger knows how to render.
///
/// Anything other than ISO-8859-1 is rendered as UTF-8, which also covers US-ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Latin1,
}

impl Charset {
    /// Resolve the charset declared by a `Content-Type` header, defaulting to UTF-8.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let declared = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<mime::Mime>().ok())
            .and_then(|media_type| {
                media_type
                    .get_param(mime::CHARSET)
                    .map(|name| name.as_str().to_ascii_lowercase())
            });

        match declared.as_deref() {
            Some("iso-8859-1") | Some("latin1") | Some("latin-1") => Charset::Latin1,
            _ => Charset::Utf8,
        }
    }

    /// Decode bytes into text, replacing malformed sequences.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Charset::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Decode at most `limit` bytes. A UTF-8 character split by the limit is dropped rather than
    /// rendered as a replacement character.
    pub fn decode_prefix(&self, bytes: &[u8], limit: usize) -> String {
        let mut end = bytes.len().min(limit);
        if *self == Charset::Utf8 && end < bytes.len() {
            if let Err(e) = std::str::from_utf8(&bytes[..end]) {
                if e.error_len().is_none() {
                    end = e.valid_up_to();
                }
            }
        }
        self.decode(&bytes[..end])
    }
}

/// Returns true if the error, or anything in its source chain, is an I/O error reporting that the
/// call was canceled.
pub fn is_cancellation(error: &(dyn Error + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            let message = io.to_string();
            if message.eq_ignore_ascii_case("canceled") || message.eq_ignore_ascii_case("cancelled")
            {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Returns the value of the `Content-Length` header, if present and numeric.
pub fn declared_content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Returns true if a response to `method` with this status and headers may carry a body.
pub fn response_has_body(method: &Method, status: StatusCode, headers: &HeaderMap) -> bool {
    if method == Method::HEAD {
        return false;
    }

    if !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
    {
        return true;
    }

    // The status says no body, but a declared length or chunked framing says otherwise.
    let chunked = headers
        .get(header::TRANSFER_ENCODING)
        .is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"chunked"));
    declared_content_length(headers).is_some_and(|len| len > 0) || chunked
}
