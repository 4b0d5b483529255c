//! Body materialization heuristics
//!
//! Decides whether a request or response body can be rendered as text for
//! the captured record, and produces that text from a shared view of the
//! bytes. The transport's own buffer is never consumed: callers hand in a
//! `&[u8]` borrowed from the `Bytes` the client will still deliver.

use encoding_rs::{Encoding, UTF_8};
use hyper::header::{self, HeaderMap};
use mime::Mime;

use crate::config::CaptureConfig;

/// Placeholder stored when a body exists but was not decoded
pub const ENCODED_BODY_OMITTED: &str = "(encoded body omitted)";

/// Outcome of materializing one body
///
/// `byte_count` is always the number of bytes actually observed, even when
/// the text was omitted; a zero-length body yields `("", 0)`, distinct from
/// a present-but-undecodable one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodySnapshot {
    /// Decoded text, empty string, or [`ENCODED_BODY_OMITTED`]
    pub text: String,
    /// Observed byte count
    pub byte_count: u64,
}

impl BodySnapshot {
    fn empty(byte_count: u64) -> Self {
        Self {
            text: String::new(),
            byte_count,
        }
    }

    fn omitted(byte_count: u64) -> Self {
        Self {
            text: ENCODED_BODY_OMITTED.to_string(),
            byte_count,
        }
    }
}

/// Check whether a body's encoding is one the materializer can decode
///
/// Only identity content is eligible: a `Content-Encoding` other than
/// `identity` (gzip, br, unknown compressions) makes the raw bytes
/// meaningless as text. `Transfer-Encoding` tokens `chunked` and `identity`
/// are transparent at this layer and stay eligible.
#[must_use]
pub fn has_supported_encoding(headers: &HeaderMap) -> bool {
    let content_ok = headers.get_all(header::CONTENT_ENCODING).iter().all(|v| {
        v.to_str()
            .is_ok_and(|v| v.trim().eq_ignore_ascii_case("identity"))
    });

    let transfer_ok = headers.get_all(header::TRANSFER_ENCODING).iter().all(|v| {
        v.to_str().is_ok_and(|v| {
            v.split(',').all(|token| {
                let token = token.trim();
                token.eq_ignore_ascii_case("chunked") || token.eq_ignore_ascii_case("identity")
            })
        })
    });

    content_ok && transfer_ok
}

/// Judge whether content is probably UTF-8 text
///
/// Heuristic, not a guarantee: a prefix of up to `probe_window` bytes must
/// validate as UTF-8 and contain no control characters other than
/// whitespace. A multi-byte sequence cut by the window boundary is
/// tolerated; a body that itself ends mid-sequence is not. Empty content
/// passes.
#[must_use]
pub fn is_probably_utf8(bytes: &[u8], probe_window: usize) -> bool {
    if bytes.is_empty() {
        return true;
    }

    let truncated = bytes.len() > probe_window;
    let prefix = &bytes[..bytes.len().min(probe_window)];

    let text = match std::str::from_utf8(prefix) {
        Ok(text) => text,
        Err(e) if truncated && e.error_len().is_none() => {
            // The window cut a multi-byte sequence; judge the complete part.
            match std::str::from_utf8(&prefix[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    text.chars().all(|c| !c.is_control() || c.is_whitespace())
}

/// Materializer for request and response bodies
///
/// Pure over its inputs; carries the probe window and capture cap from
/// [`CaptureConfig`].
#[derive(Debug, Clone)]
pub struct Materializer {
    probe_window: usize,
    max_captured_bytes: usize,
}

impl Materializer {
    /// Create a materializer with the given tuning
    #[must_use]
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            probe_window: config.utf8_probe_window,
            max_captured_bytes: config.max_captured_bytes,
        }
    }

    /// Materialize a request body
    ///
    /// Requests that are empty, unsupported, or not text-probable yield an
    /// empty string.
    #[must_use]
    pub fn request(&self, headers: &HeaderMap, body: &[u8]) -> BodySnapshot {
        let byte_count = body.len() as u64;

        if body.is_empty()
            || !has_supported_encoding(headers)
            || !is_probably_utf8(body, self.probe_window)
        {
            return BodySnapshot::empty(byte_count);
        }

        match self.decode(headers, body) {
            Some(text) => BodySnapshot { text, byte_count },
            None => BodySnapshot::empty(byte_count),
        }
    }

    /// Materialize a response body
    ///
    /// An empty body yields an empty string; a present body that cannot be
    /// decoded (unsupported encoding, failed probe, malformed content)
    /// yields [`ENCODED_BODY_OMITTED`].
    #[must_use]
    pub fn response(&self, headers: &HeaderMap, body: &[u8]) -> BodySnapshot {
        let byte_count = body.len() as u64;

        if body.is_empty() {
            return BodySnapshot::empty(byte_count);
        }

        if !has_supported_encoding(headers) || !is_probably_utf8(body, self.probe_window) {
            return BodySnapshot::omitted(byte_count);
        }

        match self.decode(headers, body) {
            Some(text) => BodySnapshot { text, byte_count },
            None => BodySnapshot::omitted(byte_count),
        }
    }

    /// Decode with the declared charset, strictly
    ///
    /// Returns `None` when any byte is malformed in the declared encoding;
    /// a placeholder beats garbled text in the record.
    fn decode(&self, headers: &HeaderMap, body: &[u8]) -> Option<String> {
        let encoding = declared_encoding(headers);
        let (text, _, had_errors) = encoding.decode(body);
        if had_errors {
            return None;
        }

        let mut text = text.into_owned();
        truncate_at_char_boundary(&mut text, self.max_captured_bytes);
        Some(text)
    }
}

/// Resolve the charset declared in the `Content-Type`, defaulting to UTF-8
fn declared_encoding(headers: &HeaderMap) -> &'static Encoding {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    match content_type.parse::<Mime>() {
        Ok(mime) => match mime.get_param(mime::CHARSET) {
            Some(charset) => Encoding::for_label(charset.as_str().as_bytes()).unwrap_or(UTF_8),
            None => UTF_8,
        },
        Err(_) => UTF_8,
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }

    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
