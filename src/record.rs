//! Captured-call data model

use serde::{Deserialize, Serialize};

/// A single HTTP header as produced by the transport
///
/// Plain (name, value) pair with no validation beyond verbatim capture.
/// Records keep headers as an ordered sequence rather than a map because a
/// header name may legally repeat (e.g. `Set-Cookie`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name, as sent
    pub name: String,
    /// Header value, as sent
    pub value: String,
}

impl Header {
    /// Create a header pair
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Lifecycle state of a record, derived from its fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Inserted, wrapped call still in flight
    Pending,
    /// Wrapped call returned a response
    Completed,
    /// Wrapped call failed before producing a response
    Failed,
}

/// TLS handshake parameters reported by the transport
///
/// A TLS-terminating transport inserts this into the response extensions;
/// plain-text transports leave it absent and the record keeps empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsInfo {
    /// Negotiated TLS version (e.g. "TLSv1.3")
    pub version: String,
    /// Negotiated cipher suite
    pub cipher_suite: String,
}

/// Response-side fields applied to a record in one transition
#[derive(Debug, Clone, Default)]
pub struct ResponseSummary {
    /// Protocol string (e.g. "HTTP/1.1")
    pub protocol: String,
    /// Numeric status code
    pub code: u16,
    /// Status message
    pub message: String,
    /// Ordered response headers
    pub headers: Vec<Header>,
    /// Response content type
    pub content_type: String,
    /// Observed response byte count
    pub content_length: u64,
    /// Materialized response body text
    pub body: String,
    /// Response timestamp, epoch millis
    pub date: i64,
    /// Negotiated TLS version, empty for plain text
    pub tls_version: String,
    /// Negotiated cipher suite, empty for plain text
    pub cipher_suite: String,
}

/// One observed HTTP call
///
/// Created pending when the call starts and finalized exactly once when it
/// completes or fails. The type is immutable-by-copy: every transition
/// ([`with_identity`](Self::with_identity),
/// [`with_response`](Self::with_response), [`with_error`](Self::with_error))
/// consumes the previous value and returns a new one, so a snapshot handed
/// to a concurrent reader never changes underneath it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRecord {
    /// Store-assigned identity, 0 before insert
    pub id: i64,
    /// Full request URL
    pub url: String,
    /// Request host
    pub host: String,
    /// Request path, including `?query` when present
    pub path: String,
    /// URL scheme
    pub scheme: String,
    /// HTTP method
    pub method: String,
    /// Request timestamp, epoch millis
    pub request_date: i64,
    /// Ordered request headers
    pub request_headers: Vec<Header>,
    /// Request content type
    pub request_content_type: String,
    /// Observed request byte count
    pub request_content_length: u64,
    /// Materialized request body text, empty if not captured
    pub request_body: String,
    /// Response timestamp, epoch millis, 0 while pending
    pub response_date: i64,
    /// Protocol string, empty while pending
    pub protocol: String,
    /// Status code, 0 while pending
    pub response_code: u16,
    /// Status message
    pub response_message: String,
    /// Ordered response headers
    pub response_headers: Vec<Header>,
    /// Response content type
    pub response_content_type: String,
    /// Observed response byte count
    pub response_content_length: u64,
    /// Materialized response body text, empty, decoded, or the
    /// omitted-content placeholder
    pub response_body: String,
    /// Negotiated TLS version, empty for plain text
    pub tls_version: String,
    /// Negotiated cipher suite, empty for plain text
    pub cipher_suite: String,
    /// Description of the call failure, absent on success
    pub error: Option<String>,
}

impl HttpRecord {
    /// Lifecycle state derived from the populated fields
    #[must_use]
    pub fn status(&self) -> RecordStatus {
        if self.error.is_some() {
            RecordStatus::Failed
        } else if self.response_code != 0 {
            RecordStatus::Completed
        } else {
            RecordStatus::Pending
        }
    }

    /// Adopt the identity assigned by a store insert
    #[must_use]
    pub fn with_identity(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Transition to completed with the observed response fields
    #[must_use]
    pub fn with_response(mut self, summary: ResponseSummary) -> Self {
        self.protocol = summary.protocol;
        self.response_code = summary.code;
        self.response_message = summary.message;
        self.response_headers = summary.headers;
        self.response_content_type = summary.content_type;
        self.response_content_length = summary.content_length;
        self.response_body = summary.body;
        self.response_date = summary.date;
        self.tls_version = summary.tls_version;
        self.cipher_suite = summary.cipher_suite;
        self.error = None;
        self
    }

    /// Transition to failed with a description of the call error
    ///
    /// Response-side fields are reset to their pending values: a failed
    /// call produced no response, and a record never carries both an error
    /// and response data.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.response_date = 0;
        self.protocol = String::new();
        self.response_code = 0;
        self.response_message = String::new();
        self.response_headers = Vec::new();
        self.response_content_type = String::new();
        self.response_content_length = 0;
        self.response_body = String::new();
        self.tls_version = String::new();
        self.cipher_suite = String::new();
        self.error = Some(error.into());
        self
    }
}
