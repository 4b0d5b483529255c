//! Capture orchestration for wrapped HTTP calls

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use hyper::header::{self, HeaderMap};
use hyper::{Request, Response, Version};
use tracing::{debug, warn};

use crate::body::Materializer;
use crate::config::CaptureConfig;
use crate::notify::Notifier;
use crate::record::{Header, HttpRecord, ResponseSummary, TlsInfo};
use crate::store::RecordStore;

/// Transparent observer of one HTTP call at a time
///
/// Sits between a client and its transport: builds a pending record when a
/// call starts, inserts it, delegates to the wrapped call, materializes the
/// response, and finalizes the record with an update, all without changing
/// what the caller sees. Collaborators are injected at construction; the
/// interceptor itself holds no other state and may serve any number of
/// concurrent calls.
pub struct Interceptor<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    materializer: Materializer,
}

impl<S: RecordStore, N: Notifier> Interceptor<S, N> {
    /// Create an interceptor with default capture tuning
    #[must_use]
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self::with_config(store, notifier, &CaptureConfig::default())
    }

    /// Create an interceptor with explicit capture tuning
    #[must_use]
    pub fn with_config(store: Arc<S>, notifier: Arc<N>, config: &CaptureConfig) -> Self {
        Self {
            store,
            notifier,
            materializer: Materializer::new(config),
        }
    }

    /// The injected record store
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Observe one wrapped call
    ///
    /// Inserts a pending record, awaits `next`, and finalizes the record on
    /// every exit path: completion, call failure, panic, or cancellation
    /// of this future. The value `next` produces is returned verbatim: a
    /// response is handed back untouched (its `Bytes` body is inspected
    /// through a shared view, never consumed), and an error is returned as
    /// the exact value after its description is recorded. Capture
    /// bookkeeping failures are logged and absorbed.
    pub async fn intercept<F, Fut, E>(
        &self,
        request: Request<Bytes>,
        next: F,
    ) -> std::result::Result<Response<Bytes>, E>
    where
        F: FnOnce(Request<Bytes>) -> Fut,
        Fut: Future<Output = std::result::Result<Response<Bytes>, E>>,
        E: Display,
    {
        let mut record = self.pending_record(&request);

        match self.store.insert(&record) {
            Ok(id) => {
                record = record.with_identity(id);
                self.notifier.show(&record);
            }
            Err(e) => warn!("failed to insert capture record: {e}"),
        }

        let mut finalizer = Finalizer {
            store: self.store.as_ref(),
            notifier: self.notifier.as_ref(),
            record,
        };

        match next(request).await {
            Ok(response) => {
                finalizer.transition(|record| self.completed_record(record, &response));
                Ok(response)
            }
            Err(error) => {
                finalizer.transition(|record| record.with_error(error.to_string()));
                Err(error)
            }
        }
    }

    /// Build the pending record from the outgoing request
    fn pending_record(&self, request: &Request<Bytes>) -> HttpRecord {
        let uri = request.uri();
        let path = match uri.query() {
            Some(query) => format!("{}?{query}", uri.path()),
            None => uri.path().to_string(),
        };
        let snapshot = self.materializer.request(request.headers(), request.body());

        HttpRecord {
            url: uri.to_string(),
            host: uri.host().unwrap_or_default().to_string(),
            path,
            scheme: uri.scheme_str().unwrap_or_default().to_string(),
            method: request.method().to_string(),
            request_date: epoch_millis(),
            request_headers: header_pairs(request.headers()),
            request_content_type: content_type(request.headers()),
            request_content_length: snapshot.byte_count,
            request_body: snapshot.text,
            ..HttpRecord::default()
        }
    }

    /// Fold the observed response into a completed record
    fn completed_record(&self, record: HttpRecord, response: &Response<Bytes>) -> HttpRecord {
        let snapshot = self.materializer.response(response.headers(), response.body());
        let status = response.status();
        let tls = response.extensions().get::<TlsInfo>();

        record.with_response(ResponseSummary {
            protocol: protocol_name(response.version()).to_string(),
            code: status.as_u16(),
            message: status.canonical_reason().unwrap_or_default().to_string(),
            headers: header_pairs(response.headers()),
            content_type: content_type(response.headers()),
            content_length: snapshot.byte_count,
            body: snapshot.text,
            date: epoch_millis(),
            tls_version: tls.map(|t| t.version.clone()).unwrap_or_default(),
            cipher_suite: tls.map(|t| t.cipher_suite.clone()).unwrap_or_default(),
        })
    }
}

/// Guaranteed finalize: update then notify, on every exit path
///
/// Runs from `Drop` so the pair executes whether the wrapped call
/// completed, failed, panicked, or had its future dropped mid-flight.
struct Finalizer<'a, S: RecordStore, N: Notifier> {
    store: &'a S,
    notifier: &'a N,
    record: HttpRecord,
}

impl<S: RecordStore, N: Notifier> Finalizer<'_, S, N> {
    fn transition(&mut self, f: impl FnOnce(HttpRecord) -> HttpRecord) {
        let record = std::mem::take(&mut self.record);
        self.record = f(record);
    }
}

impl<S: RecordStore, N: Notifier> Drop for Finalizer<'_, S, N> {
    fn drop(&mut self) {
        let record = std::mem::take(&mut self.record);

        if record.id == 0 {
            // Never inserted; updating requires an identity.
            debug!("skipping finalize for record without identity");
            return;
        }

        if let Err(e) = self.store.update(&record) {
            warn!("failed to update capture record {}: {e}", record.id);
        }
        self.notifier.show(&record);
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<Header> {
    headers
        .iter()
        .map(|(name, value)| {
            Header::new(
                name.as_str(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

fn protocol_name(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordStatus;
    use crate::store::MemoryStore;
    use crate::{CaptureError, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingNotifier {
        shown: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn show(&self, _record: &HttpRecord) {
            self.shown.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn insert(&self, _record: &HttpRecord) -> Result<i64> {
            Err(CaptureError::Store("backend offline".to_string()))
        }

        fn update(&self, _record: &HttpRecord) -> Result<()> {
            Err(CaptureError::Store("backend offline".to_string()))
        }
    }

    fn interceptor() -> (
        Arc<MemoryStore>,
        Arc<CountingNotifier>,
        Interceptor<MemoryStore, CountingNotifier>,
    ) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(CountingNotifier::default());
        let interceptor = Interceptor::new(Arc::clone(&store), Arc::clone(&notifier));
        (store, notifier, interceptor)
    }

    fn get_request(uri: &str) -> Request<Bytes> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    fn json_response(body: &'static [u8]) -> Response<Bytes> {
        Response::builder()
            .status(200)
            .header("content-type", "application/json")
            .body(Bytes::from_static(body))
            .unwrap()
    }

    #[test]
    fn test_pending_record_decomposes_url() {
        let (_, _, interceptor) = interceptor();
        let request = get_request("https://api.example.com/v1/items?limit=10");

        let record = interceptor.pending_record(&request);

        assert_eq!(record.url, "https://api.example.com/v1/items?limit=10");
        assert_eq!(record.host, "api.example.com");
        assert_eq!(record.path, "/v1/items?limit=10");
        assert_eq!(record.scheme, "https");
        assert_eq!(record.method, "GET");
        assert_eq!(record.status(), RecordStatus::Pending);
        assert!(record.request_date > 0);
    }

    #[tokio::test]
    async fn test_insert_happens_before_the_wrapped_call() {
        let (store, _, interceptor) = interceptor();
        let seen = Arc::clone(&store);

        interceptor
            .intercept(get_request("http://example.com/"), move |_req| async move {
                assert_eq!(seen.len(), 1);
                assert_eq!(seen.get(1).unwrap().status(), RecordStatus::Pending);
                Ok::<_, CaptureError>(json_response(b"{}"))
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_carries_inserted_identity() {
        let (store, notifier, interceptor) = interceptor();

        let response = interceptor
            .intercept(get_request("http://example.com/items"), |_req| async {
                Ok::<_, CaptureError>(json_response(b"{\"ok\":true}"))
            })
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        let record = store.get(1).unwrap();
        assert_eq!(record.id, 1);
        assert_eq!(record.status(), RecordStatus::Completed);
        assert_eq!(record.response_body, "{\"ok\":true}");
        assert_eq!(notifier.shown.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_response_is_returned_verbatim() {
        let (_, _, interceptor) = interceptor();
        let body = Bytes::from_static(b"\x00\x01binary payload");
        let expected = body.clone();

        let response = interceptor
            .intercept(get_request("http://example.com/blob"), |_req| {
                let body = body.clone();
                async move {
                    Ok::<_, CaptureError>(Response::builder().status(200).body(body).unwrap())
                }
            })
            .await
            .unwrap();

        assert_eq!(response.into_body(), expected);
    }

    #[tokio::test]
    async fn test_call_error_is_recorded_and_reraised() {
        let (store, notifier, interceptor) = interceptor();

        let result = interceptor
            .intercept(get_request("http://example.com/"), |_req| async {
                Err::<Response<Bytes>, std::io::Error>(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "connection timed out",
                ))
            })
            .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::TimedOut);

        let record = store.get(1).unwrap();
        assert_eq!(record.status(), RecordStatus::Failed);
        assert!(record.error.as_deref().unwrap().contains("timed out"));
        assert_eq!(record.response_code, 0);
        assert_eq!(notifier.shown.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_store_failure_never_breaks_the_call() {
        let store = Arc::new(FailingStore);
        let notifier = Arc::new(CountingNotifier::default());
        let interceptor = Interceptor::new(store, Arc::clone(&notifier));

        let response = interceptor
            .intercept(get_request("http://example.com/"), |_req| async {
                Ok::<_, CaptureError>(json_response(b"{}"))
            })
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        // Insert never succeeded, so no snapshot was ever published.
        assert_eq!(notifier.shown.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_cancelled_call_still_finalizes() {
        let (store, notifier, interceptor) = interceptor();

        {
            let fut = interceptor.intercept(get_request("http://example.com/slow"), |_req| {
                std::future::pending::<std::result::Result<Response<Bytes>, CaptureError>>()
            });
            tokio::pin!(fut);

            tokio::select! {
                _ = &mut fut => unreachable!("wrapped call never completes"),
                () = tokio::time::sleep(Duration::from_millis(20)) => {}
            }
            // fut dropped here, mid-flight
        }

        let record = store.get(1).unwrap();
        assert_eq!(record.status(), RecordStatus::Pending);
        assert_eq!(notifier.shown.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_tls_parameters_from_response_extension() {
        let (store, _, interceptor) = interceptor();

        interceptor
            .intercept(get_request("https://example.com/"), |_req| async {
                let mut response = json_response(b"{}");
                response.extensions_mut().insert(TlsInfo {
                    version: "TLSv1.3".to_string(),
                    cipher_suite: "TLS_AES_128_GCM_SHA256".to_string(),
                });
                Ok::<_, CaptureError>(response)
            })
            .await
            .unwrap();

        let record = store.get(1).unwrap();
        assert_eq!(record.tls_version, "TLSv1.3");
        assert_eq!(record.cipher_suite, "TLS_AES_128_GCM_SHA256");
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(protocol_name(Version::HTTP_11), "HTTP/1.1");
        assert_eq!(protocol_name(Version::HTTP_2), "HTTP/2.0");
        assert_eq!(protocol_name(Version::HTTP_10), "HTTP/1.0");
    }

    #[test]
    fn test_header_pairs_keep_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", "a=1".parse().unwrap());
        headers.append("set-cookie", "b=2".parse().unwrap());

        let pairs = header_pairs(&headers);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].value, "a=1");
        assert_eq!(pairs[1].value, "b=2");
    }
}
