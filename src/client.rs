//! Buffering HTTP transport behind the capture engine

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::capture::Interceptor;
use crate::notify::Notifier;
use crate::store::RecordStore;
use crate::{CaptureError, Result};

/// Instrumented HTTP client
///
/// Pairs a pooled hyper client with an [`Interceptor`] so every executed
/// call is captured. Response bodies are buffered before the interceptor
/// sees them, which is what lets capture inspect bytes through a shared
/// view while the caller still receives them unchanged.
pub struct CaptureClient<S, N> {
    client: Client<HttpConnector, Full<Bytes>>,
    interceptor: Interceptor<S, N>,
}

impl<S: RecordStore, N: Notifier> CaptureClient<S, N> {
    /// Create a client in front of the given interceptor
    #[must_use]
    pub fn new(interceptor: Interceptor<S, N>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build_http();

        Self {
            client,
            interceptor,
        }
    }

    /// The interceptor observing this client's calls
    #[must_use]
    pub fn interceptor(&self) -> &Interceptor<S, N> {
        &self.interceptor
    }

    /// Execute a request, capturing it along the way
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the response body
    /// cannot be delivered; capture bookkeeping never produces an error
    /// here.
    pub async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        self.interceptor
            .intercept(request, |request| self.dispatch(request))
            .await
    }

    /// Forward the request and buffer the response
    async fn dispatch(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        debug!("dispatching {} {}", parts.method, parts.uri);
        let request = Request::from_parts(parts, Full::new(body));

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| CaptureError::Transport(format!("request failed: {e}")))?;

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map_err(|e| CaptureError::Transport(format!("failed to read response body: {e}")))?
            .to_bytes();

        Ok(Response::from_parts(parts, bytes))
    }
}
