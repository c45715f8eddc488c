//! In-memory transport for unit tests.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use serde_json::{Value, json};

use super::{ApiRequest, HttpResponse, HttpTransport, TransportError};

type Handler = dyn Fn(&ApiRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// Answers requests with a handler and records them.
#[derive(Clone)]
pub(crate) struct MockTransport {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
    latency: Duration,
}

impl MockTransport {
    pub(crate) fn new(
        handler: impl Fn(&ApiRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::default(),
            latency: Duration::ZERO,
        }
    }

    /// Delays every response, to widen race windows.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|request| request.url().path() == path)
            .count()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport")
            .field("latency", &self.latency)
            .finish_non_exhaustive()
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.clone());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            (self.handler)(&request)
        })
    }
}

pub(crate) fn json_response(status: StatusCode, body: &Value) -> HttpResponse {
    HttpResponse::new(status)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body(body.to_string())
}

pub(crate) fn token_response(access_token: &str, expires_in: u64) -> HttpResponse {
    json_response(
        StatusCode::OK,
        &json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": expires_in,
        }),
    )
}

/// The bearer token of `request`, if any.
pub(crate) fn bearer_of(request: &ApiRequest) -> Option<String> {
    request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(ToString::to_string)
}
