use std::fmt::Debug;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

use super::strategy::Transient;
use super::{ApiRequest, HttpResponse};

/// Broad category of a [`TransportError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum TransportErrorKind {
    /// The connection could not be established or was reset.
    #[display("connection")]
    Connect,
    /// The request timed out.
    #[display("timeout")]
    Timeout,
    /// The request could not be built or sent.
    #[display("request")]
    Request,
    /// The response body could not be read.
    #[display("body")]
    Body,
    /// Anything else.
    #[display("transport")]
    Other,
}

/// Failure below the HTTP layer: no response was received.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
#[display("{kind} error: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    /// Creates an error of `kind`.
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The category.
    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    /// The description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout
        )
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        let kind = if error.is_timeout() {
            TransportErrorKind::Timeout
        } else if error.is_connect() {
            TransportErrorKind::Connect
        } else if error.is_body() || error.is_decode() {
            TransportErrorKind::Body
        } else if error.is_request() || error.is_builder() {
            TransportErrorKind::Request
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, error.to_string())
    }
}

/// Sends requests over the network.
///
/// Implement this to plug another HTTP stack or a test double under the client.
pub trait HttpTransport: Debug + Send + Sync {
    /// Sends `request` and waits for the complete response.
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>>;
}

/// [`HttpTransport`] backed by a [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Creates a client with a total request timeout.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the client cannot be initialised.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
        Box::pin(async move {
            let (method, url, headers, body) = request.into_parts();
            debug!(%method, %url, "sending request");

            let mut outgoing = reqwest::Request::new(method, url);
            *outgoing.headers_mut() = headers;
            if let Some(body) = body {
                *outgoing.body_mut() = Some(reqwest::Body::from(body));
            }

            let response = self.client.execute(outgoing).await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?;
            debug!(%status, length = body.len(), "response received");

            let mut result = HttpResponse::new(status).with_body(body);
            *result.headers_mut() = headers;
            Ok(result)
        })
    }
}
