use super::AuthenticationError;
use super::TransportError;
use super::oauth2::OAuth2Error;
use super::parameters::ParameterValidationError;
use super::strategy::{RateLimitExceeded, StrategyError, Transient};

/// Errors that can occur when using the [`ApiClient`](super::ApiClient).
///
/// Token and validation errors surface as-is so callers can match on the precise cause.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum ApiClientError {
    /// Token acquisition, refresh or validity failure.
    OAuth2(OAuth2Error),

    /// Static authentication could not produce a header.
    Authentication(AuthenticationError),

    /// A parameter failed validation, coercion or placement.
    Parameter(ParameterValidationError),

    /// No response was received.
    Transport(TransportError),

    /// Invalid strategy configuration.
    Strategy(StrategyError),

    /// The sliding-window budget is exhausted.
    RateLimitExceeded(RateLimitExceeded),

    /// URL parsing error when constructing request URLs.
    UrlError(url::ParseError),

    /// Header value contains invalid characters.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// JSON serialization error.
    JsonValueError(serde_json::Error),

    /// Invalid base URL configuration.
    #[display("Invalid base URL: {error}")]
    #[from(skip)]
    InvalidBaseUrl {
        /// Description of the problem.
        error: String,
    },

    /// The HTTP method is not one the client supports.
    #[display("Unsupported HTTP method: {method}")]
    #[from(skip)]
    UnsupportedMethod {
        /// The rejected method.
        method: String,
    },

    /// No endpoint is registered under this name.
    #[display("Unknown endpoint: {name}")]
    #[from(skip)]
    UnknownEndpoint {
        /// The requested name.
        name: String,
    },

    /// Plain HTTP was refused because HTTPS is enforced.
    #[display("Insecure transport refused for {url}: HTTPS is required")]
    #[from(skip)]
    InsecureTransport {
        /// The rejected URL.
        url: String,
    },

    /// Server returned an error status and the status hook is enabled.
    #[display("Unexpected status code {status_code}: {body}")]
    #[from(skip)]
    UnexpectedStatusCode {
        /// The HTTP status code received.
        status_code: u16,
        /// The response body, truncated.
        body: String,
    },
}

impl Transient for ApiClientError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_transient(),
            Self::OAuth2(error) => error.is_transient(),
            _ => false,
        }
    }
}
