//! OAuth2-specific error types.

use std::error::Error;
use std::fmt;

use crate::client::TransportError;
use crate::client::strategy::{StrategyError, Transient};

/// Errors that can occur during the token lifecycle.
///
/// The type is `Clone` because the outcome of one refresh is shared by every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuth2Error {
    /// Token endpoint URL is invalid.
    InvalidTokenEndpoint {
        /// The invalid URL that was provided.
        url: String,
        /// Description of why the URL is invalid.
        reason: String,
    },

    /// The cached token cannot be used and cannot be refreshed.
    TokenExpired {
        /// Description of the situation.
        reason: String,
    },

    /// Token request or refresh failed.
    TokenInvalid {
        /// Description of the failure.
        reason: String,
        /// Status code returned by the token endpoint, if any.
        status: Option<u16>,
        /// Raw response body returned by the token endpoint, if any.
        body: Option<String>,
        /// Network failure, when no response was received.
        cause: Option<TransportError>,
    },

    /// The token has an empty access token.
    TokenRevoked,

    /// Invalid OAuth2 response from the token endpoint.
    InvalidTokenResponse {
        /// Description of what was invalid.
        reason: String,
    },

    /// Configuration error.
    ConfigurationError {
        /// Description of the configuration issue.
        reason: String,
    },

    /// Credential encoding or scope handling failed.
    Strategy(StrategyError),
}

impl OAuth2Error {
    pub(crate) fn token_expired(reason: impl Into<String>) -> Self {
        Self::TokenExpired {
            reason: reason.into(),
        }
    }

    pub(crate) fn token_invalid(reason: impl Into<String>) -> Self {
        Self::TokenInvalid {
            reason: reason.into(),
            status: None,
            body: None,
            cause: None,
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::ConfigurationError {
            reason: reason.into(),
        }
    }
}

impl From<StrategyError> for OAuth2Error {
    fn from(error: StrategyError) -> Self {
        Self::Strategy(error)
    }
}

impl From<TransportError> for OAuth2Error {
    fn from(error: TransportError) -> Self {
        Self::TokenInvalid {
            reason: "token endpoint unreachable".to_string(),
            status: None,
            body: None,
            cause: Some(error),
        }
    }
}

impl Transient for OAuth2Error {
    fn is_transient(&self) -> bool {
        match self {
            Self::TokenInvalid {
                cause: Some(cause), ..
            } => cause.is_transient(),
            _ => false,
        }
    }
}

impl Error for OAuth2Error {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TokenInvalid {
                cause: Some(cause), ..
            } => Some(cause),
            Self::Strategy(error) => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTokenEndpoint { url, reason } => {
                write!(f, "Invalid token endpoint URL '{url}': {reason}")
            }
            Self::TokenExpired { reason } => write!(f, "OAuth2 token has expired: {reason}"),
            Self::TokenInvalid {
                reason,
                status,
                body,
                cause,
            } => {
                write!(f, "OAuth2 token is invalid: {reason}")?;
                if let Some(status) = status {
                    write!(f, " (status {status})")?;
                }
                if let Some(body) = body.as_deref().filter(|body| !body.is_empty()) {
                    write!(f, ": {body}")?;
                }
                if let Some(cause) = cause {
                    write!(f, ": {cause}")?;
                }
                Ok(())
            }
            Self::TokenRevoked => write!(f, "OAuth2 token has been revoked"),
            Self::InvalidTokenResponse { reason } => {
                write!(f, "Invalid OAuth2 token response: {reason}")
            }
            Self::ConfigurationError { reason } => {
                write!(f, "OAuth2 configuration error: {reason}")
            }
            Self::Strategy(error) => write!(f, "OAuth2 strategy error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::TransportErrorKind;

    #[test]
    fn should_display_invalid_token_endpoint() {
        let error = OAuth2Error::InvalidTokenEndpoint {
            url: "not-a-url".to_string(),
            reason: "missing scheme".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid token endpoint URL 'not-a-url': missing scheme"
        );
    }

    #[test]
    fn should_display_status_and_body() {
        let error = OAuth2Error::TokenInvalid {
            reason: "token request rejected".to_string(),
            status: Some(400),
            body: Some(r#"{"error":"invalid_client"}"#.to_string()),
            cause: None,
        };

        insta::assert_snapshot!(error.to_string(), @r#"OAuth2 token is invalid: token request rejected (status 400): {"error":"invalid_client"}"#);
    }

    #[test]
    fn should_be_transient_only_for_transient_causes() {
        let timeout = OAuth2Error::from(TransportError::new(TransportErrorKind::Timeout, "slow"));
        let rejected = OAuth2Error::TokenInvalid {
            reason: "rejected".to_string(),
            status: Some(401),
            body: None,
            cause: None,
        };

        assert!(timeout.is_transient());
        assert!(timeout.source().is_some());
        assert!(!rejected.is_transient());
        assert!(!OAuth2Error::TokenRevoked.is_transient());
    }

    #[test]
    fn should_display_configuration_error() {
        let error = OAuth2Error::configuration("missing client_secret");
        assert_eq!(
            error.to_string(),
            "OAuth2 configuration error: missing client_secret"
        );
    }
}
