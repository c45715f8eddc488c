use std::fmt;

use http::HeaderValue;
use http::header::{AUTHORIZATION, HeaderName};

use super::SecureString;
use super::oauth2::OAuth2Flow;
use super::strategy::{BasicCredentialEncoding, CredentialEncoding, StrategyError};

/// Errors raised while turning an [`Authentication`] into a header.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum AuthenticationError {
    /// Bearer token contains characters not allowed in a header.
    #[display("Bearer token contains invalid characters: {message}")]
    InvalidBearerToken {
        /// Description of the problem.
        message: String,
    },

    /// Basic credentials cannot be encoded.
    #[display("Invalid basic credentials: {message}")]
    InvalidBasicCredentials {
        /// Description of the problem.
        message: String,
    },

    /// API key header name is invalid.
    #[display("Invalid API key header name '{header_name}': {message}")]
    InvalidHeaderName {
        /// The rejected header name.
        header_name: String,
        /// Description of the problem.
        message: String,
    },

    /// API key contains characters not allowed in a header.
    #[display("API key contains invalid characters: {message}")]
    InvalidApiKey {
        /// Description of the problem.
        message: String,
    },

    /// OAuth2 needs a token exchange and has no static header.
    #[display("OAuth2 authentication requires an asynchronous token acquisition")]
    OAuth2RequiresFlow,
}

impl From<StrategyError> for AuthenticationError {
    fn from(error: StrategyError) -> Self {
        Self::InvalidBasicCredentials {
            message: error.to_string(),
        }
    }
}

/// How outbound API requests are authenticated.
#[derive(Clone)]
pub enum Authentication {
    /// `Authorization: Bearer <token>` with a static token (RFC 6750).
    Bearer(SecureString),

    /// `Authorization: Basic <base64(username:password)>` (RFC 7617).
    Basic {
        /// The user name.
        username: String,
        /// The password.
        password: SecureString,
    },

    /// A static secret in a custom header.
    ApiKey {
        /// The header carrying the key.
        header_name: String,
        /// The key.
        key: SecureString,
    },

    /// Bearer tokens acquired, cached and refreshed through an OAuth2 token endpoint.
    OAuth2(OAuth2Flow),
}

impl Authentication {
    /// Builds the header for static schemes.
    ///
    /// # Errors
    ///
    /// Returns an [`AuthenticationError`] when the credentials cannot form a valid header,
    /// and [`AuthenticationError::OAuth2RequiresFlow`] for the OAuth2 variant.
    pub fn to_header(&self) -> Result<(HeaderName, HeaderValue), AuthenticationError> {
        match self {
            Self::Bearer(token) => {
                let value = bearer_header(token.as_str())?;
                Ok((AUTHORIZATION, value))
            }
            Self::Basic { username, password } => {
                let encoded = BasicCredentialEncoding.encode(username, password)?;
                let mut value = HeaderValue::from_str(encoded.as_str()).map_err(|err| {
                    AuthenticationError::InvalidBasicCredentials {
                        message: err.to_string(),
                    }
                })?;
                value.set_sensitive(true);
                Ok((AUTHORIZATION, value))
            }
            Self::ApiKey { header_name, key } => {
                let header = HeaderName::from_bytes(header_name.as_bytes()).map_err(|err| {
                    AuthenticationError::InvalidHeaderName {
                        header_name: header_name.clone(),
                        message: err.to_string(),
                    }
                })?;
                let mut value = HeaderValue::from_str(key.as_str()).map_err(|err| {
                    AuthenticationError::InvalidApiKey {
                        message: err.to_string(),
                    }
                })?;
                value.set_sensitive(true);
                Ok((header, value))
            }
            Self::OAuth2(_) => Err(AuthenticationError::OAuth2RequiresFlow),
        }
    }
}

/// Builds a sensitive `Bearer <token>` header value.
pub(crate) fn bearer_header(token: &str) -> Result<HeaderValue, AuthenticationError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
        AuthenticationError::InvalidBearerToken {
            message: err.to_string(),
        }
    })?;
    value.set_sensitive(true);
    Ok(value)
}

impl fmt::Debug for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.debug_tuple("Bearer").field(&"[REDACTED]").finish(),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::ApiKey { header_name, .. } => f
                .debug_struct("ApiKey")
                .field("header_name", header_name)
                .field("key", &"[REDACTED]")
                .finish(),
            Self::OAuth2(flow) => f.debug_tuple("OAuth2").field(flow).finish(),
        }
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(token) => write!(f, "Bearer {token}"),
            Self::Basic { username, .. } => write!(f, "Basic (username: {username})"),
            Self::ApiKey { header_name, key } => write!(f, "ApiKey ({header_name}: {key})"),
            Self::OAuth2(flow) => write!(f, "OAuth2 (client_id: {})", flow.config().client_id()),
        }
    }
}

/// Per-request client credentials overriding the configured ones for token acquisition.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: SecureString,
    scopes: Vec<String>,
}

impl ClientCredentials {
    /// Creates credentials without scopes.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<SecureString>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: Vec::new(),
        }
    }

    /// Sets the scopes requested with these credentials.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// The client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The client secret.
    pub fn client_secret(&self) -> &SecureString {
        &self.client_secret
    }

    /// Requested scopes; empty means "use the configured ones".
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("scopes", &self.scopes)
            .finish()
    }
}
