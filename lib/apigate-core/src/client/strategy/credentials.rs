use std::fmt::Debug;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::StrategyError;
use crate::client::SecureString;

/// Where client credentials travel in a token endpoint request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CredentialPlacement {
    /// `Authorization: Basic ...` header (RFC 6749 section 2.3.1).
    #[default]
    Header,
    /// `client_id` and `client_secret` fields of the request body.
    Body,
}

/// Turns a client id and secret into an `Authorization` header value.
pub trait CredentialEncoding: Debug + Send + Sync {
    /// Encodes the credentials.
    ///
    /// # Errors
    ///
    /// Returns a [`StrategyError`] when the credentials cannot be encoded.
    fn encode(
        &self,
        client_id: &str,
        client_secret: &SecureString,
    ) -> Result<SecureString, StrategyError>;
}

/// HTTP Basic encoding of client credentials (RFC 7617).
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicCredentialEncoding;

impl CredentialEncoding for BasicCredentialEncoding {
    fn encode(
        &self,
        client_id: &str,
        client_secret: &SecureString,
    ) -> Result<SecureString, StrategyError> {
        if client_id.is_empty() || client_secret.as_str().is_empty() {
            return Err(StrategyError::MissingCredentials);
        }
        if client_id.contains(':') {
            return Err(StrategyError::InvalidClientId);
        }

        let joined = SecureString::new(format!("{client_id}:{}", client_secret.as_str()));
        let encoded = STANDARD.encode(joined.as_str());
        Ok(SecureString::new(format!("Basic {encoded}")))
    }
}
