//! OAuth2 configuration and builder.

use std::fmt;
use std::sync::{Arc, OnceLock};

use http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;
use url::Url;

use super::error::OAuth2Error;
use super::token::{DEFAULT_GRACE_PERIOD, OAuth2Token, TokenCache};
use crate::client::strategy::{
    BasicCredentialEncoding, CredentialEncoding, CredentialPlacement, ScopeStrategy,
};
use crate::client::{HttpTransport, ReqwestTransport, SecureString};

/// Environment variable overriding the token grace period, in seconds.
pub const GRACE_PERIOD_ENV: &str = "AUTH_TOKEN_GRACE_PERIOD";

/// OAuth2 grant type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OAuth2GrantType {
    /// Client Credentials grant (machine-to-machine).
    #[default]
    ClientCredentials,
    /// Pre-acquired token (externally obtained), never requested from the token endpoint.
    PreAcquired,
}

/// Encoding of the token request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenRequestFormat {
    /// `application/x-www-form-urlencoded` (RFC 6749).
    #[default]
    Form,
    /// `application/json`, for providers that expect it.
    Json,
}

/// OAuth2 authentication configuration.
///
/// Use [`OAuth2ConfigBuilder`] to create instances. Setters re-validate the configuration.
#[derive(Clone)]
pub struct OAuth2Config {
    client_id: String,
    client_secret: Option<SecureString>,
    token_url: Url,
    grant_type: OAuth2GrantType,
    scopes: Vec<String>,
    scope_strategy: ScopeStrategy,
    credential_placement: CredentialPlacement,
    request_format: TokenRequestFormat,
    credential_encoding: Arc<dyn CredentialEncoding>,
    token_headers: HeaderMap,
    grace_period: u64,
    token_cache: TokenCache,
    transport: Option<Arc<dyn HttpTransport>>,
    fallback_transport: Arc<OnceLock<Arc<dyn HttpTransport>>>,
}

/// Wraps [`OAuth2Config`] in an [`Arc`] for sharing across async tasks.
pub type SharedOAuth2Config = Arc<OAuth2Config>;

impl OAuth2Config {
    /// Creates a builder for client credentials flow.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::InvalidTokenEndpoint`] when `token_url` does not parse.
    pub fn client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<SecureString>,
        token_url: impl AsRef<str>,
    ) -> Result<OAuth2ConfigBuilder, OAuth2Error> {
        Ok(OAuth2ConfigBuilder::new(client_id, token_url)?
            .with_client_secret(client_secret)
            .with_grant_type(OAuth2GrantType::ClientCredentials))
    }

    /// Creates a builder for an externally obtained token.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::InvalidTokenEndpoint`] when `token_url` does not parse.
    pub fn pre_acquired(
        client_id: impl Into<String>,
        token_url: impl AsRef<str>,
        token: OAuth2Token,
    ) -> Result<OAuth2ConfigBuilder, OAuth2Error> {
        Ok(OAuth2ConfigBuilder::new(client_id, token_url)?
            .with_token(token)
            .with_grant_type(OAuth2GrantType::PreAcquired))
    }

    /// Client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Client secret, if any.
    pub fn client_secret(&self) -> Option<&SecureString> {
        self.client_secret.as_ref()
    }

    /// Token endpoint.
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Grant type.
    pub fn grant_type(&self) -> OAuth2GrantType {
        self.grant_type
    }

    /// Requested scopes.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Scope strategy.
    pub fn scope_strategy(&self) -> &ScopeStrategy {
        &self.scope_strategy
    }

    /// Where client credentials go in token requests.
    pub fn credential_placement(&self) -> CredentialPlacement {
        self.credential_placement
    }

    /// Token request body format.
    pub fn request_format(&self) -> TokenRequestFormat {
        self.request_format
    }

    /// Credential encoding used for the `Authorization` header of token requests.
    pub fn credential_encoding(&self) -> &dyn CredentialEncoding {
        self.credential_encoding.as_ref()
    }

    /// Extra headers sent with every token request.
    pub fn token_headers(&self) -> &HeaderMap {
        &self.token_headers
    }

    /// Grace period applied to acquired tokens, in seconds.
    pub fn grace_period(&self) -> u64 {
        self.grace_period
    }

    /// The transport used for token requests.
    ///
    /// Falls back to a default [`ReqwestTransport`], created once, when none was attached.
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        if let Some(transport) = &self.transport {
            return Arc::clone(transport);
        }
        let fallback = self.fallback_transport.get_or_init(|| {
            warn!(token_url = %self.token_url, "no transport attached, creating a default one for token requests");
            Arc::new(ReqwestTransport::default())
        });
        Arc::clone(fallback)
    }

    /// Attaches the transport used for token requests.
    pub fn set_transport(&mut self, transport: Arc<dyn HttpTransport>) {
        self.transport = Some(transport);
    }

    pub(crate) fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Gets the cached token if available and valid.
    pub async fn get_token(&self) -> Option<OAuth2Token> {
        self.token_cache.get().await
    }

    /// Gets the cached token, valid or not.
    pub async fn current_token(&self) -> Option<OAuth2Token> {
        self.token_cache.current().await
    }

    /// Stores a token in the cache, under this configuration's grace period.
    pub async fn set_token(&self, token: OAuth2Token) {
        self.token_cache
            .set(token.with_grace_period(self.grace_period))
            .await;
    }

    /// Drops the cached token.
    pub async fn clear_token(&self) {
        self.token_cache.clear().await;
    }

    /// Replaces the requested scopes.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::Strategy`] when the scopes exceed the strategy's backstops.
    pub fn set_scopes(&mut self, scopes: Vec<String>) -> Result<(), OAuth2Error> {
        self.scope_strategy.merge(&scopes)?;
        self.scopes = scopes;
        Ok(())
    }

    /// Replaces the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::InvalidTokenEndpoint`] unless the URL is http(s) with a host.
    pub fn set_token_url(&mut self, token_url: impl AsRef<str>) -> Result<(), OAuth2Error> {
        self.token_url = parse_token_url(token_url.as_ref())?;
        Ok(())
    }

    /// Replaces the client secret.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::ConfigurationError`] for an empty secret.
    pub fn set_client_secret(&mut self, secret: impl Into<SecureString>) -> Result<(), OAuth2Error> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(OAuth2Error::configuration("client secret cannot be empty"));
        }
        self.client_secret = Some(secret);
        Ok(())
    }

    fn validate(&self) -> Result<(), OAuth2Error> {
        if self.client_id.trim().is_empty() {
            return Err(OAuth2Error::configuration("client id cannot be empty"));
        }
        if self.grant_type == OAuth2GrantType::ClientCredentials {
            match &self.client_secret {
                None => {
                    return Err(OAuth2Error::configuration(
                        "Client credentials flow requires a client secret",
                    ));
                }
                Some(secret) if secret.is_empty() => {
                    return Err(OAuth2Error::configuration("client secret cannot be empty"));
                }
                Some(_) => {}
            }
        }
        self.scope_strategy.merge(&self.scopes)?;
        Ok(())
    }
}

fn parse_token_url(token_url: &str) -> Result<Url, OAuth2Error> {
    let invalid = |reason: &str| OAuth2Error::InvalidTokenEndpoint {
        url: token_url.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(token_url).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(url)
}

impl fmt::Debug for OAuth2Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Config")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .field("grant_type", &self.grant_type)
            .field("scopes", &self.scopes)
            .field("credential_placement", &self.credential_placement)
            .field("request_format", &self.request_format)
            .field("grace_period", &self.grace_period)
            .field("transport", &self.transport.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for OAuth2 configuration.
#[derive(Clone)]
pub struct OAuth2ConfigBuilder {
    client_id: String,
    client_secret: Option<SecureString>,
    token_url: Url,
    grant_type: OAuth2GrantType,
    scopes: Vec<String>,
    scope_strategy: ScopeStrategy,
    credential_placement: CredentialPlacement,
    request_format: TokenRequestFormat,
    credential_encoding: Arc<dyn CredentialEncoding>,
    token_headers: HeaderMap,
    grace_period: u64,
    token: Option<OAuth2Token>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl OAuth2ConfigBuilder {
    /// Creates a new builder with required parameters.
    ///
    /// The grace period starts from [`GRACE_PERIOD_ENV`] when it is set, and the scope
    /// strategy from its environment limits.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::InvalidTokenEndpoint`] unless the URL is http(s) with a host.
    pub fn new(
        client_id: impl Into<String>,
        token_url: impl AsRef<str>,
    ) -> Result<Self, OAuth2Error> {
        let token_url = parse_token_url(token_url.as_ref())?;

        Ok(Self {
            client_id: client_id.into(),
            client_secret: None,
            token_url,
            grant_type: OAuth2GrantType::ClientCredentials,
            scopes: Vec::new(),
            scope_strategy: ScopeStrategy::default(),
            credential_placement: CredentialPlacement::default(),
            request_format: TokenRequestFormat::default(),
            credential_encoding: Arc::new(BasicCredentialEncoding),
            token_headers: HeaderMap::new(),
            grace_period: DEFAULT_GRACE_PERIOD,
            token: None,
            transport: None,
        }
        .with_grace_period_from_env())
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<SecureString>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Adds a scope.
    #[must_use]
    pub fn add_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.push(scope.into());
        self
    }

    /// Adds multiple scopes.
    #[must_use]
    pub fn add_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Sets the grant type.
    #[must_use]
    pub fn with_grant_type(mut self, grant_type: OAuth2GrantType) -> Self {
        self.grant_type = grant_type;
        self
    }

    /// Sets the scope strategy.
    #[must_use]
    pub fn with_scope_strategy(mut self, strategy: ScopeStrategy) -> Self {
        self.scope_strategy = strategy;
        self
    }

    /// Sends client credentials in the `Authorization` header or in the body.
    #[must_use]
    pub fn with_credential_placement(mut self, placement: CredentialPlacement) -> Self {
        self.credential_placement = placement;
        self
    }

    /// Sets the token request body format.
    #[must_use]
    pub fn with_request_format(mut self, format: TokenRequestFormat) -> Self {
        self.request_format = format;
        self
    }

    /// Replaces the `Authorization` header encoding of token requests.
    #[must_use]
    pub fn with_credential_encoding(mut self, encoding: impl CredentialEncoding + 'static) -> Self {
        self.credential_encoding = Arc::new(encoding);
        self
    }

    /// Adds a header to every token request.
    #[must_use]
    pub fn with_token_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.token_headers.insert(name, value);
        self
    }

    /// Sets the grace period, in seconds.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: u64) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Reads the grace period from [`GRACE_PERIOD_ENV`] through `lookup`.
    ///
    /// Missing or invalid values keep the current setting.
    #[must_use]
    pub fn with_grace_period_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(GRACE_PERIOD_ENV) {
            match raw.trim().parse() {
                Ok(grace_period) => self.grace_period = grace_period,
                Err(err) => warn!(variable = GRACE_PERIOD_ENV, value = %raw, %err, "ignoring invalid grace period"),
            }
        }
        self
    }

    /// Reads the grace period from the process environment.
    #[must_use]
    pub fn with_grace_period_from_env(self) -> Self {
        self.with_grace_period_from(|name| std::env::var(name).ok())
    }

    /// Seeds the cache with a token.
    ///
    /// The token takes the configured grace period.
    #[must_use]
    pub fn with_token(mut self, token: OAuth2Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Attaches the transport used for token requests.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the OAuth2 configuration.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::ConfigurationError`] for an empty client id or a missing secret,
    /// and [`OAuth2Error::Strategy`] when the scopes exceed the strategy's backstops.
    pub fn build(self) -> Result<OAuth2Config, OAuth2Error> {
        let token_cache = match self.token {
            Some(token) => TokenCache::with_token(token.with_grace_period(self.grace_period)),
            None => TokenCache::new(),
        };

        let config = OAuth2Config {
            client_id: self.client_id,
            client_secret: self.client_secret,
            token_url: self.token_url,
            grant_type: self.grant_type,
            scopes: self.scopes,
            scope_strategy: self.scope_strategy,
            credential_placement: self.credential_placement,
            request_format: self.request_format,
            credential_encoding: self.credential_encoding,
            token_headers: self.token_headers,
            grace_period: self.grace_period,
            token_cache,
            transport: self.transport,
            fallback_transport: Arc::default(),
        };
        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for OAuth2ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2ConfigBuilder")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_url", &self.token_url)
            .field("scopes", &self.scopes)
            .field("grant_type", &self.grant_type)
            .finish_non_exhaustive()
    }
}
