use std::sync::Arc;

use headers::{ContentLength, HeaderMapExt};
use http::Method;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

mod builder;
pub use self::builder::ApiClientBuilder;

mod secret;
pub use self::secret::{RedactionContext, SecureString};

mod auth;
pub use self::auth::{Authentication, AuthenticationError, ClientCredentials};

mod flags;
pub use self::flags::Flags;

mod request;
pub use self::request::{ApiRequest, HttpResponse, RequestMetadata};

mod request_id;
pub use self::request_id::{
    REQUEST_ID_HEADER, RequestId, RequestIdGenerator, UuidRequestIdGenerator,
};

mod transport;
pub use self::transport::{HttpTransport, ReqwestTransport, TransportError, TransportErrorKind};

mod strategy;
pub use self::strategy::{
    BasicCredentialEncoding, CoercionError, CoercionStrategy, CredentialEncoding,
    CredentialPlacement, DEFAULT_MAXIMUM_SCOPES, DEFAULT_SCOPE_DELIMITER,
    DEFAULT_SCOPE_LENGTH_BACKSTOP, ErrorStrategy, JsonCoercion, MAXIMUM_SCOPES_ENV, RateLimit,
    RateLimitExceeded, RetryStrategy, RetryStrategyBuilder, SCOPE_LENGTH_BACKSTOP_ENV,
    ScopeInput, ScopeMode, ScopeOutput, ScopeStrategy, SimpleCoercion, StatusErrorStrategy,
    StrategyError, Transient,
};

mod parameters;
pub use self::parameters::{
    ApplierRegistry, BlankRule, BodyApplier, DeprecatedRule, EmptyRule, EnumRule, FormApplier,
    HeaderApplier, ItemsRule, LengthRule, NullRule, ParameterApplier, ParameterConstraint,
    ParameterConstraintBuilder, ParameterDefinition, ParameterDefinitionBuilder,
    ParameterLocation, ParameterValidationError, ParameterValueType, PathApplier, PatternRule,
    QueryApplier, RangeRule, RequestDraft, Rule, TypeRule,
};

pub mod oauth2;
pub use self::oauth2::{
    DEFAULT_GRACE_PERIOD, FlowState, GRACE_PERIOD_ENV, OAuth2Config, OAuth2ConfigBuilder,
    OAuth2Error, OAuth2Flow, OAuth2GrantType, OAuth2Token, SharedOAuth2Config, TokenCache,
    TokenRequestFormat,
};

mod endpoint;
pub use self::endpoint::{EndpointDefinition, EndpointDefinitionBuilder};

mod request_builder;
pub use self::request_builder::RequestBuilder;

mod error;
pub use self::error::ApiClientError;

#[cfg(test)]
mod testing;

/// HTTP client for authenticated calls to a remote API.
///
/// `ApiClient` builds requests from registered [`EndpointDefinition`]s (or ad-hoc paths),
/// authenticates them, and sends them through its [`HttpTransport`] under the configured
/// retry and rate-limit policies. Use [`ApiClientBuilder`] to create instances.
///
/// # Example
///
/// ```rust,no_run
/// use apigate_core::{
///     ApiClient, EndpointDefinition, ParameterConstraint, ParameterDefinition,
///     ParameterValueType,
/// };
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let get_user = EndpointDefinition::builder("get_user", "GET", "/users/{id}")
///     .parameter(ParameterDefinition::path(
///         "id",
///         ParameterConstraint::new(ParameterValueType::Integer),
///     ))
///     .build()?;
///
/// let client = ApiClient::builder()
///     .with_host("api.example.com")
///     .with_endpoint(get_user)
///     .build()?;
///
/// let data = json!({"id": 123}).as_object().cloned().unwrap_or_default();
/// let response = client.request("get_user", None, data).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Thread Safety
///
/// The client is cheap to clone and can be shared between tasks: token refresh is
/// coordinated by the [`OAuth2Flow`], and the rate limit is shared by all clones.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    endpoints: IndexMap<String, Arc<EndpointDefinition>>,
    transport: Arc<dyn HttpTransport>,
    authentication: Option<Authentication>,
    retry: RetryStrategy,
    rate_limit: Option<Arc<RateLimit>>,
    flags: Flags,
    error_strategy: Arc<dyn ErrorStrategy>,
    appliers: ApplierRegistry,
    request_ids: Arc<dyn RequestIdGenerator>,
}

// Create
impl ApiClient {
    /// Starts a builder with the default configuration.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// The base URL request paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The behavior flags.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// Registers a named endpoint, replacing one with the same name.
    pub fn register_endpoint(&mut self, endpoint: EndpointDefinition) {
        let name = endpoint.name().to_string();
        if self
            .endpoints
            .insert(name.clone(), Arc::new(endpoint))
            .is_some()
        {
            warn!(endpoint = %name, "endpoint definition replaced");
        }
    }

    /// The endpoint registered under `name`.
    pub fn endpoint(&self, name: &str) -> Option<&EndpointDefinition> {
        self.endpoints.get(name).map(|endpoint| &**endpoint)
    }
}

// Build
impl ApiClient {
    fn request_builder(&self, endpoint: Arc<EndpointDefinition>) -> RequestBuilder {
        RequestBuilder::new(endpoint, self.base_url.clone())
            .with_appliers(self.appliers.clone())
            .with_request_ids(Arc::clone(&self.request_ids))
            .with_flags(self.flags)
    }

    /// Builds the request of the endpoint registered under `name`, without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::UnknownEndpoint`] when no endpoint has this name, and
    /// [`ApiClientError::Parameter`] when `data` does not satisfy the declared parameters.
    pub fn prepare(
        &self,
        name: &str,
        credentials: Option<ClientCredentials>,
        data: Map<String, Value>,
    ) -> Result<ApiRequest, ApiClientError> {
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| ApiClientError::UnknownEndpoint {
                name: name.to_string(),
            })?;
        self.request_builder(Arc::clone(endpoint))
            .build(credentials, data)
    }

    /// Builds and sends the request of the endpoint registered under `name`.
    ///
    /// `credentials` override the configured OAuth2 client when a token must be acquired.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::prepare`] and [`Self::send`].
    pub async fn request(
        &self,
        name: &str,
        credentials: Option<ClientCredentials>,
        data: Map<String, Value>,
    ) -> Result<HttpResponse, ApiClientError> {
        let request = self.prepare(name, credentials, data)?;
        self.send(request).await
    }
}

// Send
impl ApiClient {
    /// Sends a built request.
    ///
    /// The rate limit is consumed once, then authentication and transport run under the
    /// retry policy. With [`Flags::USE_DEFAULT_POST_RESPONSE_HOOK`] the final response goes
    /// through the error strategy.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::InsecureTransport`] for a non-HTTPS URL under [`Flags::FORCE_HTTPS`]
    /// - [`ApiClientError::RateLimitExceeded`] when the budget is exhausted
    /// - [`ApiClientError::OAuth2`] or [`ApiClientError::Authentication`] when the request
    ///   cannot be authenticated
    /// - [`ApiClientError::Transport`] once retries are exhausted
    /// - the error of the error strategy
    pub async fn send(&self, request: ApiRequest) -> Result<HttpResponse, ApiClientError> {
        if self.flags.refuses_scheme(request.url().scheme()) {
            return Err(ApiClientError::InsecureTransport {
                url: request.url().to_string(),
            });
        }
        if let Some(rate_limit) = &self.rate_limit {
            rate_limit.check()?;
        }

        let response = self.retry.run(|| self.dispatch(request.clone())).await?;
        debug!(
            method = %request.method(),
            url = %request.url(),
            status = response.status().as_u16(),
            "response received"
        );

        if self.flags.contains(Flags::USE_DEFAULT_POST_RESPONSE_HOOK) {
            self.error_strategy.apply(&response)?;
        }
        Ok(response)
    }

    async fn dispatch(&self, mut request: ApiRequest) -> Result<HttpResponse, ApiClientError> {
        match &self.authentication {
            Some(Authentication::OAuth2(flow)) => {
                flow.authenticate(request, |request| self.transport.send(request))
                    .await
            }
            Some(authentication) => {
                let (name, value) = authentication.to_header()?;
                request.headers_mut().insert(name, value);
                Ok(self.transport.send(request).await?)
            }
            None => Ok(self.transport.send(request).await?),
        }
    }

    /// Sends an ad-hoc request to `path`, with an optional JSON body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::send`], and [`ApiClientError::Parameter`] when `path`
    /// does not resolve to a valid URL.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<HttpResponse, ApiClientError> {
        let endpoint = Arc::new(EndpointDefinition::ad_hoc(method, path));
        let mut request = self.request_builder(endpoint).build(None, Map::new())?;
        if let Some(body) = body {
            let bytes = serde_json::to_vec(&body)?;
            request
                .headers_mut()
                .typed_insert(ContentLength(u64::try_from(bytes.len()).unwrap_or(u64::MAX)));
            request = request.with_body(bytes);
        }
        self.send(request).await
    }

    /// `GET` on `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn get(&self, path: &str, body: Option<Value>) -> Result<HttpResponse, ApiClientError> {
        self.call(Method::GET, path, body).await
    }

    /// `POST` on `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<HttpResponse, ApiClientError> {
        self.call(Method::POST, path, body).await
    }

    /// `PUT` on `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn put(&self, path: &str, body: Option<Value>) -> Result<HttpResponse, ApiClientError> {
        self.call(Method::PUT, path, body).await
    }

    /// `PATCH` on `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn patch(&self, path: &str, body: Option<Value>) -> Result<HttpResponse, ApiClientError> {
        self.call(Method::PATCH, path, body).await
    }

    /// `DELETE` on `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::call`].
    pub async fn delete(&self, path: &str, body: Option<Value>) -> Result<HttpResponse, ApiClientError> {
        self.call(Method::DELETE, path, body).await
    }
}
