use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use http::uri::{PathAndQuery, Scheme};
use indexmap::IndexMap;
use url::Url;

use super::parameters::ApplierRegistry;
use super::strategy::{ErrorStrategy, RateLimit, RetryStrategy, StatusErrorStrategy};
use super::{
    ApiClient, ApiClientError, Authentication, EndpointDefinition, Flags, HttpTransport,
    OAuth2Flow, ReqwestTransport, RequestIdGenerator, UuidRequestIdGenerator,
};

/// Builder for creating `ApiClient` instances with comprehensive configuration options.
///
/// `ApiClientBuilder` provides a fluent interface for configuring all aspects of an API client,
/// including network settings, authentication, the transport, and the retry and rate-limit
/// policies wrapped around every send.
///
/// # Default Configuration
///
/// - **Scheme**: HTTP (use `with_scheme()` to change to HTTPS)
/// - **Host**: 127.0.0.1 (localhost)
/// - **Port**: 80 (standard HTTP port)
/// - **Base path**: None (requests go to root path)
/// - **Transport**: [`ReqwestTransport`] with a default `reqwest::Client`
/// - **Authentication**: None
/// - **Retry**: [`RetryStrategy::default()`] (3 retries of transient failures)
/// - **Rate limit**: None
/// - **Flags**: empty
///
/// # Example
///
/// ```rust
/// use apigate_core::{ApiClient, Flags, RetryStrategy};
/// use http::uri::Scheme;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::builder()
///     .with_scheme(Scheme::HTTPS)
///     .with_host("api.example.com")
///     .with_port(443)
///     .with_base_path("/v1")?
///     .with_retry(RetryStrategy::none())
///     .with_flags(Flags::FORCE_HTTPS | Flags::USE_DEFAULT_POST_RESPONSE_HOOK)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClientBuilder {
    scheme: Scheme,
    host: String,
    port: u16,
    base_path: Option<PathAndQuery>,
    base_url: Option<Url>,
    transport: Arc<dyn HttpTransport>,
    authentication: Option<Authentication>,
    endpoints: Vec<EndpointDefinition>,
    retry: RetryStrategy,
    rate_limit: Option<Arc<RateLimit>>,
    flags: Flags,
    error_strategy: Arc<dyn ErrorStrategy>,
    appliers: ApplierRegistry,
    request_ids: Arc<dyn RequestIdGenerator>,
}

impl ApiClientBuilder {
    /// Builds the final `ApiClient` instance with all configured settings.
    ///
    /// This method consumes the builder and creates an `ApiClient` ready for making API calls.
    /// An OAuth2 flow configured without its own transport requests its tokens through the
    /// client transport.
    ///
    /// # Errors
    ///
    /// This method can fail if:
    /// - The base URL cannot be constructed from the provided scheme, host, port and path
    ///   ([`ApiClientError::InvalidBaseUrl`])
    /// - [`Flags::FORCE_HTTPS`] is set and the base URL is not HTTPS
    ///   ([`ApiClientError::InsecureTransport`])
    ///
    /// # Example
    ///
    /// ```rust
    /// use apigate_core::ApiClient;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_host("api.example.com")
    ///     .with_base_path("/v1")?
    ///     .build()?;  // This consumes the builder
    ///
    /// // Now you can use the client for API calls
    /// # Ok(())
    /// # }
    /// ```
    pub fn build(self) -> Result<ApiClient, ApiClientError> {
        let Self {
            scheme,
            host,
            port,
            base_path,
            base_url,
            transport,
            authentication,
            endpoints,
            retry,
            rate_limit,
            flags,
            error_strategy,
            appliers,
            request_ids,
        } = self;

        let base_url = match base_url {
            Some(base_url) => base_url,
            None => {
                let path = base_path.as_ref().map_or("/", PathAndQuery::path);
                let raw = format!("{scheme}://{host}:{port}{path}");
                parse_base_url(&raw)?
            }
        };
        if flags.refuses_scheme(base_url.scheme()) {
            return Err(ApiClientError::InsecureTransport {
                url: base_url.to_string(),
            });
        }

        let authentication = authentication.map(|authentication| match authentication {
            Authentication::OAuth2(flow) => {
                Authentication::OAuth2(flow.with_default_transport(Arc::clone(&transport)))
            }
            other => other,
        });

        let endpoints: IndexMap<_, _> = endpoints
            .into_iter()
            .map(|endpoint| (endpoint.name().to_string(), Arc::new(endpoint)))
            .collect();

        Ok(ApiClient {
            base_url,
            endpoints,
            transport,
            authentication,
            retry,
            rate_limit,
            flags,
            error_strategy,
            appliers,
            request_ids,
        })
    }

    /// Sets the HTTP scheme (protocol) for the API client.
    ///
    /// # Default
    ///
    /// If not specified, defaults to `Scheme::HTTP`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use apigate_core::ApiClient;
    /// use http::uri::Scheme;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_scheme(Scheme::HTTPS)  // Use HTTPS for secure connections
    ///     .with_host("api.example.com")
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the hostname for the API client.
    ///
    /// # Default
    ///
    /// If not specified, defaults to `"127.0.0.1"` (localhost).
    ///
    /// # Example
    ///
    /// ```rust
    /// use apigate_core::ApiClient;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_host("api.example.com")     // Domain name
    ///     .build()?;
    ///
    /// let client = ApiClient::builder()
    ///     .with_host("192.168.1.10")       // IP address
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port number for the API client.
    ///
    /// # Default
    ///
    /// If not specified, defaults to `80` (standard HTTP port).
    ///
    /// # Example
    ///
    /// ```rust
    /// use apigate_core::ApiClient;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_host("localhost")
    ///     .with_port(8080)             // Common development port
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the base path for all API requests.
    ///
    /// This path will be prepended to all request paths. The path must be valid
    /// according to URI standards (no spaces, properly encoded, etc.).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use apigate_core::ApiClient;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_host("api.example.com")
    ///     .with_base_path("/v1")?              // All requests will start with /v1
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError::InvalidBaseUrl` if the path contains invalid characters
    /// (such as spaces) or cannot be parsed as a valid URI path.
    pub fn with_base_path<P>(mut self, base_path: P) -> Result<Self, ApiClientError>
    where
        P: TryInto<PathAndQuery>,
        P::Error: Debug + 'static,
    {
        let base_path = base_path
            .try_into()
            .map_err(|err| ApiClientError::InvalidBaseUrl {
                error: format!("{err:?}"),
            })?;
        self.base_path = Some(base_path);
        Ok(self)
    }

    /// Sets the complete base URL, replacing scheme, host, port and base path.
    ///
    /// # Example
    ///
    /// ```rust
    /// use apigate_core::ApiClient;
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_base_url("https://api.example.com/v2")?
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `ApiClientError::InvalidBaseUrl` unless `base_url` is an absolute
    /// `http` or `https` URL with a host.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> Result<Self, ApiClientError> {
        self.base_url = Some(parse_base_url(base_url.as_ref())?);
        Ok(self)
    }

    /// Sets the transport every request (token requests included) goes through.
    ///
    /// Use it to tune the `reqwest` client or to plug another HTTP stack.
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::Duration;
    ///
    /// use apigate_core::{ApiClient, ReqwestTransport};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = ApiClient::builder()
    ///     .with_transport(ReqwestTransport::with_timeout(Duration::from_secs(5))?)
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn with_transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Arc::new(transport);
        self
    }

    /// Sets the authentication configuration for the API client.
    ///
    /// This authentication will be applied to all requests made by the client.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use apigate_core::{ApiClient, Authentication};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// // Bearer token authentication
    /// let client = ApiClient::builder()
    ///     .with_authentication(Authentication::Bearer("my-api-token".into()))
    ///     .build()?;
    ///
    /// // API key authentication
    /// let client = ApiClient::builder()
    ///     .with_authentication(Authentication::ApiKey {
    ///         header_name: "X-API-Key".to_string(),
    ///         key: "secret-key".into(),
    ///     })
    ///     .build()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Authentication Types
    ///
    /// - **Bearer**: Adds `Authorization: Bearer <token>` header
    /// - **Basic**: Adds `Authorization: Basic <base64(username:password)>` header
    /// - **ApiKey**: Adds custom header with API key
    /// - **OAuth2**: Acquires, caches and refreshes bearer tokens, see [`Self::with_oauth2`]
    #[must_use]
    pub fn with_authentication(mut self, authentication: Authentication) -> Self {
        self.authentication = Some(authentication);
        self
    }

    /// Authenticates requests with OAuth2 bearer tokens.
    ///
    /// Shorthand for `with_authentication(Authentication::OAuth2(flow))`.
    #[must_use]
    pub fn with_oauth2(self, flow: OAuth2Flow) -> Self {
        self.with_authentication(Authentication::OAuth2(flow))
    }

    /// Registers a named endpoint, callable with [`ApiClient::request`].
    ///
    /// A later endpoint with the same name replaces the earlier one.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: EndpointDefinition) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Sets the retry policy for transient transport failures.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Limits the number of requests sent in a sliding window.
    ///
    /// Sends over the budget fail with [`ApiClientError::RateLimitExceeded`].
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(Arc::new(rate_limit));
        self
    }

    /// Sets the behavior flags.
    #[must_use]
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    /// Replaces the post-response hook used with [`Flags::USE_DEFAULT_POST_RESPONSE_HOOK`].
    #[must_use]
    pub fn with_error_strategy(mut self, strategy: impl ErrorStrategy + 'static) -> Self {
        self.error_strategy = Arc::new(strategy);
        self
    }

    /// Replaces the parameter appliers, e.g. to support multipart bodies.
    #[must_use]
    pub fn with_appliers(mut self, appliers: ApplierRegistry) -> Self {
        self.appliers = appliers;
        self
    }

    /// Replaces the generator of `X-Request-ID` values.
    #[must_use]
    pub fn with_request_id_generator(mut self, generator: impl RequestIdGenerator + 'static) -> Self {
        self.request_ids = Arc::new(generator);
        self
    }
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self {
            scheme: Scheme::HTTP,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST).to_string(),
            port: 80,
            base_path: None,
            base_url: None,
            transport: Arc::new(ReqwestTransport::default()),
            authentication: None,
            endpoints: Vec::new(),
            retry: RetryStrategy::default(),
            rate_limit: None,
            flags: Flags::empty(),
            error_strategy: Arc::new(StatusErrorStrategy),
            appliers: ApplierRegistry::default(),
            request_ids: Arc::new(UuidRequestIdGenerator),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ApiClientError> {
    let url = Url::parse(raw).map_err(|err| ApiClientError::InvalidBaseUrl {
        error: format!("{raw}: {err}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(ApiClientError::InvalidBaseUrl {
            error: format!("{raw}: expected an http or https URL with a host"),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::client::testing::{MockTransport, json_response, token_response};
    use crate::client::{OAuth2Config, SecureString};

    #[test]
    fn test_default_builder_creates_localhost_http_client() {
        let client = ApiClientBuilder::default()
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"http://127.0.0.1/");
    }

    #[test]
    fn test_builder_with_custom_scheme_host_and_port() {
        let client = ApiClientBuilder::default()
            .with_scheme(Scheme::HTTPS)
            .with_host("api.example.com")
            .with_port(8443)
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"https://api.example.com:8443/");
    }

    #[test]
    fn test_builder_with_valid_base_path() {
        let client = ApiClientBuilder::default()
            .with_base_path("/api/v1")
            .expect("valid base path")
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"http://127.0.0.1/api/v1");
    }

    #[test]
    fn test_builder_with_invalid_base_path() {
        let result = ApiClientBuilder::default().with_base_path("invalid path with spaces");
        assert!(matches!(result, Err(ApiClientError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_builder_with_base_url_overrides_parts() {
        let client = ApiClientBuilder::default()
            .with_host("ignored.example.com")
            .with_base_url("https://api.example.com/v2")
            .expect("valid base url")
            .build()
            .expect("should build client");

        insta::assert_snapshot!(client.base_url, @"https://api.example.com/v2");
    }

    #[test]
    fn test_builder_rejects_non_http_base_url() {
        let result = ApiClientBuilder::default().with_base_url("ftp://files.example.com");
        assert!(matches!(result, Err(ApiClientError::InvalidBaseUrl { .. })));
    }

    #[test]
    fn test_builder_refuses_http_when_https_forced() {
        let result = ApiClientBuilder::default()
            .with_flags(Flags::FORCE_HTTPS)
            .build();

        let error = result.expect_err("insecure");
        insta::assert_snapshot!(error.to_string(), @"Insecure transport refused for http://127.0.0.1/: HTTPS is required");
    }

    #[test]
    fn test_builder_allows_insecure_override() {
        let client = ApiClientBuilder::default()
            .with_flags(Flags::FORCE_HTTPS | Flags::ALLOW_INSECURE)
            .build();

        assert!(client.is_ok());
    }

    #[test]
    fn test_builder_with_authentication_bearer() {
        let client = ApiClientBuilder::default()
            .with_authentication(Authentication::Bearer(SecureString::from("test-token")))
            .build()
            .expect("should build client");

        assert!(matches!(
            client.authentication,
            Some(Authentication::Bearer(ref token)) if token.as_str() == "test-token"
        ));
    }

    #[test]
    fn test_builder_without_authentication() {
        let client = ApiClientBuilder::default()
            .build()
            .expect("should build client");

        assert!(client.authentication.is_none());
    }

    #[test]
    fn test_builder_registers_endpoints_by_name() {
        let client = ApiClientBuilder::default()
            .with_endpoint(
                EndpointDefinition::builder("list_users", "GET", "/users")
                    .build()
                    .expect("valid endpoint"),
            )
            .with_endpoint(
                EndpointDefinition::builder("list_users", "GET", "/v2/users")
                    .build()
                    .expect("valid endpoint"),
            )
            .build()
            .expect("should build client");

        assert_eq!(client.endpoints.len(), 1);
        assert_eq!(
            client.endpoints.get("list_users").map(|endpoint| endpoint.path()),
            Some("/v2/users")
        );
    }

    #[tokio::test]
    async fn test_builder_shares_transport_with_oauth2_flow() {
        let transport = MockTransport::new(|request| match request.url().path() {
            "/token" => Ok(token_response("shared-token", 3600)),
            _ => Ok(json_response(StatusCode::OK, &json!({"ok": true}))),
        });
        let config = OAuth2Config::client_credentials("id", "secret", "http://auth.local/token")
            .expect("valid url")
            .build()
            .expect("valid config");

        let client = ApiClientBuilder::default()
            .with_transport(transport.clone())
            .with_oauth2(OAuth2Flow::new(config))
            .build()
            .expect("should build client");
        client.get("/me", None).await.expect("response");

        assert_eq!(transport.calls_to("/token"), 1);
        assert_eq!(transport.calls_to("/me"), 1);
    }
}
