//! # Apigate Core
//!
//! Authenticated, validated HTTP calls to remote APIs.
//!
//! The crate has two halves that meet in the [`ApiClient`]:
//! - **OAuth2 token lifecycle**: tokens acquired from a token endpoint, cached with a grace
//!   period, refreshed by a single task at a time, and retried once after a `401`
//!   (see [`OAuth2Flow`])
//! - **Parameter pipeline**: typed [`ParameterDefinition`]s whose [`ParameterConstraint`]s
//!   coerce and validate raw values before an applier writes them into the query, headers,
//!   path or body of the request (see [`EndpointDefinition`] and [`RequestBuilder`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apigate_core::{ApiClient, OAuth2Config, OAuth2Flow};
//! use http::uri::Scheme;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let oauth2 = OAuth2Config::client_credentials(
//!     "client-id",
//!     "client-secret",
//!     "https://auth.example.com/oauth/token",
//! )?
//! .add_scopes(["read:users", "write:users"])
//! .build()?;
//!
//! let client = ApiClient::builder()
//!     .with_scheme(Scheme::HTTPS)
//!     .with_host("api.example.com")
//!     .with_port(443)
//!     .with_oauth2(OAuth2Flow::new(oauth2))
//!     .build()?;
//!
//! let users = client.get("/users", None).await?;
//! println!("{}", users.text());
//! # Ok(())
//! # }
//! ```
//!
//! ## Working with Parameters
//!
//! A constraint coerces the raw value to its declared type, then runs its rules in order:
//!
//! ```rust
//! use apigate_core::{ParameterConstraint, ParameterValidationError, ParameterValueType};
//! use serde_json::json;
//!
//! # fn example() -> Result<(), ParameterValidationError> {
//! let page = ParameterConstraint::builder(ParameterValueType::Integer)
//!     .minimum(1.0)
//!     .maximum(100.0)
//!     .build()?;
//!
//! assert_eq!(page.coerce("page", &json!("42"))?, json!(42));
//! assert!(page.coerce("page", &json!(0)).is_err());
//! # Ok(())
//! # }
//! ```
//!
//! Endpoints declare where each parameter goes:
//!
//! ```rust
//! use apigate_core::{
//!     ApiClient, EndpointDefinition, ParameterConstraint, ParameterDefinition,
//!     ParameterValueType,
//! };
//! use serde_json::json;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let search = EndpointDefinition::builder("search_users", "GET", "/users")
//!     .parameter(ParameterDefinition::query(
//!         "q",
//!         ParameterConstraint::new(ParameterValueType::String),
//!     ))
//!     .parameter(ParameterDefinition::header(
//!         "X-Tenant",
//!         ParameterConstraint::new(ParameterValueType::String),
//!     ))
//!     .build()?;
//!
//! let client = ApiClient::builder()
//!     .with_host("api.example.com")
//!     .with_endpoint(search)
//!     .build()?;
//!
//! let data = json!({"q": "ada lovelace", "X-Tenant": "acme"});
//! let request = client.prepare("search_users", None, data.as_object().cloned().unwrap_or_default())?;
//! assert_eq!(request.url().query(), Some("q=ada%20lovelace"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every concern has its own error type, all aggregated by [`ApiClientError`]:
//! - [`OAuth2Error`] - token acquisition, refresh and validity
//! - [`ParameterValidationError`] - coercion, validation and placement of parameters
//! - [`TransportError`] - no response was received
//! - [`StrategyError`] - invalid strategy configuration
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]. Secrets are wrapped in [`SecureString`] and never
//! rendered; upstream error bodies are masked with a [`RedactionContext`] before logging.

mod client;

// Public API - only expose user-facing types and functions
pub use self::client::oauth2;
pub use self::client::{
    ApiClient, ApiClientBuilder, ApiClientError, ApiRequest, ApplierRegistry, Authentication,
    AuthenticationError, BasicCredentialEncoding, BlankRule, BodyApplier, ClientCredentials,
    CoercionError, CoercionStrategy, CredentialEncoding, CredentialPlacement,
    DEFAULT_GRACE_PERIOD, DEFAULT_MAXIMUM_SCOPES, DEFAULT_SCOPE_DELIMITER,
    DEFAULT_SCOPE_LENGTH_BACKSTOP, DeprecatedRule, EmptyRule, EndpointDefinition,
    EndpointDefinitionBuilder, EnumRule, ErrorStrategy, Flags, FlowState, FormApplier,
    GRACE_PERIOD_ENV, HeaderApplier, HttpResponse, HttpTransport, ItemsRule, JsonCoercion,
    LengthRule, MAXIMUM_SCOPES_ENV, NullRule, OAuth2Config, OAuth2ConfigBuilder, OAuth2Error,
    OAuth2Flow, OAuth2GrantType, OAuth2Token, ParameterApplier, ParameterConstraint,
    ParameterConstraintBuilder, ParameterDefinition, ParameterDefinitionBuilder,
    ParameterLocation, ParameterValidationError, ParameterValueType, PathApplier, PatternRule,
    QueryApplier, REQUEST_ID_HEADER, RangeRule, RateLimit, RateLimitExceeded, RedactionContext,
    RequestBuilder, RequestDraft, RequestId, RequestIdGenerator, RequestMetadata,
    ReqwestTransport, RetryStrategy, RetryStrategyBuilder, Rule, SCOPE_LENGTH_BACKSTOP_ENV,
    ScopeInput, ScopeMode, ScopeOutput, ScopeStrategy, SecureString, SharedOAuth2Config,
    SimpleCoercion, StatusErrorStrategy, StrategyError, TokenCache, TokenRequestFormat,
    Transient, TransportError, TransportErrorKind, TypeRule, UuidRequestIdGenerator,
};
