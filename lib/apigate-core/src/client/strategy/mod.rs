//! Small pluggable policies used by the token exchange and the request pipeline.

mod coercion;
mod credentials;
mod error;
mod rate_limit;
mod retry;
mod scope;
mod status;

pub use self::coercion::{CoercionError, CoercionStrategy, JsonCoercion, SimpleCoercion};
pub use self::credentials::{BasicCredentialEncoding, CredentialEncoding, CredentialPlacement};
pub use self::error::StrategyError;
pub use self::rate_limit::{RateLimit, RateLimitExceeded};
pub use self::retry::{RetryStrategy, RetryStrategyBuilder, Transient};
pub use self::scope::{
    DEFAULT_MAXIMUM_SCOPES, DEFAULT_SCOPE_DELIMITER, DEFAULT_SCOPE_LENGTH_BACKSTOP,
    MAXIMUM_SCOPES_ENV, SCOPE_LENGTH_BACKSTOP_ENV, ScopeInput, ScopeMode, ScopeOutput,
    ScopeStrategy,
};
pub use self::status::{ErrorStrategy, StatusErrorStrategy};
