//! OAuth2 bearer-token lifecycle for outbound API requests.
//!
//! Tokens are acquired from the token endpoint, cached per [`OAuth2Config`],
//! refreshed by at most one task at a time, and attached to requests by an [`OAuth2Flow`].
//!
//! # Supported Flows
//!
//! - **Client Credentials**: Machine-to-machine authentication, refreshed with the
//!   `refresh_token` grant when the endpoint issues one
//! - **Pre-Acquired Token**: Use externally obtained tokens (environment variables, etc.)
//!
//! # Example
//!
//! ```rust,no_run
//! use apigate_core::{ApiClient, OAuth2Config, OAuth2Flow};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let oauth2 = OAuth2Config::client_credentials(
//!     "client-id",
//!     "client-secret",
//!     "https://auth.example.com/token",
//! )?
//! .add_scope("read:users")
//! .build()?;
//!
//! let client = ApiClient::builder()
//!     .with_host("api.example.com")
//!     .with_oauth2(OAuth2Flow::new(oauth2))
//!     .build()?;
//!
//! // Token acquired on first request
//! let response = client.get("/users", None).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod flow;
mod provider;
mod token;

pub use self::config::{
    GRACE_PERIOD_ENV, OAuth2Config, OAuth2ConfigBuilder, OAuth2GrantType, SharedOAuth2Config,
    TokenRequestFormat,
};
pub use self::error::OAuth2Error;
pub use self::flow::{FlowState, OAuth2Flow};
pub use self::token::{DEFAULT_GRACE_PERIOD, OAuth2Token, TokenCache};
