//! Bearer authentication of outbound requests with single-flight token refresh.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use http::StatusCode;
use http::header::AUTHORIZATION;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::config::{OAuth2Config, OAuth2GrantType, SharedOAuth2Config};
use super::error::OAuth2Error;
use super::token::OAuth2Token;
use crate::client::auth::bearer_header;
use crate::client::{
    ApiClientError, ApiRequest, ClientCredentials, HttpResponse, HttpTransport, TransportError,
};

type SharedRefresh = Shared<BoxFuture<'static, Result<OAuth2Token, OAuth2Error>>>;

/// Observable state of an [`OAuth2Flow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum FlowState {
    /// No token was acquired yet.
    #[display("no token")]
    NoToken,
    /// A refresh is in flight.
    #[display("refreshing")]
    Refreshing,
    /// The cached token is usable.
    #[display("valid")]
    Valid,
    /// The cached token is past its grace window.
    #[display("expired")]
    Expired,
}

/// Attaches bearer tokens to requests, refreshing them when needed.
///
/// At most one refresh runs at a time per flow: concurrent callers that need a new token
/// wait for the refresh in flight. The refresh runs as its own task, so a caller giving up
/// does not cancel it. A `401` response triggers one forced refresh and one resend.
#[derive(Clone)]
pub struct OAuth2Flow {
    config: SharedOAuth2Config,
    inflight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl OAuth2Flow {
    /// Creates a flow over `config`.
    pub fn new(config: impl Into<SharedOAuth2Config>) -> Self {
        Self {
            config: config.into(),
            inflight: Arc::default(),
        }
    }

    /// The configuration.
    pub fn config(&self) -> &OAuth2Config {
        &self.config
    }

    /// Uses `transport` for token requests unless the configuration already has one.
    pub(crate) fn with_default_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        if !self.config.has_transport() {
            let mut config = OAuth2Config::clone(&self.config);
            config.set_transport(transport);
            self.config = Arc::new(config);
        }
        self
    }

    /// Current state.
    pub async fn state(&self) -> FlowState {
        if self.inflight.lock().await.is_some() {
            return FlowState::Refreshing;
        }
        match self.config.current_token().await {
            None => FlowState::NoToken,
            Some(token) if token.is_valid() => FlowState::Valid,
            Some(_) => FlowState::Expired,
        }
    }

    /// A valid token, refreshed first when needed.
    ///
    /// # Errors
    ///
    /// Returns the [`OAuth2Error`] of the refresh.
    pub async fn valid_token(&self) -> Result<OAuth2Token, OAuth2Error> {
        self.token(None, None).await
    }

    /// Replaces the current token with a fresh one, whatever its expiry.
    ///
    /// # Errors
    ///
    /// Returns the [`OAuth2Error`] of the refresh.
    pub async fn force_refresh(&self) -> Result<OAuth2Token, OAuth2Error> {
        let current = self.config.current_token().await;
        let rejected = current.as_ref().map_or("", OAuth2Token::secret);
        self.token(Some(rejected), None).await
    }

    /// Sends `request` with a bearer token, retrying once with a fresh token after a `401`.
    ///
    /// Credentials in the request metadata replace the configured ones when a token is needed.
    /// A second `401` is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`ApiClientError::OAuth2`] when no token can be obtained, and the transport
    /// error of `send`.
    pub async fn authenticate<F, Fut>(
        &self,
        request: ApiRequest,
        send: F,
    ) -> Result<HttpResponse, ApiClientError>
    where
        F: Fn(ApiRequest) -> Fut,
        Fut: Future<Output = Result<HttpResponse, TransportError>>,
    {
        let credentials = request.metadata().credentials().cloned();

        let token = self.token(None, credentials.as_ref()).await?;
        let response = send(with_bearer(request.clone(), &token)?).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(url = %request.url(), "request rejected with 401, forcing token refresh");
        let token = self.token(Some(token.secret()), credentials.as_ref()).await?;
        let response = send(with_bearer(request, &token)?).await?;
        Ok(response)
    }

    /// Returns the cached token when usable, otherwise joins or starts a refresh.
    ///
    /// `rejected` is a token the server refused: it is never served from the cache.
    async fn token(
        &self,
        rejected: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> Result<OAuth2Token, OAuth2Error> {
        if rejected.is_none()
            && let Some(token) = self.config.get_token().await
        {
            return Ok(token);
        }

        let refresh = {
            let mut slot = self.inflight.lock().await;
            if let Some(refresh) = slot.as_ref() {
                debug!("joining token refresh in flight");
                refresh.clone()
            } else {
                // Another caller may have refreshed while we were waiting for the slot.
                let cached = self.config.get_token().await;
                if let Some(token) = cached.filter(|token| rejected != Some(token.secret())) {
                    return Ok(token);
                }
                debug!(forced = rejected.is_some(), "token refresh started");
                let refresh = self.spawn_refresh(credentials.cloned());
                *slot = Some(refresh.clone());
                refresh
            }
        };
        refresh.await
    }

    fn spawn_refresh(&self, credentials: Option<ClientCredentials>) -> SharedRefresh {
        let config = Arc::clone(&self.config);
        let inflight = Arc::clone(&self.inflight);
        let handle = tokio::spawn(async move {
            let outcome = renew(&config, credentials.as_ref()).await;
            if let Ok(token) = &outcome {
                config.set_token(token.clone()).await;
            }
            inflight.lock().await.take();
            outcome
        });

        async move {
            handle.await.unwrap_or_else(|err| {
                Err(OAuth2Error::token_invalid(format!(
                    "token refresh task failed: {err}"
                )))
            })
        }
        .boxed()
        .shared()
    }
}

/// Uses the refresh token while the current token allows it, otherwise requests a new one.
async fn renew(
    config: &OAuth2Config,
    credentials: Option<&ClientCredentials>,
) -> Result<OAuth2Token, OAuth2Error> {
    let current = config.current_token().await;
    let refreshable = current
        .as_ref()
        .filter(|token| token.refresh_token().is_some() && !token.is_expired());

    let Some(current) = refreshable else {
        return OAuth2Token::request_new_with(config, credentials).await;
    };
    match current.refresh_with(config, credentials).await {
        Ok(token) => Ok(token),
        Err(error)
            if config.grant_type() == OAuth2GrantType::ClientCredentials
                && !matches!(error, OAuth2Error::Strategy(_)) =>
        {
            warn!(%error, "token refresh failed, requesting a new token");
            OAuth2Token::request_new_with(config, credentials).await
        }
        Err(error) => Err(error),
    }
}

fn with_bearer(mut request: ApiRequest, token: &OAuth2Token) -> Result<ApiRequest, ApiClientError> {
    let value = bearer_header(token.secret())?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

impl fmt::Debug for OAuth2Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Flow")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
