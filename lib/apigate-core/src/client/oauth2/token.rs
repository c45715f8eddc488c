//! OAuth2 token types and caching.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::OAuth2Error;

/// Default safety margin subtracted from the expiry, in seconds.
pub const DEFAULT_GRACE_PERIOD: u64 = 60;

/// Default token type.
pub(crate) const BEARER: &str = "Bearer";

fn default_token_type() -> String {
    BEARER.to_string()
}

fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD
}

/// An OAuth2 access token with expiration tracking.
///
/// A token never changes once built: a refresh produces a new token.
/// A token without `expires_in` is considered expired.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop, Serialize, Deserialize)]
pub struct OAuth2Token {
    access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Vec<String>,
    #[zeroize(skip)]
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
    #[serde(default = "default_grace_period")]
    grace_period: u64,
}

impl OAuth2Token {
    /// Creates a token without expiry information, created now.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            token_type: default_token_type(),
            expires_in: None,
            scope: Vec::new(),
            created_at: Utc::now(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Creates a token expiring `expires_in` from now.
    pub fn with_expiry(access_token: impl Into<String>, expires_in: Duration) -> Self {
        Self::new(access_token).with_expires_in(expires_in.as_secs())
    }

    /// Sets the lifetime in seconds, counted from the creation instant.
    #[must_use]
    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = Some(expires_in);
        self
    }

    /// Sets the refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Sets the granted scopes.
    #[must_use]
    pub fn with_scope(mut self, scope: Vec<String>) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the token type.
    #[must_use]
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Sets the grace period, in seconds.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: u64) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Sets the creation instant.
    #[must_use]
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// The access token, only when it is usable.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::TokenRevoked`] for an empty token and
    /// [`OAuth2Error::TokenExpired`] once the grace window is reached.
    pub fn access_token(&self) -> Result<&str, OAuth2Error> {
        if self.is_revoked() {
            return Err(OAuth2Error::TokenRevoked);
        }
        if self.is_expired() {
            return Err(OAuth2Error::token_expired("access token is past its grace window"));
        }
        Ok(&self.access_token)
    }

    /// The raw access token, whatever its state.
    pub fn secret(&self) -> &str {
        &self.access_token
    }

    /// Returns the refresh token if available.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// The token type, usually `Bearer`.
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime in seconds, as announced by the token endpoint.
    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    /// Granted scopes.
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Creation instant.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Grace period, in seconds.
    pub fn grace_period(&self) -> u64 {
        self.grace_period
    }

    /// `created_at + expires_in`, when known and representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let seconds = i64::try_from(self.expires_in?).ok()?;
        let lifetime = TimeDelta::try_seconds(seconds)?;
        self.created_at.checked_add_signed(lifetime)
    }

    /// `true` when `now` is past `expires_at - grace_period`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.expires_in.is_none() {
            return true;
        }
        // Unrepresentable expiry is in the far future.
        let Some(expires_at) = self.expires_at() else {
            return false;
        };
        let grace = i64::try_from(self.grace_period)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let threshold = expires_at
            .checked_sub_signed(grace)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        now > threshold
    }

    /// Checks if the token is expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// `true` when the access token is present and not expired.
    pub fn is_valid(&self) -> bool {
        !self.is_revoked() && !self.is_expired()
    }

    /// `true` when the access token is empty.
    pub fn is_revoked(&self) -> bool {
        self.access_token.is_empty()
    }

    /// Time left before the grace window starts, if any.
    pub fn time_until_expiry(&self) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        let grace = TimeDelta::try_seconds(i64::try_from(self.grace_period).ok()?)?;
        let remaining = expires_at.checked_sub_signed(grace)? - Utc::now();
        remaining.to_std().ok()
    }

    /// Serializes the token for external caching (timestamps in ISO-8601).
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::InvalidTokenResponse`] when serialization fails.
    pub fn to_value(&self) -> Result<Value, OAuth2Error> {
        serde_json::to_value(self).map_err(|err| OAuth2Error::InvalidTokenResponse {
            reason: err.to_string(),
        })
    }

    /// Restores a token serialized with [`OAuth2Token::to_value`].
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::InvalidTokenResponse`] naming the offending field.
    pub fn from_value(value: Value) -> Result<Self, OAuth2Error> {
        serde_path_to_error::deserialize(value).map_err(|err| OAuth2Error::InvalidTokenResponse {
            reason: format!("{}: {}", err.path(), err.inner()),
        })
    }
}

impl fmt::Debug for OAuth2Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuth2Token")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("created_at", &self.created_at)
            .field("grace_period", &self.grace_period)
            .finish()
    }
}

/// Thread-safe holder of the current token.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    inner: Arc<RwLock<Option<OAuth2Token>>>,
}

impl TokenCache {
    /// Creates a new empty token cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a token cache with an initial token.
    pub fn with_token(token: OAuth2Token) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token))),
        }
    }

    /// Returns the cached token if it is valid.
    pub async fn get(&self) -> Option<OAuth2Token> {
        let guard = self.inner.read().await;
        guard.as_ref().filter(|token| token.is_valid()).cloned()
    }

    /// Returns the cached token, valid or not.
    pub async fn current(&self) -> Option<OAuth2Token> {
        self.inner.read().await.clone()
    }

    /// Stores a new token in the cache.
    pub async fn set(&self, token: OAuth2Token) {
        let mut guard = self.inner.write().await;
        *guard = Some(token);
    }

    /// Clears the cached token.
    pub async fn clear(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }
}
