//! Token endpoint exchanges: acquiring and refreshing tokens.

use headers::{ContentType, HeaderMapExt};
use http::header::{ACCEPT, AUTHORIZATION};
use http::{HeaderValue, Method};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, error};

use super::config::{OAuth2Config, OAuth2GrantType, TokenRequestFormat};
use super::error::OAuth2Error;
use super::token::{BEARER, OAuth2Token};
use crate::client::strategy::CredentialPlacement;
use crate::client::{ApiRequest, ClientCredentials, RedactionContext, SecureString};

/// Raw token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<ExpiresIn>,
    #[serde(default)]
    scope: Option<ScopeField>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(u64),
    Text(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScopeField {
    Joined(String),
    List(Vec<String>),
}

/// Credentials used for one exchange.
struct Client<'a> {
    client_id: &'a str,
    client_secret: Option<&'a SecureString>,
}

impl<'a> Client<'a> {
    fn resolve(config: &'a OAuth2Config, credentials: Option<&'a ClientCredentials>) -> Self {
        match credentials {
            Some(credentials) => Self {
                client_id: credentials.client_id(),
                client_secret: Some(credentials.client_secret()),
            },
            None => Self {
                client_id: config.client_id(),
                client_secret: config.client_secret(),
            },
        }
    }

    /// Rejects empty credentials, whatever their placement.
    fn check(&self) -> Result<(), OAuth2Error> {
        let empty_secret = self
            .client_secret
            .is_some_and(|secret| secret.as_str().is_empty());
        if self.client_id.is_empty() || empty_secret {
            return Err(OAuth2Error::configuration(
                "client credentials must not be empty",
            ));
        }
        Ok(())
    }
}

impl OAuth2Token {
    /// Requests a new token with the configured credentials.
    ///
    /// # Errors
    ///
    /// See [`OAuth2Token::request_new_with`].
    pub async fn request_new(config: &OAuth2Config) -> Result<Self, OAuth2Error> {
        Self::request_new_with(config, None).await
    }

    /// Requests a new token with the client credentials grant.
    ///
    /// `credentials`, when given, replace the configured client and add their scopes.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::TokenExpired`] for a pre-acquired grant without credentials,
    /// [`OAuth2Error::TokenInvalid`] when the endpoint is unreachable or answers non-2xx,
    /// and [`OAuth2Error::InvalidTokenResponse`] when the answer cannot be parsed.
    pub async fn request_new_with(
        config: &OAuth2Config,
        credentials: Option<&ClientCredentials>,
    ) -> Result<Self, OAuth2Error> {
        if config.grant_type() == OAuth2GrantType::PreAcquired && credentials.is_none() {
            return Err(OAuth2Error::token_expired(
                "pre-acquired token cannot be requested from the token endpoint",
            ));
        }

        let client = Client::resolve(config, credentials);
        if client.client_secret.is_none() {
            return Err(OAuth2Error::configuration(
                "Client credentials flow requires a client secret",
            ));
        }

        let mut scopes: Vec<&str> = config.scopes().iter().map(String::as_str).collect();
        if let Some(credentials) = credentials {
            scopes.extend(credentials.scopes().iter().map(String::as_str));
        }
        let scope = config.scope_strategy().merge(&scopes)?;

        let mut fields = vec![("grant_type", "client_credentials")];
        if !scope.is_empty() {
            fields.push(("scope", scope.as_str()));
        }

        let request = token_request(config, &client, fields)?;
        exchange(config, &client, request, None).await
    }

    /// Refreshes with the configured credentials.
    ///
    /// # Errors
    ///
    /// See [`OAuth2Token::refresh_with`].
    pub async fn refresh(&self, config: &OAuth2Config) -> Result<Self, OAuth2Error> {
        self.refresh_with(config, None).await
    }

    /// Exchanges the refresh token for a new token.
    ///
    /// The configured scopes are requested again. The current refresh token is kept when the
    /// response carries none.
    ///
    /// # Errors
    ///
    /// Returns [`OAuth2Error::TokenExpired`] when this token is already expired,
    /// [`OAuth2Error::TokenInvalid`] without a refresh token or when the exchange fails.
    pub async fn refresh_with(
        &self,
        config: &OAuth2Config,
        credentials: Option<&ClientCredentials>,
    ) -> Result<Self, OAuth2Error> {
        if self.is_expired() {
            return Err(OAuth2Error::token_expired(
                "cannot refresh a token past its grace window",
            ));
        }
        let Some(refresh_token) = self.refresh_token() else {
            return Err(OAuth2Error::token_invalid("no refresh token available"));
        };

        let client = Client::resolve(config, credentials);
        let scope = config.scope_strategy().merge(config.scopes())?;
        let mut fields = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if !scope.is_empty() {
            fields.push(("scope", scope.as_str()));
        }

        let request = token_request(config, &client, fields)?;
        let token = exchange(config, &client, request, Some(refresh_token)).await?;
        Ok(match token.refresh_token() {
            Some(_) => token,
            None => token.with_refresh_token(refresh_token),
        })
    }
}

fn token_request<'a>(
    config: &OAuth2Config,
    client: &Client<'a>,
    mut fields: Vec<(&'a str, &'a str)>,
) -> Result<ApiRequest, OAuth2Error> {
    let mut request = ApiRequest::new(Method::POST, config.token_url().clone());
    let headers = request.headers_mut();
    headers.extend(config.token_headers().clone());
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    client.check()?;
    match (config.credential_placement(), client.client_secret) {
        (CredentialPlacement::Header, Some(secret)) => {
            let encoded = config.credential_encoding().encode(client.client_id, secret)?;
            let mut value = HeaderValue::from_str(encoded.as_str()).map_err(|err| {
                OAuth2Error::configuration(format!("invalid client credentials header: {err}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        (CredentialPlacement::Body, Some(secret)) => {
            fields.push(("client_id", client.client_id));
            fields.push(("client_secret", secret.as_str()));
        }
        (_, None) => fields.push(("client_id", client.client_id)),
    }

    let body = match config.request_format() {
        TokenRequestFormat::Form => {
            headers.typed_insert(ContentType::form_url_encoded());
            serde_urlencoded::to_string(&fields)
                .map_err(|err| OAuth2Error::configuration(err.to_string()))?
                .into_bytes()
        }
        TokenRequestFormat::Json => {
            headers.typed_insert(ContentType::json());
            let object: Map<String, Value> = fields
                .iter()
                .map(|&(key, value)| (key.to_string(), Value::from(value)))
                .collect();
            serde_json::to_vec(&object).map_err(|err| OAuth2Error::configuration(err.to_string()))?
        }
    };
    Ok(request.with_body(body))
}

async fn exchange(
    config: &OAuth2Config,
    client: &Client<'_>,
    request: ApiRequest,
    refresh_token: Option<&str>,
) -> Result<OAuth2Token, OAuth2Error> {
    let grant = if refresh_token.is_some() {
        "refresh_token"
    } else {
        "client_credentials"
    };
    debug!(token_url = %config.token_url(), client_id = client.client_id, grant, "token request sent");

    let response = config.transport().send(request).await?;
    let status = response.status();
    if !response.is_success() {
        let body = response.text().into_owned();
        let mut redaction = RedactionContext::new();
        if let Some(secret) = client.client_secret {
            redaction.register(secret.clone());
        }
        if let Some(refresh_token) = refresh_token {
            redaction.register(refresh_token);
        }
        error!(%status, body = %redaction.redact(&body), grant, "token request rejected");
        return Err(OAuth2Error::TokenInvalid {
            reason: "token endpoint rejected the request".to_string(),
            status: Some(status.as_u16()),
            body: Some(body),
            cause: None,
        });
    }

    let raw: TokenResponse = response
        .json()
        .map_err(|err| OAuth2Error::InvalidTokenResponse {
            reason: format!("{}: {}", err.path(), err.inner()),
        })?;
    let token = into_token(config, raw)?;
    debug!(%status, expires_in = ?token.expires_in(), grant, "token received");
    Ok(token)
}

fn into_token(config: &OAuth2Config, raw: TokenResponse) -> Result<OAuth2Token, OAuth2Error> {
    if raw.access_token.is_empty() {
        return Err(OAuth2Error::InvalidTokenResponse {
            reason: "empty access_token".to_string(),
        });
    }

    let expires_in = match raw.expires_in {
        None => None,
        Some(ExpiresIn::Seconds(seconds)) => Some(seconds),
        Some(ExpiresIn::Text(text)) => Some(text.trim().parse::<u64>().map_err(|err| {
            OAuth2Error::InvalidTokenResponse {
                reason: format!("expires_in {text:?}: {err}"),
            }
        })?),
    };
    let scope = match raw.scope {
        None => Vec::new(),
        Some(ScopeField::Joined(scope)) => config.scope_strategy().split_granted(&scope),
        Some(ScopeField::List(scope)) => scope,
    };

    let mut token = OAuth2Token::new(raw.access_token)
        .with_token_type(raw.token_type.unwrap_or_else(|| BEARER.to_string()))
        .with_scope(scope)
        .with_grace_period(config.grace_period());
    if let Some(expires_in) = expires_in {
        token = token.with_expires_in(expires_in);
    }
    if let Some(refresh_token) = raw.refresh_token {
        token = token.with_refresh_token(refresh_token);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use http::StatusCode;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::client::{TransportError, TransportErrorKind};
    use crate::client::testing::{MockTransport, json_response, token_response};

    const TOKEN_URL: &str = "https://auth.example.com/oauth/token";

    fn config(transport: &MockTransport) -> OAuth2Config {
        OAuth2Config::client_credentials("client-id", "client-secret", TOKEN_URL)
            .expect("Should create builder")
            .add_scopes(["read", "write", "read"])
            .with_transport(Arc::new(transport.clone()))
            .build()
            .expect("Should build config")
    }

    fn body_of(request: &ApiRequest) -> String {
        String::from_utf8(request.body().expect("body").to_vec()).expect("utf-8")
    }

    #[tokio::test]
    async fn should_request_token_with_basic_credentials() {
        let transport = MockTransport::new(|_| Ok(token_response("access-1", 3600)));
        let config = config(&transport);

        let token = OAuth2Token::request_new(&config).await.expect("token");

        assert_eq!(token.access_token(), Ok("access-1"));
        assert_eq!(token.expires_in(), Some(3600));
        let requests = transport.requests();
        let request = requests.first().expect("one request");
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.url().as_str(), TOKEN_URL);
        assert_eq!(
            request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
            Some("Basic Y2xpZW50LWlkOmNsaWVudC1zZWNyZXQ=")
        );
        assert_eq!(body_of(request), "grant_type=client_credentials&scope=read+write");
    }

    #[tokio::test]
    async fn should_send_credentials_in_json_body() {
        let transport = MockTransport::new(|_| Ok(token_response("access-1", 3600)));
        let config = OAuth2Config::client_credentials("client-id", "client-secret", TOKEN_URL)
            .expect("Should create builder")
            .with_credential_placement(CredentialPlacement::Body)
            .with_request_format(TokenRequestFormat::Json)
            .with_transport(Arc::new(transport.clone()))
            .build()
            .expect("Should build config");

        OAuth2Token::request_new(&config).await.expect("token");

        let requests = transport.requests();
        let request = requests.first().expect("one request");
        assert!(request.headers().get(AUTHORIZATION).is_none());
        let body: Value = serde_json::from_str(&body_of(request)).expect("json body");
        assert_eq!(
            body,
            json!({
                "grant_type": "client_credentials",
                "client_id": "client-id",
                "client_secret": "client-secret",
            })
        );
    }

    #[tokio::test]
    async fn should_use_per_request_credentials() {
        let transport = MockTransport::new(|_| Ok(token_response("access-2", 60)));
        let config = config(&transport);
        let credentials = ClientCredentials::new("other-client", "other-secret").with_scopes(["admin"]);

        OAuth2Token::request_new_with(&config, Some(&credentials))
            .await
            .expect("token");

        let requests = transport.requests();
        let request = requests.first().expect("one request");
        assert_eq!(
            request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
            Some("Basic b3RoZXItY2xpZW50Om90aGVyLXNlY3JldA==")
        );
        assert_eq!(body_of(request), "grant_type=client_credentials&scope=read+write+admin");
    }

    #[rstest]
    #[case::empty_id("", "tenant-secret")]
    #[case::empty_secret("tenant-client", "")]
    #[tokio::test]
    async fn should_reject_empty_credentials_in_body_mode(
        #[case] client_id: &str,
        #[case] client_secret: &str,
    ) {
        let transport = MockTransport::new(|_| Ok(token_response("unused", 3600)));
        let config = OAuth2Config::client_credentials("client-id", "client-secret", TOKEN_URL)
            .expect("Should create builder")
            .with_credential_placement(CredentialPlacement::Body)
            .with_transport(Arc::new(transport.clone()))
            .build()
            .expect("Should build config");
        let credentials = ClientCredentials::new(client_id, client_secret);

        let error = OAuth2Token::request_new_with(&config, Some(&credentials))
            .await
            .expect_err("empty credentials");

        insta::allow_duplicates! {
            insta::assert_snapshot!(error.to_string(), @"OAuth2 configuration error: client credentials must not be empty");
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn should_surface_status_and_body() {
        let transport = MockTransport::new(|_| {
            Ok(json_response(StatusCode::UNAUTHORIZED, &json!({"error": "invalid_client"})))
        });
        let config = config(&transport);

        let error = OAuth2Token::request_new(&config).await.expect_err("rejected");

        assert_eq!(
            error,
            OAuth2Error::TokenInvalid {
                reason: "token endpoint rejected the request".to_string(),
                status: Some(401),
                body: Some(r#"{"error":"invalid_client"}"#.to_string()),
                cause: None,
            }
        );
    }

    #[tokio::test]
    async fn should_wrap_transport_failures() {
        let transport = MockTransport::new(|_| {
            Err(TransportError::new(TransportErrorKind::Connect, "connection refused"))
        });
        let config = config(&transport);

        let error = OAuth2Token::request_new(&config).await.expect_err("unreachable");

        assert!(matches!(error, OAuth2Error::TokenInvalid { cause: Some(_), .. }));
    }

    #[rstest]
    #[case::numeric_string(json!({"access_token": "a", "expires_in": "3600", "scope": "read write"}))]
    #[case::scope_list(json!({"access_token": "a", "expires_in": 3600, "scope": ["read", "write"]}))]
    #[case::long_scope(json!({"access_token": "a", "expires_in": 3600, "scope": granted_scopes(60)}))]
    #[tokio::test]
    async fn should_accept_lenient_token_responses(#[case] body: Value) {
        let expected: Vec<String> = match &body["scope"] {
            Value::String(scope) => scope.split(' ').map(ToString::to_string).collect(),
            other => serde_json::from_value(other.clone()).expect("scope list"),
        };
        let transport = MockTransport::new(move |_| Ok(json_response(StatusCode::OK, &body)));
        let config = config(&transport);

        let token = OAuth2Token::request_new(&config).await.expect("token");

        assert_eq!(token.expires_in(), Some(3600));
        assert_eq!(token.scope(), expected);
    }

    fn granted_scopes(count: usize) -> String {
        (0..count).map(|n| format!("scope{n}")).collect::<Vec<_>>().join(" ")
    }

    #[tokio::test]
    async fn should_refresh_a_token_granted_many_scopes() {
        let transport = MockTransport::new(|_| Ok(token_response("access-2", 3600)));
        let config = config(&transport);
        let scope = (0..60).map(|n| format!("scope{n}")).collect();
        let current = OAuth2Token::with_expiry("access-1", Duration::from_secs(3600))
            .with_refresh_token("refresh-1")
            .with_scope(scope);

        let refreshed = current.refresh(&config).await.expect("refreshed");

        assert_eq!(refreshed.secret(), "access-2");
    }

    #[rstest]
    #[case::empty_token(json!({"access_token": ""}))]
    #[case::missing_token(json!({"token_type": "Bearer"}))]
    #[case::bad_expiry(json!({"access_token": "a", "expires_in": "later"}))]
    #[tokio::test]
    async fn should_reject_invalid_token_responses(#[case] body: Value) {
        let transport = MockTransport::new(move |_| Ok(json_response(StatusCode::OK, &body)));
        let config = config(&transport);

        let error = OAuth2Token::request_new(&config).await.expect_err("invalid");

        assert!(matches!(error, OAuth2Error::InvalidTokenResponse { .. }), "{error}");
    }

    #[tokio::test]
    async fn should_refresh_and_keep_refresh_token() {
        let transport = MockTransport::new(|_| Ok(token_response("access-2", 3600)));
        let config = config(&transport);
        let current = OAuth2Token::with_expiry("access-1", Duration::from_secs(3600))
            .with_refresh_token("refresh-1");

        let refreshed = current.refresh(&config).await.expect("refreshed");

        assert_eq!(refreshed.secret(), "access-2");
        assert_eq!(refreshed.refresh_token(), Some("refresh-1"));
        let requests = transport.requests();
        assert_eq!(
            body_of(requests.first().expect("one request")),
            "grant_type=refresh_token&refresh_token=refresh-1&scope=read+write"
        );
    }

    #[tokio::test]
    async fn should_refuse_to_refresh_expired_or_unrefreshable_tokens() {
        let transport = MockTransport::new(|_| Ok(token_response("unused", 3600)));
        let config = config(&transport);

        let expired = OAuth2Token::with_expiry("a", Duration::from_secs(10)).with_refresh_token("r");
        let no_refresh = OAuth2Token::with_expiry("a", Duration::from_secs(3600));

        assert!(matches!(
            expired.refresh(&config).await,
            Err(OAuth2Error::TokenExpired { .. })
        ));
        assert!(matches!(
            no_refresh.refresh(&config).await,
            Err(OAuth2Error::TokenInvalid { .. })
        ));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn should_not_request_pre_acquired_tokens() {
        let transport = MockTransport::new(|_| Ok(token_response("unused", 3600)));
        let config = OAuth2Config::pre_acquired("client-id", TOKEN_URL, OAuth2Token::new("external"))
            .expect("Should create builder")
            .with_transport(Arc::new(transport.clone()))
            .build()
            .expect("Should build config");

        let error = OAuth2Token::request_new(&config).await.expect_err("pre-acquired");

        assert!(matches!(error, OAuth2Error::TokenExpired { .. }));
        assert!(transport.requests().is_empty());
    }
}
