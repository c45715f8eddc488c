//! OAuth2 flow over real HTTP: an in-process axum server plays the token endpoint
//! and a protected resource.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use apigate_core::{
    ApiClient, ApiClientError, ClientCredentials, EndpointDefinition, Flags, OAuth2Config,
    OAuth2Error, OAuth2Flow, ParameterConstraint, ParameterDefinition, ParameterValueType,
    RetryStrategy,
};
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const CLIENT_BASIC: &str = "Basic aXQtY2xpZW50Oml0LXNlY3JldA==";

#[derive(Debug, Default)]
struct AuthServer {
    token_calls: AtomicUsize,
    resource_calls: AtomicUsize,
    accepted: Mutex<Option<String>>,
    last_form: Mutex<HashMap<String, String>>,
}

impl AuthServer {
    fn accepted(&self) -> Option<String> {
        self.accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn revoke_all(&self) {
        *self.accepted.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn last_form(&self) -> HashMap<String, String> {
        self.last_form
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn issue_token(
    State(server): State<Arc<AuthServer>>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let call = server.token_calls.fetch_add(1, Ordering::SeqCst) + 1;
    *server.last_form.lock().unwrap_or_else(PoisonError::into_inner) = form;

    let authorization = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());
    if authorization != Some(CLIENT_BASIC) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_client"}))).into_response();
    }

    // Widens the window in which concurrent requests wait for the same refresh.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let access_token = format!("token-{call}");
    *server.accepted.lock().unwrap_or_else(PoisonError::into_inner) = Some(access_token.clone());
    Json(json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": "3600",
        "scope": "read write",
    }))
    .into_response()
}

async fn protected(
    State(server): State<Arc<AuthServer>>,
    headers: HeaderMap,
    Path(id): Path<u64>,
) -> Response {
    server.resource_calls.fetch_add(1, Ordering::SeqCst);
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match (bearer, server.accepted()) {
        (Some(bearer), Some(accepted)) if bearer == accepted => {
            Json(json!({"id": id, "token": bearer})).into_response()
        }
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn start() -> anyhow::Result<(SocketAddr, Arc<AuthServer>)> {
    // Fails once another test in this binary has installed it.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let server = Arc::new(AuthServer::default());
    let app = Router::new()
        .route("/oauth/token", post(issue_token))
        .route("/api/users/{id}", get(protected))
        .with_state(Arc::clone(&server));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok((addr, server))
}

fn client(addr: SocketAddr) -> anyhow::Result<ApiClient> {
    let oauth2 = OAuth2Config::client_credentials(
        "it-client",
        "it-secret",
        format!("http://{addr}/oauth/token"),
    )?
    .add_scopes(["read", "write"])
    .build()?;

    let get_user = EndpointDefinition::builder("get_user", "GET", "/users/{id}")
        .parameter(ParameterDefinition::path(
            "id",
            ParameterConstraint::new(ParameterValueType::Integer),
        ))
        .build()?;

    let client = ApiClient::builder()
        .with_port(addr.port())
        .with_base_path("/api")?
        .with_retry(RetryStrategy::none())
        .with_oauth2(OAuth2Flow::new(oauth2))
        .with_endpoint(get_user)
        .build()?;
    Ok(client)
}

fn user(id: u64) -> serde_json::Map<String, Value> {
    json!({"id": id}).as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn should_acquire_token_once_for_concurrent_requests() -> anyhow::Result<()> {
    let (addr, server) = start().await?;
    let client = client(addr)?;

    let calls = (1..=10).map(|id| {
        let client = client.clone();
        tokio::spawn(async move { client.request("get_user", None, user(id)).await })
    });
    for call in calls {
        let response = call.await??;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json()?;
        assert_eq!(body["token"], "token-1");
    }

    assert_eq!(server.token_calls.load(Ordering::SeqCst), 1);
    assert_eq!(server.resource_calls.load(Ordering::SeqCst), 10);
    let form = server.last_form();
    assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
    assert_eq!(form.get("scope").map(String::as_str), Some("read write"));
    Ok(())
}

#[tokio::test]
async fn should_refresh_and_resend_after_unauthorized() -> anyhow::Result<()> {
    let (addr, server) = start().await?;
    let client = client(addr)?;

    let first = client.request("get_user", None, user(1)).await?;
    assert_eq!(first.status(), StatusCode::OK);

    server.revoke_all();
    let second = client.request("get_user", None, user(2)).await?;

    assert_eq!(second.status(), StatusCode::OK);
    let body: Value = second.json()?;
    assert_eq!(body, json!({"id": 2, "token": "token-2"}));
    assert_eq!(server.token_calls.load(Ordering::SeqCst), 2);
    assert_eq!(server.resource_calls.load(Ordering::SeqCst), 3);
    Ok(())
}

#[tokio::test]
async fn should_report_rejected_client_credentials() -> anyhow::Result<()> {
    let (addr, server) = start().await?;
    let client = client(addr)?;
    let credentials = ClientCredentials::new("other-client", "wrong-secret");

    let error = client
        .request("get_user", Some(credentials), user(1))
        .await
        .expect_err("token request rejected");

    match error {
        ApiClientError::OAuth2(OAuth2Error::TokenInvalid { status, body, .. }) => {
            assert_eq!(status, Some(401));
            assert_eq!(body.as_deref(), Some(r#"{"error":"invalid_client"}"#));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(server.resource_calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn should_surface_unauthorized_with_status_hook() -> anyhow::Result<()> {
    let (addr, _server) = start().await?;
    let client = ApiClient::builder()
        .with_port(addr.port())
        .with_retry(RetryStrategy::none())
        .with_flags(Flags::USE_DEFAULT_POST_RESPONSE_HOOK)
        .build()?;

    let error = client
        .get("/api/users/1", None)
        .await
        .expect_err("no token sent");

    assert!(matches!(
        error,
        ApiClientError::UnexpectedStatusCode {
            status_code: 401,
            ..
        }
    ));
    Ok(())
}
