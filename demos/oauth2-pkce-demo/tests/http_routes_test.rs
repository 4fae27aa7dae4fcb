use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use oauth2_pkce_demo::{AppState, create_router};
use ras_identity_oauth2::{OAuth2Flow, OAuth2Settings, ProviderConfig};
use ras_identity_session::InMemorySessionStore;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_app(provider_base: &str) -> Router {
    let config = ProviderConfig::new(
        "demo-client-id",
        &format!("{}/authorize", provider_base),
        &format!("{}/token", provider_base),
        &format!("{}/userinfo", provider_base),
        "http://localhost:3000/oauth/callback",
        "openid profile email",
    )
    .unwrap();

    let sessions = Arc::new(InMemorySessionStore::new());
    let flow = OAuth2Flow::new(config, OAuth2Settings::default(), sessions).unwrap();
    create_router(AppState::new(flow, 3000))
}

async fn mount_provider(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "T1-opaque-access-token-value",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/userinfo"))
        .and(header_matcher(
            "Authorization",
            "Bearer T1-opaque-access-token-value",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "U1",
            "email": "u1@example.com"
        })))
        .mount(mock_server)
        .await;
}

async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> axum::response::Response {
    let mut request = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    let request = request.body(Body::empty()).unwrap();

    app.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn location(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

fn set_cookie(response: &axum::response::Response) -> String {
    response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

/// Start a login and return `(cookie, state)`
async fn begin_login(app: &Router) -> (String, String) {
    let response = get(app, "/auth/login", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = set_cookie(&response)
        .split(';')
        .next()
        .unwrap()
        .to_string();
    let params: HashMap<String, String> = Url::parse(&location(&response))
        .unwrap()
        .query_pairs()
        .into_owned()
        .collect();

    (cookie, params["state"].clone())
}

#[tokio::test]
async fn test_login_callback_profile_logout() {
    let mock_server = MockServer::start().await;
    mount_provider(&mock_server).await;
    let app = create_app(&mock_server.uri());

    let response = get(&app, "/auth/login", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(location(&response).starts_with(&format!("{}/authorize?", mock_server.uri())));

    let cookie_header = set_cookie(&response);
    assert!(cookie_header.starts_with("sid="));
    assert!(cookie_header.contains("HttpOnly"));
    assert!(cookie_header.contains("SameSite=Lax"));
    assert!(cookie_header.contains("Path=/"));

    let (cookie, state) = begin_login(&app).await;

    let response = get(
        &app,
        &format!("/oauth/callback?code=AUTH1&state={}", state),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/profile");

    // Login completes under a fresh session id
    let login_cookie = cookie;
    let cookie = set_cookie(&response)
        .split(';')
        .next()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("sid="));
    assert_ne!(cookie, login_cookie);

    let response = get(&app, "/profile", Some(&login_cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get(&app, "/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let profile = json_body(response).await;
    assert_eq!(profile["user"], json!({"id": "U1", "email": "u1@example.com"}));
    assert_eq!(profile["token_type"], "Bearer");
    assert_ne!(profile["access_token"], "T1-opaque-access-token-value");
    assert!(profile["access_token"].as_str().unwrap().ends_with("..."));

    let response = get(&app, "/", Some(&cookie)).await;
    let index = json_body(response).await;
    assert_eq!(index["authenticated"], true);
    assert_eq!(index["user"]["id"], "U1");

    let response = get(&app, "/auth/logout", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/");

    let response = get(&app, "/profile", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_reuses_existing_session_cookie() {
    let mock_server = MockServer::start().await;
    let app = create_app(&mock_server.uri());

    let (cookie, _) = begin_login(&app).await;

    let response = get(&app, "/auth/login", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_planted_session_id_is_never_authenticated() {
    let mock_server = MockServer::start().await;
    mount_provider(&mock_server).await;
    let app = create_app(&mock_server.uri());

    let planted = "sid=6f1c2a3e-0d4b-4c55-9a7e-1b2c3d4e5f60";
    let response = get(&app, "/auth/login", Some(planted)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let state = Url::parse(&location(&response))
        .unwrap()
        .query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
        .unwrap();

    let response = get(
        &app,
        &format!("/oauth/callback?code=AUTH1&state={}", state),
        Some(planted),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let issued = set_cookie(&response);
    assert!(!issued.starts_with(planted));

    let response = get(&app, "/profile", Some(planted)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_demo_mode_returns_url_as_json() {
    let mock_server = MockServer::start().await;
    let app = create_app(&mock_server.uri());

    let response = get(&app, "/auth/login?mode=demo", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let url = body["url"].as_str().unwrap();
    assert!(url.contains("code_challenge_method=S256"));
    assert!(url.contains(&format!("state={}", body["state"].as_str().unwrap())));
}

#[tokio::test]
async fn test_callback_with_wrong_state_returns_400() {
    let mock_server = MockServer::start().await;
    mount_provider(&mock_server).await;
    let app = create_app(&mock_server.uri());

    let (cookie, _) = begin_login(&app).await;

    let response = get(
        &app,
        "/oauth/callback?code=AUTH1&state=forged",
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "state_mismatch");
}

#[tokio::test]
async fn test_callback_without_session_returns_400() {
    let mock_server = MockServer::start().await;
    let app = create_app(&mock_server.uri());

    let response = get(&app, "/oauth/callback?code=AUTH1&state=abc", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "no_pending_authorization");
}

#[tokio::test]
async fn test_provider_error_is_passed_through() {
    let mock_server = MockServer::start().await;
    let app = create_app(&mock_server.uri());

    let (cookie, state) = begin_login(&app).await;

    let response = get(
        &app,
        &format!(
            "/oauth/callback?error=access_denied&error_description=User+declined&state={}",
            state
        ),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["error"], "access_denied");
    assert_eq!(body["error_description"], "User declined");
}

#[tokio::test]
async fn test_token_rejection_returns_502_without_details() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant","hint":"xyz"}"#),
        )
        .mount(&mock_server)
        .await;
    let app = create_app(&mock_server.uri());

    let (cookie, state) = begin_login(&app).await;

    let response = get(
        &app,
        &format!("/oauth/callback?code=AUTH1&state={}", state),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let body = json_body(response).await;
    assert_eq!(body["error"], "token_exchange_failed");
    assert!(!body.to_string().contains("xyz"));
}

#[tokio::test]
async fn test_unreachable_provider_returns_503() {
    let app = create_app("http://127.0.0.1:1");

    let (cookie, state) = begin_login(&app).await;

    let response = get(
        &app,
        &format!("/oauth/callback?code=AUTH1&state={}", state),
        Some(&cookie),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(response).await["error"], "provider_unavailable");
}

#[tokio::test]
async fn test_profile_requires_login() {
    let mock_server = MockServer::start().await;
    let app = create_app(&mock_server.uri());

    let response = get(&app, "/profile", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "not_authenticated");

    let response = get(&app, "/profile", Some("sid=not-a-uuid")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_status() {
    let mock_server = MockServer::start().await;
    let app = create_app(&mock_server.uri());

    let response = get(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let health = json_body(response).await;
    assert_eq!(health["status"], "healthy");
    assert!(health["uptime_seconds"].is_number());
    assert!(health["timestamp"].is_string());

    let response = get(&app, "/api/status", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let status = json_body(response).await;
    assert_eq!(status["application"], "oauth-demo");
    assert_eq!(status["status"], "running");
    assert_eq!(status["port"], 3000);

    let response = get(&app, "/", None).await;
    assert_eq!(json_body(response).await["authenticated"], false);
}
