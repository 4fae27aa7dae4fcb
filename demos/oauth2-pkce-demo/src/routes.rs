//! HTTP surface of the demo: login, callback, logout and a protected profile.

use crate::error::{AppError, ErrorResponse};
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use ras_identity_core::SessionUser;
use ras_identity_oauth2::{CallbackParams, OAuth2Error, OAuth2Flow};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "sid";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub flow: OAuth2Flow,
    pub started_at: Instant,
    pub port: u16,
}

impl AppState {
    pub fn new(flow: OAuth2Flow, port: u16) -> Self {
        Self {
            flow,
            started_at: Instant::now(),
            port,
        }
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/status", get(api_status_handler))
        .route("/auth/login", get(login_handler))
        .route("/oauth/callback", get(callback_handler))
        .route("/auth/logout", get(logout_handler))
        .route("/profile", get(profile_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Session id from the cookie, if it is one we could have issued
fn session_id_from_jar(jar: &CookieJar) -> Option<String> {
    let cookie = jar.get(SESSION_COOKIE_NAME)?;
    Uuid::parse_str(cookie.value())
        .ok()
        .map(|id| id.to_string())
}

fn session_cookie(session_id: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

/// Reuse the caller's session or start a new one
fn ensure_session(jar: CookieJar) -> (CookieJar, String) {
    match session_id_from_jar(&jar) {
        Some(session_id) => (jar, session_id),
        None => {
            let session_id = Uuid::new_v4().to_string();
            debug!("Issuing new session cookie");
            (jar.add(session_cookie(session_id.clone())), session_id)
        }
    }
}

/// 302 Found, the status browsers and providers expect for OAuth2 redirects
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    application: &'static str,
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<SessionUser>,
    links: Vec<&'static str>,
}

async fn index_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<IndexResponse>, AppError> {
    let session = match session_id_from_jar(&jar) {
        Some(session_id) => state.flow.current_session(&session_id).await?,
        None => None,
    };

    Ok(Json(IndexResponse {
        application: "oauth-demo",
        authenticated: session.is_some(),
        user: session.map(|session| session.user),
        links: vec!["/auth/login", "/profile", "/auth/logout", "/health", "/api/status"],
    }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: DateTime<Utc>,
    uptime_seconds: f64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        uptime_seconds: state.started_at.elapsed().as_secs_f64(),
    })
}

#[derive(Debug, Serialize)]
struct ApiStatusResponse {
    application: &'static str,
    version: &'static str,
    status: &'static str,
    port: u16,
}

async fn api_status_handler(State(state): State<AppState>) -> Json<ApiStatusResponse> {
    Json(ApiStatusResponse {
        application: "oauth-demo",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        port: state.port,
    })
}

#[derive(Debug, Deserialize)]
struct LoginQuery {
    mode: Option<String>,
}

async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
) -> Result<(CookieJar, Response), AppError> {
    let (jar, session_id) = ensure_session(jar);
    let redirect = state.flow.begin_login(&session_id).await?;

    // Demo mode shows the URL instead of leaving for a provider that may not exist
    if query.mode.as_deref() == Some("demo") {
        return Ok((jar, Json(redirect).into_response()));
    }

    Ok((jar, found(&redirect.url)))
}

async fn callback_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Response), AppError> {
    info!("Handling OAuth2 callback");

    // Without a session cookie there is nothing this callback could belong to
    let Some(session_id) = session_id_from_jar(&jar) else {
        return Err(AppError(OAuth2Error::NoPendingAuthorization));
    };

    state.flow.handle_callback(&session_id, &params).await?;

    // The pre-login id may have been planted; authenticate under a fresh one
    let new_session_id = Uuid::new_v4().to_string();
    if !state.flow.rotate_session(&session_id, &new_session_id).await? {
        return Err(AppError(OAuth2Error::NoPendingAuthorization));
    }

    info!("OAuth2 callback successful, redirecting to profile");
    Ok((jar.add(session_cookie(new_session_id)), found("/profile")))
}

async fn logout_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    if let Some(session_id) = session_id_from_jar(&jar) {
        state.flow.logout(&session_id).await?;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE_NAME).path("/"));
    Ok((jar, found("/")))
}

#[derive(Debug, Serialize)]
struct ProfileResponse {
    user: SessionUser,
    access_token: String,
    token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    authenticated_at: DateTime<Utc>,
}

async fn profile_handler(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Response, AppError> {
    let session = match session_id_from_jar(&jar) {
        Some(session_id) => state.flow.current_session(&session_id).await?,
        None => None,
    };

    let Some(session) = session else {
        let body = Json(ErrorResponse {
            error: "not_authenticated".to_string(),
            error_description: Some("Sign in at /auth/login first.".to_string()),
        });
        return Ok((StatusCode::UNAUTHORIZED, body).into_response());
    };

    let access_token = session.tokens.redacted_access_token();
    Ok(Json(ProfileResponse {
        user: session.user,
        access_token,
        token_type: session.tokens.token_type,
        expires_in: session.tokens.expires_in,
        authenticated_at: session.authenticated_at,
    })
    .into_response())
}
