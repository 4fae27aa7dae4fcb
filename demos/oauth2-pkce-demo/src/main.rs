use anyhow::{Context, Result};
use oauth2_pkce_demo::{AppConfig, AppState, create_router, spawn_session_cleanup};
use ras_identity_oauth2::OAuth2Flow;
use ras_identity_session::{InMemorySessionStore, SessionStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present, before the
    // filter reads RUST_LOG
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "oauth2_pkce_demo=debug,ras_identity_oauth2=debug,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!("Starting OAuth2 PKCE demo server");
    info!("OAuth2 provider: {:?}", config.provider);

    let sessions: Arc<dyn SessionStore> = Arc::new(
        InMemorySessionStore::new()
            .with_default_ttl(Duration::from_secs(config.session_ttl_seconds)),
    );
    spawn_session_cleanup(sessions.clone(), Duration::from_secs(60));

    let flow = OAuth2Flow::new(config.provider.clone(), config.oauth2.clone(), sessions)
        .context("Failed to initialise OAuth2 flow")?;

    let app = create_router(AppState::new(flow, config.server_port));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;

    info!("Server running on http://{}", bind_addr);
    info!("OAuth2 redirect URI: {}", config.provider.redirect_uri);
    warn!(
        "This is an example application. Do not use in production without proper security review."
    );

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
