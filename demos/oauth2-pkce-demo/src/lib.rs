//! Demo web server for the OAuth2 Authorization Code + PKCE flow.
//!
//! Browser sessions are identified by an opaque `sid` cookie; everything
//! else lives in the server-side session store.

pub mod config;
pub mod error;
pub mod routes;

pub use config::AppConfig;
pub use routes::{AppState, SESSION_COOKIE_NAME, create_router};

use ras_identity_session::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Periodically drop expired sessions from `store`
pub fn spawn_session_cleanup(store: Arc<dyn SessionStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match store.cleanup_expired().await {
                Ok(0) => {}
                Ok(removed) => debug!("Session sweep removed {} expired sessions", removed),
                Err(e) => warn!("Session sweep failed: {}", e),
            }
        }
    })
}
