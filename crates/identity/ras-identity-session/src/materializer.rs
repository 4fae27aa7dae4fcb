//! Commits a completed login into the user's session.

use crate::{SessionData, SessionResult, SessionStore, keys};
use ras_identity_core::{AuthenticatedSession, IdentityClaims, TokenSet};
use std::sync::Arc;
use tracing::{debug, info};

/// The single write path that turns an anonymous session into an
/// authenticated one, and the matching logout.
#[derive(Clone)]
pub struct SessionMaterializer {
    store: Arc<dyn SessionStore>,
}

impl SessionMaterializer {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Store the user and tokens in the session, replacing any earlier
    /// authenticated state and clearing any pending authorization.
    pub async fn complete_login(
        &self,
        session_id: &str,
        tokens: TokenSet,
        identity: IdentityClaims,
    ) -> SessionResult<AuthenticatedSession> {
        let session = AuthenticatedSession::new(identity, tokens);
        let value = serde_json::to_value(&session)?;

        self.store
            .update(
                session_id,
                Box::new(move |data: &mut Option<SessionData>| {
                    let data = data.get_or_insert_with(SessionData::new);
                    data.remove(keys::PENDING_AUTHORIZATION);
                    data.insert(keys::AUTHENTICATED.to_string(), value);
                }),
            )
            .await?;

        info!("Session authenticated for subject: {}", session.user.id);
        Ok(session)
    }

    /// The authenticated state of a session, if any
    pub async fn current_session(
        &self,
        session_id: &str,
    ) -> SessionResult<Option<AuthenticatedSession>> {
        let Some(mut data) = self.store.get(session_id).await? else {
            return Ok(None);
        };

        match data.remove(keys::AUTHENTICATED) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Move a session's data to a new id and drop the old one.
    ///
    /// Called once a login completes, so an id planted in the browser
    /// before authentication never becomes an authenticated session.
    /// Returns `false` if there was nothing under `old_id` to move.
    pub async fn rotate(&self, old_id: &str, new_id: &str) -> SessionResult<bool> {
        let mut moved = None;
        self.store
            .update(
                old_id,
                Box::new(|data: &mut Option<SessionData>| moved = data.take()),
            )
            .await?;

        let Some(data) = moved else {
            return Ok(false);
        };
        self.store.set(new_id, data, None).await?;

        debug!("Session id rotated");
        Ok(true)
    }

    /// Destroy the whole session, not just the authentication fields
    pub async fn logout(&self, session_id: &str) -> SessionResult<()> {
        self.store.delete(session_id).await?;
        debug!("Session destroyed");
        Ok(())
    }
}
