//! Pending authorization attempts, bound to a browser session.

use crate::error::{OAuth2Error, OAuth2Result};
use crate::pkce::{PkceParams, generate_pkce_params};
use chrono::{DateTime, Duration, Utc};
use ras_identity_core::redact;
use ras_identity_session::{SessionData, SessionStore, keys};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The in-flight half of a login: what the callback must be checked against
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub code_verifier: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn new(params: &PkceParams) -> Self {
        Self {
            code_verifier: params.code_verifier.clone(),
            state: params.state.clone(),
            created_at: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

impl fmt::Debug for PendingAuthorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAuthorization")
            .field("code_verifier", &redact(&self.code_verifier))
            .field("state", &self.state)
            .field("created_at", &self.created_at)
            .finish()
    }
}

enum Lookup {
    Missing,
    Expired,
    Found(PendingAuthorization),
}

/// Stores at most one [`PendingAuthorization`] per session.
///
/// Starting a new login overwrites the previous attempt, so only the latest
/// `state` for a session is ever honored.
#[derive(Clone)]
pub struct PendingAuthorizationStore {
    sessions: Arc<dyn SessionStore>,
    ttl_seconds: u64,
}

impl PendingAuthorizationStore {
    pub fn new(sessions: Arc<dyn SessionStore>, ttl_seconds: u64) -> Self {
        Self {
            sessions,
            ttl_seconds,
        }
    }

    fn ttl(&self) -> Duration {
        let seconds = i64::try_from(self.ttl_seconds)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Duration::seconds(seconds)
    }

    /// Generate PKCE parameters and record them as the session's pending
    /// attempt.
    pub async fn begin_authorization(&self, session_id: &str) -> OAuth2Result<PkceParams> {
        let params = generate_pkce_params()?;
        self.save(session_id, PendingAuthorization::new(&params))
            .await?;

        debug!("Pending authorization recorded for session");
        Ok(params)
    }

    /// Record `pending` as the session's attempt, replacing any previous one
    pub async fn save(&self, session_id: &str, pending: PendingAuthorization) -> OAuth2Result<()> {
        let value = serde_json::to_value(&pending)?;

        self.sessions
            .update(
                session_id,
                Box::new(move |data: &mut Option<SessionData>| {
                    data.get_or_insert_with(SessionData::new)
                        .insert(keys::PENDING_AUTHORIZATION.to_string(), value);
                }),
            )
            .await?;

        Ok(())
    }

    /// Look up the session's attempt, enforcing the TTL.
    ///
    /// An expired attempt is deleted and reported as
    /// [`OAuth2Error::ExpiredAuthorization`]. A live attempt is returned but
    /// left in place; removing it is up to the caller.
    pub async fn consume_pending_authorization(
        &self,
        session_id: &str,
    ) -> OAuth2Result<PendingAuthorization> {
        let ttl = self.ttl();
        let now = Utc::now();
        let mut lookup = Lookup::Missing;

        self.sessions
            .update(
                session_id,
                Box::new(|data: &mut Option<SessionData>| {
                    let Some(session) = data.as_mut() else {
                        return;
                    };
                    let Some(value) = session.get(keys::PENDING_AUTHORIZATION) else {
                        return;
                    };

                    match serde_json::from_value::<PendingAuthorization>(value.clone()) {
                        Ok(pending) if pending.is_expired(ttl, now) => {
                            session.remove(keys::PENDING_AUTHORIZATION);
                            lookup = Lookup::Expired;
                        }
                        Ok(pending) => lookup = Lookup::Found(pending),
                        Err(e) => {
                            warn!("Discarding unreadable pending authorization: {}", e);
                            session.remove(keys::PENDING_AUTHORIZATION);
                        }
                    }
                }),
            )
            .await?;

        match lookup {
            Lookup::Found(pending) => Ok(pending),
            Lookup::Expired => {
                info!("Pending authorization expired and was removed");
                Err(OAuth2Error::ExpiredAuthorization)
            }
            Lookup::Missing => Err(OAuth2Error::NoPendingAuthorization),
        }
    }

    /// Remove the session's pending attempt, whatever it is
    pub async fn discard(&self, session_id: &str) -> OAuth2Result<()> {
        self.sessions
            .update(
                session_id,
                Box::new(|data: &mut Option<SessionData>| {
                    if let Some(session) = data.as_mut() {
                        session.remove(keys::PENDING_AUTHORIZATION);
                    }
                }),
            )
            .await?;

        Ok(())
    }

    /// Remove the session's pending attempt only if it is still the one with
    /// `state`. A login started concurrently in the meantime survives.
    pub async fn discard_attempt(&self, session_id: &str, state: &str) -> OAuth2Result<bool> {
        let mut removed = false;

        self.sessions
            .update(
                session_id,
                Box::new(|data: &mut Option<SessionData>| {
                    let Some(session) = data.as_mut() else {
                        return;
                    };

                    let matches = session
                        .get(keys::PENDING_AUTHORIZATION)
                        .and_then(|value| value.get("state"))
                        .and_then(|value| value.as_str())
                        == Some(state);

                    if matches {
                        session.remove(keys::PENDING_AUTHORIZATION);
                        removed = true;
                    }
                }),
            )
            .await?;

        Ok(removed)
    }
}
