//! Server-side session storage and the authenticated-session write path.
//!
//! A session is an opaque JSON map keyed by the id carried in the browser's
//! session cookie. Components that attach state to a session (the OAuth2
//! pending-authorization record, the authenticated user) each own one key of
//! that map. Backings implement [`SessionStore`]; [`InMemorySessionStore`] is
//! provided for single-process deployments and tests.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

mod materializer;
mod memory;

pub use materializer::SessionMaterializer;
pub use memory::InMemorySessionStore;

/// Well-known keys inside [`SessionData`]
pub mod keys {
    /// In-flight OAuth2 authorization attempt
    pub const PENDING_AUTHORIZATION: &str = "oauth2_pending";
    /// Authenticated user and tokens
    pub const AUTHENTICATED: &str = "authenticated";
}

/// Contents of one session
pub type SessionData = serde_json::Map<String, serde_json::Value>;

/// Mutation applied by [`SessionStore::update`].
///
/// The closure receives `None` when the session does not exist (or has
/// expired). Leaving `None` in place, or setting it, deletes the session.
pub type SessionUpdate<'a> = Box<dyn FnOnce(&mut Option<SessionData>) + Send + 'a>;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Session backend error: {0}")]
    BackendError(String),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Key/value capability backing browser sessions.
///
/// Implementations must make [`SessionStore::update`] atomic per session id:
/// concurrent updates to the same id are serialized, updates to different
/// ids are independent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session; expired sessions are reported as missing
    async fn get(&self, session_id: &str) -> SessionResult<Option<SessionData>>;

    /// Replace a session. `ttl` overrides the store's default expiry.
    async fn set(
        &self,
        session_id: &str,
        data: SessionData,
        ttl: Option<Duration>,
    ) -> SessionResult<()>;

    /// Remove a session entirely
    async fn delete(&self, session_id: &str) -> SessionResult<()>;

    /// Read-modify-write a session atomically.
    ///
    /// The closure runs while the entry is locked and must not call back into
    /// the store.
    async fn update(&self, session_id: &str, update: SessionUpdate<'_>) -> SessionResult<()>;

    /// Drop expired sessions, returning how many were removed
    async fn cleanup_expired(&self) -> SessionResult<usize>;
}
