//! In-memory session store.

use crate::{SessionData, SessionResult, SessionStore, SessionUpdate};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct SessionEntry {
    data: SessionData,
    expires_at: Option<Instant>,
}

impl SessionEntry {
    fn new(data: SessionData, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }
}

/// Session store backed by a [`DashMap`].
///
/// Entries past their expiry are reclaimed lazily when touched, or in bulk by
/// [`SessionStore::cleanup_expired`].
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    default_ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire sessions that were not given an explicit TTL after `ttl`
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl);
        self
    }

    /// Number of stored sessions, including expired ones not yet reclaimed
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> SessionResult<Option<SessionData>> {
        let now = Instant::now();

        let expired = match self.sessions.get(session_id) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.data.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.sessions
                .remove_if(session_id, |_, entry| entry.is_expired(now));
            debug!("Reclaimed expired session on access");
        }

        Ok(None)
    }

    async fn set(
        &self,
        session_id: &str,
        data: SessionData,
        ttl: Option<Duration>,
    ) -> SessionResult<()> {
        let entry = SessionEntry::new(data, ttl.or(self.default_ttl));
        self.sessions.insert(session_id.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.remove(session_id);
        Ok(())
    }

    async fn update(&self, session_id: &str, update: SessionUpdate<'_>) -> SessionResult<()> {
        let now = Instant::now();

        match self.sessions.entry(session_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let mut data = if occupied.get().is_expired(now) {
                    None
                } else {
                    Some(std::mem::take(&mut occupied.get_mut().data))
                };
                let was_live = data.is_some();

                update(&mut data);

                match data {
                    Some(data) if was_live => occupied.get_mut().data = data,
                    Some(data) => {
                        occupied.insert(SessionEntry::new(data, self.default_ttl));
                    }
                    None => {
                        occupied.remove();
                    }
                }
            }
            Entry::Vacant(vacant) => {
                let mut data = None;
                update(&mut data);

                if let Some(data) = data {
                    vacant.insert(SessionEntry::new(data, self.default_ttl));
                }
            }
        }

        Ok(())
    }

    async fn cleanup_expired(&self) -> SessionResult<usize> {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            debug!("Cleaned up {} expired sessions", removed);
        }

        Ok(removed)
    }
}
