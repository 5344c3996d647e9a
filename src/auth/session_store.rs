//! Refresh Session Store
//! Mission: Track issued refresh tokens so they can be revoked and expire cleanly
//!
//! Keyed by the refresh token's `jti`. Revoked sessions stay until their
//! expiry so a revoked token is never accepted again; expired entries are
//! dropped by `prune`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone)]
struct SessionEntry {
    expires_at: DateTime<Utc>,
    revoked: bool,
}

/// In-process refresh session registry
#[derive(Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly issued refresh token
    pub fn register(&self, jti: &str, expires_at: DateTime<Utc>) {
        self.sessions.lock().insert(
            jti.to_string(),
            SessionEntry {
                expires_at,
                revoked: false,
            },
        );
    }

    /// Known, not revoked, not expired
    pub fn is_active(&self, jti: &str) -> bool {
        let now = Utc::now();
        self.sessions
            .lock()
            .get(jti)
            .map(|entry| !entry.revoked && entry.expires_at > now)
            .unwrap_or(false)
    }

    /// Mark a session revoked. Returns false when the session is unknown.
    pub fn revoke(&self, jti: &str) -> bool {
        match self.sessions.lock().get_mut(jti) {
            Some(entry) => {
                entry.revoked = true;
                true
            }
            None => false,
        }
    }

    /// Drop expired sessions, returns how many were removed
    pub fn prune(&self) -> usize {
        self.prune_expired_at(Utc::now())
    }

    fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        let removed = before - sessions.len();
        if removed > 0 {
            debug!("Pruned {} expired refresh sessions", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
