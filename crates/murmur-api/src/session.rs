use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::FromRequestParts, http::request::Parts};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Utc};
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::info;

/// Immutable view of the caller's session, taken once per request (or once
/// per live connection, at upgrade time).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    /// Token from the request's cookie, if it named a live session.
    pub token: Option<String>,
    pub username: Option<String>,
    pub signed_in: bool,
}

impl SessionContext {
    pub fn authenticated_user(&self) -> Option<AuthenticatedUser> {
        match (&self.username, self.signed_in) {
            (Some(username), true) => Some(AuthenticatedUser {
                username: username.clone(),
            }),
            _ => None,
        }
    }
}

/// Inserted by `require_auth` for handlers behind the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub username: String,
}

impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_default())
    }
}

struct SessionRecord {
    username: String,
    signed_in: bool,
    expires_at: DateTime<Utc>,
}

/// In-memory session table keyed by opaque random tokens.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
    ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Start an authenticated session. Username and signed-in flag land in
    /// a single insert, so no reader ever sees one without the other.
    pub async fn sign_in(&self, username: &str) -> String {
        let token = new_token();
        let record = SessionRecord {
            username: username.to_string(),
            signed_in: true,
            expires_at: expiry(Utc::now(), self.ttl),
        };
        self.sessions.write().await.insert(token.clone(), record);
        token
    }

    /// Resolve a token. Unknown and expired tokens give an anonymous context.
    pub async fn lookup(&self, token: &str) -> SessionContext {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(record) if record.expires_at > now => {
                    return SessionContext {
                        token: Some(token.to_string()),
                        username: Some(record.username.clone()),
                        signed_in: record.signed_in,
                    };
                }
                Some(_) => {}
                None => return SessionContext::default(),
            }
        }

        // Expired: drop it now rather than waiting for the sweep.
        self.sessions.write().await.remove(token);
        SessionContext::default()
    }

    /// Returns whether the token named a session.
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

/// `now + ttl`, saturating instead of overflowing.
fn expiry(now: DateTime<Utc>, ttl: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    B64.encode(bytes)
}

/// Background task that prunes expired sessions.
pub async fn run_sweep_loop(sessions: Arc<SessionStore>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        let count = sessions.prune_expired().await;
        if count > 0 {
            info!("Session sweep: pruned {} expired sessions", count);
        }
    }
}
