//! Client-side session: auth token, user id, and the logged-in signal.
//!
//! ARCHITECTURE
//! ============
//! Login state has two read paths. Client code reads the token from
//! storage (`SessionStore::token`). Routing code runs where that storage is
//! unavailable, so it reads a non-secret `logged_in` cookie instead
//! (`has_signal`). The store writes both in one batch so the signal is
//! present exactly when the token is.
//!
//! The server is the authority on token validity. Nothing here expires the
//! token; only the signal cookie carries its own 7-day lifetime.

pub mod storage;

use std::sync::Arc;

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

pub use storage::{FileStorage, MemoryStorage, Mutation, SessionError, Storage, Unavailable};

/// Name of the non-secret cookie that marks a logged-in browser.
pub const SIGNAL_COOKIE_NAME: &str = "logged_in";
/// Lifetime of the signal cookie, independent of the token.
pub const SIGNAL_MAX_AGE: Duration = Duration::days(7);

const TOKEN_KEY: &str = "token";
const USER_ID_KEY: &str = "user_id";

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub user_id: Option<i64>,
    pub logged_in: bool,
}

/// Session context shared by the gateway and the pages.
///
/// Create one at start-up over the storage backend for the current
/// context and pass it (as `Arc<SessionStore>`) to whatever needs it.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("logged_in", &self.token().is_some())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Store over [`MemoryStorage`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Store for contexts without client storage; every read is empty.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(Arc::new(Unavailable))
    }

    /// Persist token and user id, and set the signal cookie.
    ///
    /// A `None` user id removes any id left over from an earlier session.
    /// An empty token is not a session: nothing is written and the stored
    /// state is left as it was.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend could not persist the batch.
    pub fn set_session(&self, token: &str, user_id: Option<i64>) -> Result<(), SessionError> {
        self.set_session_at(token, user_id, OffsetDateTime::now_utc())
    }

    fn set_session_at(&self, token: &str, user_id: Option<i64>, now: OffsetDateTime) -> Result<(), SessionError> {
        if token.is_empty() {
            tracing::warn!(?user_id, "ignoring empty session token");
            return Ok(());
        }
        let user_mutation = match user_id {
            Some(id) => Mutation::Set(USER_ID_KEY, id.to_string()),
            None => Mutation::Remove(USER_ID_KEY),
        };
        self.storage.apply(&[
            Mutation::Set(TOKEN_KEY, token.to_owned()),
            user_mutation,
            Mutation::Set(SIGNAL_COOKIE_NAME, signal_cookie(now).to_string()),
        ])?;
        tracing::debug!(?user_id, "session stored");
        Ok(())
    }

    /// Store or remove the user id without touching the token.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend could not persist the write.
    pub fn set_user_id(&self, user_id: Option<i64>) -> Result<(), SessionError> {
        let mutation = match user_id {
            Some(id) => Mutation::Set(USER_ID_KEY, id.to_string()),
            None => Mutation::Remove(USER_ID_KEY),
        };
        self.storage.apply(&[mutation])
    }

    /// Remove token, user id and signal together.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage backend could not persist the batch;
    /// the previous session is then still intact.
    pub fn clear_session(&self) -> Result<(), SessionError> {
        self.storage.apply(&[
            Mutation::Remove(TOKEN_KEY),
            Mutation::Remove(USER_ID_KEY),
            Mutation::Remove(SIGNAL_COOKIE_NAME),
        ])?;
        tracing::debug!("session cleared");
        Ok(())
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.storage.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    #[must_use]
    pub fn user_id(&self) -> Option<i64> {
        self.storage
            .get(USER_ID_KEY)
            .and_then(|raw| raw.trim().parse().ok())
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        let token = self.token();
        let logged_in = token.is_some() && self.signal_cookie().is_some();
        Session { token, user_id: self.user_id(), logged_in }
    }

    /// The stored signal cookie, if set and not yet expired.
    #[must_use]
    pub fn signal_cookie(&self) -> Option<Cookie<'static>> {
        self.signal_cookie_at(OffsetDateTime::now_utc())
    }

    fn signal_cookie_at(&self, now: OffsetDateTime) -> Option<Cookie<'static>> {
        let raw = self.storage.get(SIGNAL_COOKIE_NAME)?;
        let cookie = Cookie::parse(raw).ok()?;
        if cookie.value().is_empty() {
            return None;
        }
        match cookie.expires_datetime() {
            Some(expires) if expires <= now => None,
            _ => Some(cookie),
        }
    }

    /// `Cookie` header value a client sends to the guarded page server.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        self.signal_cookie()
            .map(|c| format!("{}={}", c.name(), c.value()))
    }
}

fn signal_cookie(now: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((SIGNAL_COOKIE_NAME, "1"))
        .path("/")
        .max_age(SIGNAL_MAX_AGE)
        .expires(now + SIGNAL_MAX_AGE)
        .same_site(SameSite::Lax)
        .build()
}

/// Whether a raw `Cookie` header carries the logged-in signal.
///
/// True only when a `;`-separated part is named exactly
/// [`SIGNAL_COOKIE_NAME`] and has a non-empty value.
#[must_use]
pub fn has_signal(cookie_header: Option<&str>) -> bool {
    let Some(header) = cookie_header else {
        return false;
    };
    header.split(';').any(|part| {
        part.trim()
            .split_once('=')
            .is_some_and(|(name, value)| name == SIGNAL_COOKIE_NAME && !value.is_empty())
    })
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
