//! Persisted session state plus the cookie mirror read by the edge guard.
//!
//! Storage is authoritative. The cookie is a derived copy of the token that is
//! rewritten on every save and expired on every clear; it is not updated
//! transactionally with storage.

use super::{Session, UserRecord};
use crate::browser::{CookieJar, Storage};
use crate::error::{Result, ShellError};
use std::sync::Arc;
use tracing::{debug, warn};

pub const AUTH_TOKEN_KEY: &str = "raphacure_auth_token";
pub const USER_DATA_KEY: &str = "raphacure_user_data";
/// The cookie shares the token key so the guard and the store agree on it.
pub const SESSION_COOKIE_NAME: &str = AUTH_TOKEN_KEY;
const SESSION_COOKIE_MAX_AGE: u64 = 365 * 24 * 60 * 60;

#[must_use]
pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE_NAME}={token}; path=/; max-age={SESSION_COOKIE_MAX_AGE}; SameSite=Lax")
}

#[must_use]
pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; path=/; max-age=0")
}

#[derive(Clone)]
pub struct SessionStore {
    storage: Option<Arc<dyn Storage>>,
    cookies: Option<Arc<dyn CookieJar>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>, cookies: Arc<dyn CookieJar>) -> Self {
        Self {
            storage: Some(storage),
            cookies: Some(cookies),
        }
    }

    /// Store for contexts without persistent storage (server-side rendering).
    /// Saves and clears are no-ops and loads report "absent".
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            storage: None,
            cookies: None,
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.storage.is_some()
    }

    /// Persist both fields and mirror the token into the cookie.
    ///
    /// # Errors
    /// Returns [`ShellError::Storage`] if either field cannot be written; the
    /// token write is rolled back so storage never holds half a session.
    pub fn save(&self, token: &str, user: &UserRecord) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        let user_json = serde_json::to_string(user)
            .map_err(|err| ShellError::Storage(format!("Failed to encode user: {err}")))?;

        storage.set_item(AUTH_TOKEN_KEY, token)?;
        if let Err(err) = storage.set_item(USER_DATA_KEY, &user_json) {
            if let Err(rollback) = storage.remove_item(AUTH_TOKEN_KEY) {
                warn!("Failed to roll back token after user write failure: {rollback}");
            }
            return Err(err);
        }

        if let Some(cookies) = &self.cookies {
            cookies.write(&session_cookie(token));
        }

        Ok(())
    }

    /// The persisted session, or `None` when absent or corrupt.
    #[must_use]
    pub fn load(&self) -> Option<Session> {
        let storage = self.storage.as_ref()?;
        let token = storage.get_item(AUTH_TOKEN_KEY)?;
        let user_json = storage.get_item(USER_DATA_KEY)?;

        match serde_json::from_str::<UserRecord>(&user_json) {
            Ok(user) => Some(Session { token, user }),
            Err(err) => {
                debug!("Ignoring unreadable stored user: {err}");
                None
            }
        }
    }

    /// Remove both fields and expire the cookie.
    ///
    /// # Errors
    /// Returns [`ShellError::Storage`] if a field cannot be removed; the cookie
    /// is expired regardless.
    pub fn clear(&self) -> Result<()> {
        let Some(storage) = &self.storage else {
            return Ok(());
        };

        let token_result = storage.remove_item(AUTH_TOKEN_KEY);
        let user_result = storage.remove_item(USER_DATA_KEY);

        if let Some(cookies) = &self.cookies {
            cookies.write(&expired_session_cookie());
        }

        token_result.and(user_result)
    }

    /// Token currently mirrored into the cookie, if any.
    #[must_use]
    pub fn cookie_token(&self) -> Option<String> {
        self.cookies
            .as_ref()?
            .read(SESSION_COOKIE_NAME)
            .filter(|token| !token.is_empty())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("available", &self.is_available())
            .finish()
    }
}
