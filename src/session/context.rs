//! Process-wide session state. One [`SessionContext`] is built at startup,
//! hydrated once from the [`SessionStore`], and shared by reference with
//! every consumer. Changes are broadcast through a `watch` channel.

use super::{Session, SessionStore, UserRecord};
use crate::error::{Result, ShellError};
use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::watch;
use tracing::{debug, info};

tokio::task_local! {
    static CURRENT: Arc<SessionContext>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub session: Option<Session>,
    pub is_loading: bool,
}

impl SessionState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }
}

pub struct SessionContext {
    store: SessionStore,
    state: watch::Sender<SessionState>,
    initialized: AtomicBool,
}

impl SessionContext {
    #[must_use]
    pub fn new(store: SessionStore) -> Self {
        let (state, _) = watch::channel(SessionState {
            session: None,
            is_loading: true,
        });
        Self {
            store,
            state,
            initialized: AtomicBool::new(false),
        }
    }

    /// Hydrate from the store. Only the first call has an effect.
    pub async fn init(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let session = self.store.load();
        debug!(restored = session.is_some(), "Session hydrated from storage");
        self.state.send_modify(|state| {
            // a login that raced the hydration wins
            if state.session.is_none() {
                state.session = session;
            }
            state.is_loading = false;
        });
    }

    /// Persist and activate a session.
    ///
    /// # Errors
    /// Returns the store error; the in-memory state is left unchanged.
    pub fn login(&self, token: impl Into<String>, user: UserRecord) -> Result<()> {
        let token = token.into();
        self.store.save(&token, &user)?;
        self.state.send_modify(|state| {
            state.session = Some(Session { token, user });
        });
        info!("Signed in");
        Ok(())
    }

    /// Clear the persisted and in-memory session.
    ///
    /// # Errors
    /// Returns the store error; the in-memory state is cleared regardless.
    pub fn logout(&self) -> Result<()> {
        let cleared = self.store.clear();
        self.state.send_modify(|state| state.session = None);
        info!("Signed out");
        cleared
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_some()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.state.borrow().session.clone()
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|session| session.token.clone())
    }

    #[must_use]
    pub fn user(&self) -> Option<UserRecord> {
        self.state
            .borrow()
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Resolve once hydration has finished.
    pub async fn wait_until_loaded(&self) -> SessionState {
        let mut receiver = self.subscribe();
        let state = match receiver.wait_for(|state| !state.is_loading).await {
            Ok(state) => state.clone(),
            // the sender lives in `self`, so this only happens during teardown
            Err(_) => self.snapshot(),
        };
        state
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Run `future` with `context` installed for [`use_session`].
    pub async fn provide<F: Future>(context: Arc<Self>, future: F) -> F::Output {
        CURRENT.scope(context, future).await
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("SessionContext")
            .field("is_authenticated", &state.session.is_some())
            .field("is_loading", &state.is_loading)
            .finish_non_exhaustive()
    }
}

/// The context installed by [`SessionContext::provide`].
///
/// # Errors
/// Returns [`ShellError::Config`] when called outside a provider.
pub fn use_session() -> Result<Arc<SessionContext>> {
    CURRENT.try_with(Arc::clone).map_err(|_| {
        ShellError::Config("use_session must be used within a session provider".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{CookieJar, MemoryCookieJar, MemoryStorage};
    use crate::session::store::SESSION_COOKIE_NAME;
    use serde_json::json;

    fn parts() -> (SessionStore, Arc<MemoryCookieJar>) {
        let cookies = Arc::new(MemoryCookieJar::new());
        (
            SessionStore::new(Arc::new(MemoryStorage::new()), cookies.clone()),
            cookies,
        )
    }

    fn user() -> UserRecord {
        serde_json::from_value(json!({"id": "u-7", "token": "jwt"})).unwrap_or_default()
    }

    #[tokio::test]
    async fn starts_loading_until_init() {
        let (store, _) = parts();
        let context = SessionContext::new(store);
        assert!(context.is_loading());
        context.init().await;
        assert!(!context.is_loading());
        assert!(!context.is_authenticated());
    }

    #[tokio::test]
    async fn init_restores_persisted_session() -> anyhow::Result<()> {
        let (store, _) = parts();
        store.save("tok", &user())?;

        let context = SessionContext::new(store);
        context.init().await;
        assert!(context.is_authenticated());
        assert_eq!(context.token().as_deref(), Some("tok"));
        assert_eq!(context.user(), Some(user()));
        Ok(())
    }

    #[tokio::test]
    async fn init_runs_once() -> anyhow::Result<()> {
        let (store, _) = parts();
        let context = SessionContext::new(store.clone());
        context.init().await;

        store.save("later", &user())?;
        context.init().await;
        assert!(!context.is_authenticated());
        Ok(())
    }

    #[tokio::test]
    async fn login_and_logout_update_store_cookie_and_subscribers() -> anyhow::Result<()> {
        let (store, cookies) = parts();
        let context = SessionContext::new(store.clone());
        context.init().await;
        let mut updates = context.subscribe();

        context.login("tok", user())?;
        assert!(updates.has_changed()?);
        assert!(updates.borrow_and_update().is_authenticated());
        assert_eq!(
            store.load().map(|session| session.token),
            Some("tok".to_string())
        );
        assert_eq!(cookies.read(SESSION_COOKIE_NAME).as_deref(), Some("tok"));

        context.logout()?;
        assert!(updates.has_changed()?);
        assert!(!updates.borrow_and_update().is_authenticated());
        assert_eq!(store.load(), None);
        assert_eq!(cookies.read(SESSION_COOKIE_NAME), None);
        Ok(())
    }

    #[tokio::test]
    async fn wait_until_loaded_resolves_after_init() {
        let (store, _) = parts();
        let context = Arc::new(SessionContext::new(store));

        let waiter = {
            let context = context.clone();
            tokio::spawn(async move { context.wait_until_loaded().await })
        };
        context.init().await;

        let state = waiter.await;
        assert!(state.is_ok_and(|state| !state.is_loading));
    }

    #[tokio::test]
    async fn use_session_fails_outside_provider() {
        assert!(matches!(use_session(), Err(ShellError::Config(_))));
    }

    #[tokio::test]
    async fn use_session_returns_provided_context() {
        let (store, _) = parts();
        let context = Arc::new(SessionContext::new(store));

        let found = SessionContext::provide(context.clone(), async { use_session() }).await;
        assert!(found.is_ok_and(|found| Arc::ptr_eq(&found, &context)));
    }
}
