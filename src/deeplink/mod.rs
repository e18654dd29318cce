//! Deep-link SSO handoff.
//!
//! A deep link outside the core routes opens the requested location inside an
//! embedded frame: mint a one-time SSO URL for the signed-in user, load it,
//! and once the frame reports it has loaded wait [`SETTLE_DELAY`] before
//! pointing the frame at the same path on the SSO origin. The rewrite happens
//! at most once per orchestrator.

use crate::backend::AuthApi;
use crate::browser::{Frame, Navigator};
use crate::error::{Result, ShellError};
use crate::routes::{signin_redirect, RouteTable};
use crate::session::SessionContext;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use url::Url;

pub const SETTLE_DELAY: Duration = Duration::from_millis(1500);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeepLinkView {
    /// Waiting for the session or the SSO URL.
    Loading,
    /// A full navigation to this location was issued.
    Redirecting(String),
    /// Signed-in card without an embedded frame.
    Fallback,
    Frame { url: Url, loaded: bool },
}

/// Handoff progress for the current page.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeepLinkSession {
    pub sso_url: Option<Url>,
    pub loaded: bool,
    pub navigated_to_path: bool,
}

#[derive(Default)]
struct Inner {
    path: Option<String>,
    handoff: DeepLinkSession,
    frame_url: Option<Url>,
    settle: Option<JoinHandle<()>>,
    epoch: u64,
}

struct Shared {
    api: Arc<dyn AuthApi>,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    frame: Arc<dyn Frame>,
    routes: RouteTable,
    inner: Mutex<Inner>,
    view: watch::Sender<DeepLinkView>,
}

impl Shared {
    fn publish(&self, view: DeepLinkView) {
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }

    fn rewrite(&self, epoch: u64) {
        let target = {
            let mut inner = self.inner.lock();
            inner.settle = None;
            if inner.epoch != epoch || inner.handoff.navigated_to_path {
                return;
            }
            let (Some(sso_url), Some(path)) = (&inner.handoff.sso_url, &inner.path) else {
                return;
            };
            let target = match path_on_origin(sso_url, path) {
                Ok(target) => target,
                Err(err) => {
                    error!("Failed to build frame location: {err}");
                    return;
                }
            };
            inner.handoff.navigated_to_path = true;
            inner.frame_url = Some(target.clone());
            self.publish(DeepLinkView::Frame {
                url: target.clone(),
                loaded: inner.handoff.loaded,
            });
            target
        };

        info!(path = target.path(), "Pointing frame at requested path");
        self.frame.load(&target);
    }
}

/// `<scheme>://<host[:port]><path>` of `sso_url`.
fn path_on_origin(sso_url: &Url, path: &str) -> Result<Url> {
    let host = sso_url
        .host_str()
        .ok_or_else(|| ShellError::Parse("SSO URL has no host".to_string()))?;
    let authority = match sso_url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    Url::parse(&format!("{}://{authority}{path}", sso_url.scheme()))
        .map_err(|err| ShellError::Parse(format!("Invalid frame location: {err}")))
}

fn spawn_settle(shared: &Arc<Shared>, epoch: u64) -> JoinHandle<()> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    tokio::spawn(async move {
        tokio::time::sleep(SETTLE_DELAY).await;
        if let Some(shared) = weak.upgrade() {
            shared.rewrite(epoch);
        }
    })
}

pub struct DeepLinkOrchestrator {
    shared: Arc<Shared>,
}

impl DeepLinkOrchestrator {
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
        frame: Arc<dyn Frame>,
        routes: RouteTable,
    ) -> Self {
        let (view, _) = watch::channel(DeepLinkView::Loading);
        Self {
            shared: Arc::new(Shared {
                api,
                session,
                navigator,
                frame,
                routes,
                inner: Mutex::new(Inner::default()),
                view,
            }),
        }
    }

    #[must_use]
    pub fn view(&self) -> DeepLinkView {
        self.shared.view.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DeepLinkView> {
        self.shared.view.subscribe()
    }

    #[must_use]
    pub fn handoff(&self) -> DeepLinkSession {
        self.shared.inner.lock().handoff.clone()
    }

    #[must_use]
    pub fn frame_url(&self) -> Option<Url> {
        self.shared.inner.lock().frame_url.clone()
    }

    /// Begin the handoff for `path`.
    ///
    /// # Errors
    /// [`ShellError::Validation`] when `path` is a core route,
    /// [`ShellError::MissingCredential`] when the user record carries no access
    /// token, [`ShellError::Cancelled`] after teardown, or the backend failure.
    /// Every failure leaves the fallback view.
    pub async fn start(&self, path: &str) -> Result<()> {
        if !self.shared.routes.is_deep_link(path) {
            return Err(ShellError::Validation(format!("{path} is not a deep link")));
        }

        let epoch = {
            let mut inner = self.shared.inner.lock();
            inner.path = Some(path.to_string());
            inner.epoch
        };
        self.shared.publish(DeepLinkView::Loading);

        let state = self.shared.session.wait_until_loaded().await;
        if self.shared.inner.lock().epoch != epoch {
            return Err(ShellError::Cancelled);
        }

        let Some(session) = state.session else {
            let location = signin_redirect(path);
            debug!("No session, redirecting to sign in");
            self.shared
                .publish(DeepLinkView::Redirecting(location.clone()));
            self.shared.navigator.assign(&location);
            return Ok(());
        };

        let Some(access_token) = session.user.access_token() else {
            debug!("User record has no access token");
            self.shared.publish(DeepLinkView::Fallback);
            return Err(ShellError::MissingCredential);
        };

        let result = self.shared.api.sign_in_as_user(&access_token).await;

        let sso_url = {
            let mut inner = self.shared.inner.lock();
            if inner.epoch != epoch {
                debug!("Discarding SSO response after teardown");
                return Err(ShellError::Cancelled);
            }
            match result {
                Ok(url) => {
                    inner.handoff.sso_url = Some(url.clone());
                    inner.frame_url = Some(url.clone());
                    url
                }
                Err(err) => {
                    warn!("Failed to mint SSO URL: {err}");
                    drop(inner);
                    self.shared.publish(DeepLinkView::Fallback);
                    return Err(err);
                }
            }
        };

        self.shared.publish(DeepLinkView::Frame {
            url: sso_url.clone(),
            loaded: false,
        });
        self.shared.frame.load(&sso_url);
        Ok(())
    }

    /// Load signal from the frame. The first one after the SSO URL loads
    /// schedules the path rewrite; the rest only mark the frame loaded.
    pub fn frame_loaded(&self) {
        let mut inner = self.shared.inner.lock();
        inner.handoff.loaded = true;
        if let Some(url) = inner.frame_url.clone() {
            self.shared.publish(DeepLinkView::Frame { url, loaded: true });
        }

        let pending = inner.handoff.navigated_to_path || inner.settle.is_some();
        if !pending && inner.handoff.sso_url.is_some() && inner.path.is_some() {
            debug!("Frame loaded, scheduling path rewrite");
            let epoch = inner.epoch;
            inner.settle = Some(spawn_settle(&self.shared, epoch));
        }
    }

    /// # Errors
    /// Returns the store error from [`SessionContext::logout`]; the in-memory
    /// session is cleared regardless.
    pub fn sign_out(&self) -> Result<()> {
        let result = self.shared.session.logout();
        let path = self.shared.inner.lock().path.clone();
        if let Some(path) = path {
            let location = signin_redirect(&path);
            self.shared
                .publish(DeepLinkView::Redirecting(location.clone()));
            self.shared.navigator.assign(&location);
        }
        result
    }

    /// Cancel the pending rewrite and discard any SSO response still in flight.
    pub fn teardown(&self) {
        let mut inner = self.shared.inner.lock();
        inner.epoch += 1;
        if let Some(task) = inner.settle.take() {
            task.abort();
        }
    }
}

impl Drop for DeepLinkOrchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for DeepLinkOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepLinkOrchestrator")
            .field("view", &self.view())
            .field("handoff", &self.handoff())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeAuthApi;
    use crate::browser::{MemoryCookieJar, MemoryStorage, RecordingFrame, RecordingNavigator};
    use crate::session::{SessionStore, UserRecord};
    use serde_json::json;

    const SSO: &str = "https://app.raphacure.com:8443/sso?code=abc";

    struct Harness {
        api: Arc<FakeAuthApi>,
        session: Arc<SessionContext>,
        navigator: Arc<RecordingNavigator>,
        frame: Arc<RecordingFrame>,
        orchestrator: Arc<DeepLinkOrchestrator>,
    }

    fn harness() -> Harness {
        let api = FakeAuthApi::new();
        let session = Arc::new(SessionContext::new(SessionStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(MemoryCookieJar::new()),
        )));
        let navigator = Arc::new(RecordingNavigator::new());
        let frame = Arc::new(RecordingFrame::new());
        let orchestrator = Arc::new(DeepLinkOrchestrator::new(
            api.clone(),
            session.clone(),
            navigator.clone(),
            frame.clone(),
            RouteTable::default(),
        ));
        Harness {
            api,
            session,
            navigator,
            frame,
            orchestrator,
        }
    }

    fn sign_in(h: &Harness, user: serde_json::Value) -> anyhow::Result<()> {
        let user: UserRecord = serde_json::from_value(user)?;
        h.session.login("tok", user)?;
        Ok(())
    }

    #[tokio::test]
    async fn core_routes_are_not_deep_links() {
        let h = harness();
        h.session.init().await;
        assert!(matches!(
            h.orchestrator.start("/dashboard").await,
            Err(ShellError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn unauthenticated_user_is_sent_to_sign_in() -> anyhow::Result<()> {
        let h = harness();
        let pending = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.start("/consultation/7").await })
        };
        tokio::task::yield_now().await;
        assert!(h.navigator.visits().is_empty());

        h.session.init().await;
        pending.await??;

        assert_eq!(
            h.navigator.visits(),
            ["/signin?redirect=%2Fconsultation%2F7"]
        );
        assert!(h.api.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_access_token_falls_back_silently() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"id": "u-1"}))?;

        assert_eq!(
            h.orchestrator.start("/consultation/7").await,
            Err(ShellError::MissingCredential)
        );
        assert_eq!(h.orchestrator.view(), DeepLinkView::Fallback);
        assert!(h.api.calls().is_empty());
        assert!(h.frame.loads().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn sso_failure_leaves_fallback() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"accessToken": "jwt-1"}))?;
        h.api
            .push_sign_in_as_user(Err(ShellError::Rejected(None)));

        assert!(h.orchestrator.start("/consultation/7").await.is_err());
        assert_eq!(h.orchestrator.view(), DeepLinkView::Fallback);
        assert_eq!(h.api.calls(), ["sign_in_as_user:jwt-1"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn frame_is_rewritten_once_after_settle_delay() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"token": "jwt-2"}))?;
        let sso = Url::parse(SSO)?;
        h.api.push_sign_in_as_user(Ok(sso.clone()));

        h.orchestrator.start("/consultation/7").await?;
        assert_eq!(h.api.calls(), ["sign_in_as_user:jwt-2"]);
        assert_eq!(h.frame.loads(), [sso.clone()]);
        assert_eq!(
            h.orchestrator.view(),
            DeepLinkView::Frame {
                url: sso.clone(),
                loaded: false
            }
        );

        h.orchestrator.frame_loaded();
        tokio::time::sleep(Duration::from_millis(1400)).await;
        assert_eq!(h.frame.loads().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let target = Url::parse("https://app.raphacure.com:8443/consultation/7")?;
        assert_eq!(h.frame.loads(), [sso, target.clone()]);
        assert!(h.orchestrator.handoff().navigated_to_path);
        assert_eq!(
            h.orchestrator.view(),
            DeepLinkView::Frame {
                url: target,
                loaded: true
            }
        );

        h.orchestrator.frame_loaded();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(h.frame.loads().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_load_signals_schedule_one_rewrite() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"token": "jwt-2"}))?;
        h.api.push_sign_in_as_user(Ok(Url::parse(SSO)?));
        h.orchestrator.start("/orders").await?;

        h.orchestrator.frame_loaded();
        tokio::time::sleep(Duration::from_millis(700)).await;
        h.orchestrator.frame_loaded();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(h.frame.loads().len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_rewrite() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"token": "jwt-2"}))?;
        h.api.push_sign_in_as_user(Ok(Url::parse(SSO)?));
        h.orchestrator.start("/orders").await?;

        h.orchestrator.frame_loaded();
        h.orchestrator.teardown();
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(h.frame.loads().len(), 1);
        assert!(!h.orchestrator.handoff().navigated_to_path);
        Ok(())
    }

    #[tokio::test]
    async fn late_sso_response_after_teardown_is_discarded() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"token": "jwt-2"}))?;
        h.api.push_sign_in_as_user(Ok(Url::parse(SSO)?));
        let gate = h.api.hold();

        let pending = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.start("/orders").await })
        };
        while h.api.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        h.orchestrator.teardown();
        gate.notify_one();

        assert_eq!(pending.await?, Err(ShellError::Cancelled));
        assert!(h.frame.loads().is_empty());
        assert_eq!(h.orchestrator.handoff().sso_url, None);
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_clears_session_and_redirects() -> anyhow::Result<()> {
        let h = harness();
        h.session.init().await;
        sign_in(&h, json!({"id": "u-1"}))?;
        let _ = h.orchestrator.start("/orders").await;

        h.orchestrator.sign_out()?;
        assert!(!h.session.is_authenticated());
        assert_eq!(h.navigator.last().as_deref(), Some("/signin?redirect=%2Forders"));
        Ok(())
    }
}
