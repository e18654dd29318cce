//! OTP sign-in state machine.
//!
//! ```text
//! Idle -> Requesting -> Sent(countdown) -> Verifying -> Authenticated
//!                         ^    |  tick        |
//!                         |    v              |  rejected / failed
//!                         +-- Sent <----------+
//!
//! Sent --back--> Idle
//! ```
//!
//! Only one backend call is in flight at a time. Each call captures the
//! controller epoch; [`OtpFlow::teardown`] bumps it, so responses that arrive
//! afterwards are discarded without touching the view.

use super::identifier::{classify, Identifier};
use crate::backend::{AuthApi, OtpRequested};
use crate::browser::Navigator;
use crate::error::{Result, ShellError, GENERIC_FAILURE};
use crate::session::{Session, SessionContext};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

pub const OTP_LENGTH: usize = 6;
pub const RESEND_COOLDOWN_SECS: u32 = 60;
/// Shortest input for which the submit action is enabled.
pub const MIN_INPUT_LEN: usize = 6;

pub const INVALID_IDENTIFIER: &str = "Please enter a valid email or 10-digit phone number";
pub const SEND_FAILED: &str = "Failed to send OTP";
pub const INCORRECT_OTP: &str = "Incorrect OTP. Please try again.";
pub const CODE_REQUIRED: &str = "Please enter the 6-digit code";
pub const NO_CODE_REQUESTED: &str = "Request a code before verifying";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OtpPhase {
    Idle,
    Requesting,
    Sent,
    Verifying,
    Authenticated,
}

impl OtpPhase {
    #[must_use]
    pub const fn in_flight(self) -> bool {
        matches!(self, Self::Requesting | Self::Verifying)
    }
}

/// Snapshot rendered by the sign-in screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpView {
    pub phase: OtpPhase,
    pub input: String,
    pub identifier: Option<Identifier>,
    pub terms_accepted: bool,
    pub code: String,
    pub countdown: u32,
    pub input_error: Option<String>,
    pub code_error: Option<String>,
    pub is_new_user: Option<bool>,
}

impl Default for OtpView {
    fn default() -> Self {
        Self {
            phase: OtpPhase::Idle,
            input: String::new(),
            identifier: None,
            terms_accepted: false,
            code: String::new(),
            countdown: 0,
            input_error: None,
            code_error: None,
            is_new_user: None,
        }
    }
}

impl OtpView {
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.input.chars().count() >= MIN_INPUT_LEN && self.terms_accepted && !self.phase.in_flight()
    }

    #[must_use]
    pub const fn can_resend(&self) -> bool {
        matches!(self.phase, OtpPhase::Sent) && self.countdown == 0
    }
}

/// The outstanding code request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OtpChallenge {
    pub identifier: Identifier,
    pub sent_at: Instant,
    pub ttl: Duration,
    pub resends: u32,
}

struct Inner {
    view: OtpView,
    epoch: u64,
    challenge: Option<OtpChallenge>,
    countdown: Option<JoinHandle<()>>,
}

impl Inner {
    fn stop_countdown(&mut self) {
        if let Some(task) = self.countdown.take() {
            task.abort();
        }
    }
}

struct Shared {
    api: Arc<dyn AuthApi>,
    session: Arc<SessionContext>,
    navigator: Arc<dyn Navigator>,
    return_path: String,
    inner: Mutex<Inner>,
    view: watch::Sender<OtpView>,
}

impl Shared {
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock();
        let out = f(&mut inner);
        let view = &inner.view;
        self.view.send_if_modified(|current| {
            if current == view {
                false
            } else {
                current.clone_from(view);
                true
            }
        });
        out
    }

    /// One countdown step; returns false once the ticker should stop.
    fn tick(&self, epoch: u64) -> bool {
        self.update(|inner| {
            if inner.epoch != epoch || inner.challenge.is_none() {
                return false;
            }
            inner.view.countdown = inner.view.countdown.saturating_sub(1);
            inner.view.countdown > 0
        })
    }
}

fn spawn_countdown(shared: &Arc<Shared>, epoch: u64) -> JoinHandle<()> {
    let weak: Weak<Shared> = Arc::downgrade(shared);
    tokio::spawn(async move {
        let period = Duration::from_secs(1);
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(shared) = weak.upgrade() else {
                break;
            };
            if !shared.tick(epoch) {
                break;
            }
        }
    })
}

/// Controller for one sign-in screen. Dropping it tears it down.
pub struct OtpFlow {
    shared: Arc<Shared>,
}

impl OtpFlow {
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        session: Arc<SessionContext>,
        navigator: Arc<dyn Navigator>,
        return_path: impl Into<String>,
    ) -> Self {
        let (view, _) = watch::channel(OtpView::default());
        Self {
            shared: Arc::new(Shared {
                api,
                session,
                navigator,
                return_path: return_path.into(),
                inner: Mutex::new(Inner {
                    view: OtpView::default(),
                    epoch: 0,
                    challenge: None,
                    countdown: None,
                }),
                view,
            }),
        }
    }

    #[must_use]
    pub fn view(&self) -> OtpView {
        self.shared.inner.lock().view.clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OtpView> {
        self.shared.view.subscribe()
    }

    #[must_use]
    pub fn challenge(&self) -> Option<OtpChallenge> {
        self.shared.inner.lock().challenge.clone()
    }

    #[must_use]
    pub fn return_path(&self) -> &str {
        &self.shared.return_path
    }

    pub fn set_input(&self, value: &str) {
        self.shared.update(|inner| {
            inner.view.input = value.to_string();
            inner.view.identifier = classify(value);
            inner.view.input_error = None;
        });
    }

    pub fn set_terms_accepted(&self, accepted: bool) {
        self.shared
            .update(|inner| inner.view.terms_accepted = accepted);
    }

    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.shared.inner.lock().view.can_submit()
    }

    /// Ask the backend to send a code to the current input.
    ///
    /// # Errors
    /// [`ShellError::Validation`] for an unusable identifier (no network
    /// call), [`ShellError::Busy`] while another call is in flight,
    /// [`ShellError::CooldownActive`] while a sent code is still cooling down,
    /// or the backend failure.
    pub async fn request_otp(&self) -> Result<OtpRequested> {
        let (identifier, previous, epoch) = self.shared.update(|inner| {
            if inner.view.phase.in_flight() {
                return Err(ShellError::Busy);
            }
            if inner.view.phase == OtpPhase::Sent && inner.view.countdown > 0 {
                return Err(ShellError::CooldownActive);
            }
            let Some(identifier) = classify(&inner.view.input) else {
                inner.view.input_error = Some(INVALID_IDENTIFIER.to_string());
                return Err(ShellError::Validation(INVALID_IDENTIFIER.to_string()));
            };
            let previous = inner.view.phase;
            inner.view.phase = OtpPhase::Requesting;
            inner.view.identifier = Some(identifier.clone());
            inner.view.input_error = None;
            Ok((identifier, previous, inner.epoch))
        })?;

        debug!(kind = identifier.kind(), "Requesting OTP");
        let result = self.shared.api.request_otp(&identifier).await;

        self.shared.update(|inner| {
            if inner.epoch != epoch {
                debug!("Discarding OTP response after teardown");
                return Err(ShellError::Cancelled);
            }
            match result {
                Ok(outcome) => {
                    let resends = match (&inner.challenge, previous) {
                        (Some(challenge), OtpPhase::Sent) => challenge.resends + 1,
                        _ => 0,
                    };
                    inner.challenge = Some(OtpChallenge {
                        identifier,
                        sent_at: Instant::now(),
                        ttl: Duration::from_secs(u64::from(RESEND_COOLDOWN_SECS)),
                        resends,
                    });
                    inner.view.phase = OtpPhase::Sent;
                    inner.view.countdown = RESEND_COOLDOWN_SECS;
                    inner.view.code.clear();
                    inner.view.input_error = None;
                    inner.view.code_error = None;
                    inner.view.is_new_user = Some(outcome.is_new_user);
                    inner.stop_countdown();
                    inner.countdown = Some(spawn_countdown(&self.shared, epoch));
                    info!(resends, "OTP sent");
                    Ok(outcome)
                }
                Err(err) => {
                    warn!("OTP request failed: {err}");
                    inner.view.phase = previous;
                    inner.view.input_error = Some(err.user_message(SEND_FAILED));
                    Err(err)
                }
            }
        })
    }

    /// Request a fresh code once the countdown has reached zero.
    ///
    /// # Errors
    /// [`ShellError::CooldownActive`] unless a code was sent and the countdown
    /// is at zero; otherwise as [`OtpFlow::request_otp`].
    pub async fn resend(&self) -> Result<OtpRequested> {
        {
            let inner = self.shared.inner.lock();
            if inner.view.phase.in_flight() {
                return Err(ShellError::Busy);
            }
            if !inner.view.can_resend() {
                return Err(ShellError::CooldownActive);
            }
        }
        self.request_otp().await
    }

    /// Record typed or pasted code input, verifying automatically once six
    /// digits are present.
    ///
    /// Returns the session when the automatic verification signed the user in.
    ///
    /// # Errors
    /// [`ShellError::Busy`] while a call is in flight, or the verification
    /// failure.
    pub async fn enter_code(&self, value: &str) -> Result<Option<Session>> {
        let complete = self.shared.update(|inner| {
            if inner.view.phase.in_flight() {
                return Err(ShellError::Busy);
            }
            inner.view.code = value
                .chars()
                .filter(char::is_ascii_digit)
                .take(OTP_LENGTH)
                .collect();
            inner.view.code_error = None;
            Ok(inner.view.phase == OtpPhase::Sent && inner.view.code.len() == OTP_LENGTH)
        })?;

        if complete {
            self.verify().await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Verify the entered code and sign in.
    ///
    /// # Errors
    /// [`ShellError::Validation`] without a complete code or outstanding
    /// challenge, [`ShellError::Busy`] while a call is in flight, or the
    /// backend failure.
    pub async fn verify(&self) -> Result<Session> {
        let (identifier, code, epoch) = self.shared.update(|inner| {
            if inner.view.phase.in_flight() {
                return Err(ShellError::Busy);
            }
            let challenge = match (&inner.challenge, inner.view.phase) {
                (Some(challenge), OtpPhase::Sent) => challenge,
                _ => return Err(ShellError::Validation(NO_CODE_REQUESTED.to_string())),
            };
            if inner.view.code.len() != OTP_LENGTH {
                inner.view.code_error = Some(CODE_REQUIRED.to_string());
                return Err(ShellError::Validation(CODE_REQUIRED.to_string()));
            }
            let identifier = challenge.identifier.clone();
            inner.view.phase = OtpPhase::Verifying;
            inner.view.code_error = None;
            Ok((identifier, inner.view.code.clone(), inner.epoch))
        })?;

        debug!(kind = identifier.kind(), "Verifying OTP");
        let result = self.shared.api.verify_otp(&identifier, &code).await;

        let session = self.shared.update(|inner| {
            if inner.epoch != epoch {
                debug!("Discarding OTP verification after teardown");
                return Err(ShellError::Cancelled);
            }
            result.map_err(|err| {
                warn!("OTP verification failed: {err}");
                inner.view.phase = OtpPhase::Sent;
                inner.view.code_error = Some(if err.is_transport() {
                    GENERIC_FAILURE.to_string()
                } else {
                    INCORRECT_OTP.to_string()
                });
                err
            })
        })?;

        if let Err(err) = self
            .shared
            .session
            .login(session.token.clone(), session.user.clone())
        {
            warn!("Failed to persist session: {err}");
            self.shared.update(|inner| {
                inner.view.phase = OtpPhase::Sent;
                inner.view.code_error = Some(GENERIC_FAILURE.to_string());
            });
            return Err(err);
        }

        self.shared.update(|inner| {
            inner.view.phase = OtpPhase::Authenticated;
            inner.view.countdown = 0;
            inner.challenge = None;
            inner.stop_countdown();
        });
        self.shared.navigator.assign(&self.shared.return_path);
        Ok(session)
    }

    /// Clear the entered code, e.g. after a rejected attempt.
    pub fn clear_code(&self) {
        self.shared.update(|inner| {
            inner.view.code.clear();
            inner.view.code_error = None;
        });
    }

    /// Leave the code step to correct the identifier. The input is kept and a
    /// new code can be requested at once; any response still in flight is
    /// discarded.
    pub fn back(&self) {
        self.shared.update(|inner| {
            inner.epoch += 1;
            inner.stop_countdown();
            inner.challenge = None;
            inner.view.phase = OtpPhase::Idle;
            inner.view.countdown = 0;
            inner.view.code.clear();
            inner.view.code_error = None;
        });
        debug!("Returned to identifier entry");
    }

    /// Stop the countdown and discard any response still in flight.
    pub fn teardown(&self) {
        self.shared.update(|inner| {
            inner.epoch += 1;
            inner.stop_countdown();
            inner.challenge = None;
        });
    }
}

impl Drop for OtpFlow {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for OtpFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OtpFlow")
            .field("view", &self.view())
            .field("return_path", &self.shared.return_path)
            .finish_non_exhaustive()
    }
}
