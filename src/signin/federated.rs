//! Federated (Google) sign-in: provider access token, then provider profile,
//! then backend session.

use crate::backend::{AuthApi, GoogleLoginRequest, DEFAULT_TIMEOUT};
use crate::error::{Result, ShellError};
use crate::session::{Session, SessionContext};
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{header::ACCEPT, Client};
use serde::Deserialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, error, info, instrument};
use url::Url;

pub const DEFAULT_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v1/userinfo";
pub const GOOGLE_LOGIN_FAILED: &str = "Google login failed";
pub const GOOGLE_LOGIN_UNAVAILABLE: &str = "Failed to login with Google";

/// Subset of the provider's userinfo document.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ProviderProfile {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

impl ProviderProfile {
    /// Backend payload for this profile, or `None` without a provider id.
    #[must_use]
    pub fn into_login_request(self, access_token: &str) -> Option<GoogleLoginRequest> {
        let id = self.id.filter(|id| !id.is_empty())?;
        Some(GoogleLoginRequest {
            email: self.email,
            external_identifier: id,
            external_display_identifier: GoogleLoginRequest::DISPLAY_IDENTIFIER,
            oauth_token: access_token.to_string(),
            provider_system_name: GoogleLoginRequest::PROVIDER_SYSTEM_NAME,
            first_name: self.given_name,
            last_name: self.family_name,
            role_code: GoogleLoginRequest::ROLE_CODE,
            profile_image: self.picture,
        })
    }
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile>;
}

#[derive(Clone, Debug)]
pub struct GoogleProfileClient {
    http: Client,
    userinfo_url: Url,
}

impl GoogleProfileClient {
    /// # Errors
    /// Returns [`ShellError::Config`] if the HTTP client cannot be built.
    pub fn new(userinfo_url: Url) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|err| ShellError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { http, userinfo_url })
    }
}

#[async_trait]
impl ProfileProvider for GoogleProfileClient {
    #[instrument(skip_all)]
    async fn fetch_profile(&self, access_token: &str) -> Result<ProviderProfile> {
        let mut url = self.userinfo_url.clone();
        url.query_pairs_mut()
            .append_pair("access_token", access_token);

        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        debug!(status = response.status().as_u16(), "Provider profile response");

        response
            .json::<ProviderProfile>()
            .await
            .map_err(ShellError::from)
    }
}

type SuccessCallback = Box<dyn Fn(&Session) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Exchanges a provider result for a backend session.
pub struct FederatedLogin {
    api: Arc<dyn AuthApi>,
    profiles: Arc<dyn ProfileProvider>,
    session: Arc<SessionContext>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
    loading: AtomicBool,
}

impl FederatedLogin {
    #[must_use]
    pub fn new(
        api: Arc<dyn AuthApi>,
        profiles: Arc<dyn ProfileProvider>,
        session: Arc<SessionContext>,
    ) -> Self {
        Self {
            api,
            profiles,
            session,
            on_success: None,
            on_error: None,
            loading: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl Fn(&Session) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Handle the provider outcome: `Ok(access_token)` or the provider error.
    ///
    /// # Errors
    /// [`ShellError::Busy`] while another exchange is running; any other
    /// failure is also reported through the error callback.
    pub async fn complete(&self, provider_result: Result<String, String>) -> Result<Session> {
        let access_token = match provider_result {
            Ok(token) => token,
            Err(provider_error) => {
                error!("Provider sign-in failed: {provider_error}");
                self.report(GOOGLE_LOGIN_FAILED);
                return Err(ShellError::Rejected(Some(GOOGLE_LOGIN_FAILED.to_string())));
            }
        };

        if self.loading.swap(true, Ordering::SeqCst) {
            return Err(ShellError::Busy);
        }
        let result = self.exchange(&access_token).await;
        self.loading.store(false, Ordering::SeqCst);

        match result {
            Ok(session) => {
                info!("Signed in with Google");
                if let Some(callback) = &self.on_success {
                    callback(&session);
                }
                Ok(session)
            }
            Err(err) => {
                error!("Google sign-in failed: {err}");
                let message = if err.is_transport() {
                    GOOGLE_LOGIN_UNAVAILABLE.to_string()
                } else {
                    err.user_message(GOOGLE_LOGIN_FAILED)
                };
                self.report(&message);
                Err(err)
            }
        }
    }

    async fn exchange(&self, access_token: &str) -> Result<Session> {
        let profile = self.profiles.fetch_profile(access_token).await?;
        let request = profile
            .into_login_request(access_token)
            .ok_or(ShellError::Rejected(None))?;

        let session = self.api.google_login(&request).await?;
        self.session
            .login(session.token.clone(), session.user.clone())?;
        Ok(session)
    }

    fn report(&self, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }
}

impl std::fmt::Debug for FederatedLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedLogin")
            .field("is_loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}
