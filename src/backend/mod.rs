//! Typed client for the RaphaCure auth backend.
//!
//! Only four endpoints are consumed. Every request carries the deployment's
//! API key and the frontend identifier; the key/host pair is picked from the
//! hostname the shell is served on. The client never stores tokens and never
//! logs credentials.

#[cfg(test)]
pub(crate) mod fake;
mod types;

pub use types::{Envelope, GoogleLoginRequest, OtpRequested};

use crate::error::{Result, ShellError};
use crate::session::{Session, UserRecord};
use crate::signin::Identifier;
use crate::APP_USER_AGENT;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};
use types::{LoginData, OtpRequestBody, OtpRequestData, OtpVerifyBody, SsoData};
use url::Url;

pub const DEFAULT_FRONTEND: &str = "raphacure";
pub const DEFAULT_MARKETPLACE: &str = "raphacure";
/// Applied to every backend request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const API_PREFIX: &str = "/api/v1";
const STAGING_BASE_URL: &str = "https://api.raphacure.com";
const RAPHACURE_PRODUCTION_BASE_URL: &str = "https://api.raphacure.com";
const RAPHAPLUS_PRODUCTION_BASE_URL: &str = "https://api.raphaplus.in";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Staging,
    Production,
}

impl Environment {
    /// Pick the environment from the hostname the shell is served on.
    #[must_use]
    pub fn detect(hostname: &str) -> Self {
        let host = hostname.trim().to_ascii_lowercase();
        if host == "raphacure.com" || host == "www.raphacure.com" || host.contains("raphaplus") {
            Self::Production
        } else {
            Self::Staging
        }
    }

    /// Default API host for `hostname` in this environment.
    #[must_use]
    pub fn base_url(self, hostname: &str) -> &'static str {
        match self {
            Self::Staging => STAGING_BASE_URL,
            Self::Production if hostname.to_ascii_lowercase().contains("raphaplus") => {
                RAPHAPLUS_PRODUCTION_BASE_URL
            }
            Self::Production => RAPHACURE_PRODUCTION_BASE_URL,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: Url,
    pub api_key: SecretString,
    pub frontend: String,
    pub marketplace: String,
    pub timeout: Duration,
}

impl BackendConfig {
    #[must_use]
    pub fn new(base_url: Url, api_key: SecretString) -> Self {
        Self {
            base_url,
            api_key,
            frontend: DEFAULT_FRONTEND.to_string(),
            marketplace: DEFAULT_MARKETPLACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The backend calls the shell controllers depend on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /auth/otp/request`
    async fn request_otp(&self, identifier: &Identifier) -> Result<OtpRequested>;

    /// `POST /auth/otp/verify`
    async fn verify_otp(&self, identifier: &Identifier, otp: &str) -> Result<Session>;

    /// `POST /auth/google`
    async fn google_login(&self, request: &GoogleLoginRequest) -> Result<Session>;

    /// `PATCH /auth/signinasuserwithjwt`, returning the one-time SSO URL.
    async fn sign_in_as_user(&self, access_token: &str) -> Result<Url>;
}

#[derive(Clone, Debug)]
pub struct BackendClient {
    http: Client,
    config: BackendConfig,
}

impl BackendClient {
    /// # Errors
    /// Returns [`ShellError::Config`] if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|err| ShellError::Config(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { http, config })
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn endpoint(&self, path: &str, with_marketplace: bool) -> Result<Url> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{API_PREFIX}{path}"))
            .map_err(|err| ShellError::Config(format!("Invalid backend URL: {err}")))?;
        if with_marketplace {
            url.query_pairs_mut()
                .append_pair("marketplace_name", &self.config.marketplace);
        }
        Ok(url)
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("x-frontend", &self.config.frontend)
    }

    async fn login(&self, builder: RequestBuilder) -> Result<Session> {
        let envelope: Envelope<LoginData> = send(self.with_headers(builder)).await?;
        session_from_envelope(envelope)
    }
}

#[async_trait]
impl AuthApi for BackendClient {
    #[instrument(skip_all, fields(kind = identifier.kind()))]
    async fn request_otp(&self, identifier: &Identifier) -> Result<OtpRequested> {
        let url = self.endpoint("/auth/otp/request", true)?;
        let body = OtpRequestBody {
            identifier,
            source: None,
        };

        let envelope: Envelope<OtpRequestData> =
            send(self.with_headers(self.http.post(url).json(&body))).await?;

        if !envelope.success {
            return Err(ShellError::Rejected(envelope.message));
        }

        Ok(OtpRequested {
            is_new_user: envelope
                .data
                .and_then(|data| data.is_new_user)
                .unwrap_or(false),
        })
    }

    #[instrument(skip_all, fields(kind = identifier.kind()))]
    async fn verify_otp(&self, identifier: &Identifier, otp: &str) -> Result<Session> {
        let url = self.endpoint("/auth/otp/verify", true)?;
        let body = OtpVerifyBody { identifier, otp };
        self.login(self.http.post(url).json(&body)).await
    }

    #[instrument(skip_all)]
    async fn google_login(&self, request: &GoogleLoginRequest) -> Result<Session> {
        let url = self.endpoint("/auth/google", false)?;
        self.login(self.http.post(url).json(request)).await
    }

    #[instrument(skip_all)]
    async fn sign_in_as_user(&self, access_token: &str) -> Result<Url> {
        let url = self.endpoint("/auth/signinasuserwithjwt", true)?;
        let builder = self
            .http
            .patch(url)
            .bearer_auth(access_token)
            .json(&serde_json::json!({}));

        let envelope: Envelope<SsoData> = send(self.with_headers(builder)).await?;
        let message = envelope.message;
        let sso_url = envelope
            .data
            .and_then(|data| data.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ShellError::Rejected(message))?;

        Url::parse(&sso_url).map_err(|err| ShellError::Parse(format!("Invalid SSO URL: {err}")))
    }
}

/// Send and decode a JSON body whatever the HTTP status; the envelope, not
/// the status code, carries success.
async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<Envelope<T>> {
    let response: Response = builder.send().await.map_err(|err| {
        error!("Backend request failed: {err}");
        ShellError::from(err)
    })?;
    let status = response.status();
    let body = response.bytes().await.map_err(ShellError::from)?;

    debug!(status = status.as_u16(), "Backend responded");

    serde_json::from_slice::<Envelope<T>>(&body).map_err(|err| {
        error!(status = status.as_u16(), "Failed to decode backend response: {err}");
        ShellError::Parse(format!("Failed to decode response ({status}): {err}"))
    })
}

fn session_from_envelope(envelope: Envelope<LoginData>) -> Result<Session> {
    let data = match envelope.data {
        Some(data) if envelope.success => data,
        _ => return Err(ShellError::Rejected(envelope.message)),
    };

    let token = data
        .get("token")
        .and_then(serde_json::Value::as_str)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ShellError::Parse("Login response did not include a token".to_string()))?;

    Ok(Session {
        token,
        user: UserRecord::new(data),
    })
}
