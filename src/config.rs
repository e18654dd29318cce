//! Shell configuration: build-time values with runtime environment overrides.
//!
//! API keys are read from `RAPHACURE_API_KEY_STAGING` and
//! `RAPHACURE_API_KEY_PRODUCTION`, first at build time through
//! `option_env!`, then at runtime. Empty or whitespace values are ignored.

use crate::backend::{BackendConfig, Environment};
use crate::error::{Result, ShellError};
use crate::signin::federated::DEFAULT_USERINFO_URL;
use secrecy::{ExposeSecret, SecretString};
use std::env::var;
use url::Url;

pub const ENV_API_KEY_STAGING: &str = "RAPHACURE_API_KEY_STAGING";
pub const ENV_API_KEY_PRODUCTION: &str = "RAPHACURE_API_KEY_PRODUCTION";
pub const ENV_API_BASE_URL: &str = "RAPHACURE_API_BASE_URL";
pub const ENV_GOOGLE_USERINFO_URL: &str = "RAPHACURE_GOOGLE_USERINFO_URL";

#[derive(Clone, Debug)]
pub struct ShellConfig {
    pub hostname: String,
    pub environment: Environment,
    pub api_key_staging: SecretString,
    pub api_key_production: SecretString,
    /// Replaces the environment's default API host.
    pub api_base_url: Option<String>,
    pub google_userinfo_url: String,
}

impl ShellConfig {
    /// Configuration for a shell served on `hostname`.
    #[must_use]
    pub fn load(hostname: &str) -> Self {
        let mut config = Self {
            hostname: hostname.to_string(),
            environment: Environment::detect(hostname),
            api_key_staging: SecretString::from(
                option_env!("RAPHACURE_API_KEY_STAGING")
                    .unwrap_or_default()
                    .to_string(),
            ),
            api_key_production: SecretString::from(
                option_env!("RAPHACURE_API_KEY_PRODUCTION")
                    .unwrap_or_default()
                    .to_string(),
            ),
            api_base_url: option_env!("RAPHACURE_API_BASE_URL").and_then(normalize_runtime_value),
            google_userinfo_url: option_env!("RAPHACURE_GOOGLE_USERINFO_URL")
                .and_then(normalize_runtime_value)
                .unwrap_or_else(|| DEFAULT_USERINFO_URL.to_string()),
        };

        apply_runtime_overrides(&mut config, runtime_config());

        config
    }

    #[must_use]
    pub fn api_key(&self) -> &SecretString {
        match self.environment {
            Environment::Staging => &self.api_key_staging,
            Environment::Production => &self.api_key_production,
        }
    }

    /// # Errors
    /// [`ShellError::Config`] when the API key for the detected environment is
    /// missing or the base URL does not parse.
    pub fn backend(&self) -> Result<BackendConfig> {
        let key = self.api_key();
        if key.expose_secret().trim().is_empty() {
            return Err(ShellError::Config(format!(
                "missing API key for the {} environment",
                self.environment.as_str()
            )));
        }

        let base = self
            .api_base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url(&self.hostname));
        let base_url = Url::parse(base)
            .map_err(|err| ShellError::Config(format!("invalid API base URL {base}: {err}")))?;

        Ok(BackendConfig::new(base_url, key.clone()))
    }

    /// # Errors
    /// [`ShellError::Config`] when the configured URL does not parse.
    pub fn google_userinfo_url(&self) -> Result<Url> {
        Url::parse(&self.google_userinfo_url)
            .map_err(|err| ShellError::Config(format!("invalid userinfo URL: {err}")))
    }
}

#[derive(Default)]
struct RuntimeConfig {
    api_key_staging: Option<String>,
    api_key_production: Option<String>,
    api_base_url: Option<String>,
    google_userinfo_url: Option<String>,
}

fn apply_runtime_overrides(config: &mut ShellConfig, runtime: RuntimeConfig) {
    if let Some(value) = runtime.api_key_staging {
        config.api_key_staging = SecretString::from(value);
    }
    if let Some(value) = runtime.api_key_production {
        config.api_key_production = SecretString::from(value);
    }
    if let Some(value) = runtime.api_base_url {
        config.api_base_url = Some(value);
    }
    if let Some(value) = runtime.google_userinfo_url {
        config.google_userinfo_url = value;
    }
}

fn runtime_config() -> RuntimeConfig {
    let read = |key: &str| var(key).ok().as_deref().and_then(normalize_runtime_value);
    RuntimeConfig {
        api_key_staging: read(ENV_API_KEY_STAGING),
        api_key_production: read(ENV_API_KEY_PRODUCTION),
        api_base_url: read(ENV_API_BASE_URL),
        google_userinfo_url: read(ENV_GOOGLE_USERINFO_URL),
    }
}

fn normalize_runtime_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
