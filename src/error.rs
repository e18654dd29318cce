//! Error taxonomy shared by the shell controllers and the backend client.
//!
//! Every variant leaves the UI in a retryable state; nothing here is fatal to
//! the process. Controllers turn errors into inline messages through
//! [`ShellError::user_message`] and never retry on their own.

use thiserror::Error;

/// Generic fallback shown for transport failures.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShellError {
    /// Input rejected locally, before any network call.
    #[error("{0}")]
    Validation(String),
    /// The backend answered with `success: false`.
    #[error("Request rejected: {}", .0.as_deref().unwrap_or("no message"))]
    Rejected(Option<String>),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Response error: {0}")]
    Parse(String),
    /// No bearer credential available for the SSO handoff.
    #[error("No access token available for the current session")]
    MissingCredential,
    #[error("Storage error: {0}")]
    Storage(String),
    /// Another call for the same state machine is still in flight.
    #[error("A request is already in progress")]
    Busy,
    #[error("Resend is not available until the countdown reaches zero")]
    CooldownActive,
    /// The controller was torn down before the response arrived.
    #[error("The operation was cancelled")]
    Cancelled,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShellError {
    /// Message suitable for inline display, using `fallback` for backend
    /// rejections that carry no message of their own.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Rejected(Some(message)) if !message.trim().is_empty() => message.clone(),
            Self::Rejected(_) => fallback.to_string(),
            Self::Network(_) | Self::Timeout(_) | Self::Parse(_) => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }

    /// True for failures caused by the transport rather than the backend.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Parse(_))
    }
}

impl From<reqwest::Error> for ShellError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout("Request timed out. Please try again.".to_string())
        } else if err.is_decode() {
            Self::Parse(format!("Failed to decode response: {err}"))
        } else {
            Self::Network(format!("Unable to reach the server: {err}"))
        }
    }
}

pub type Result<T, E = ShellError> = std::result::Result<T, E>;
