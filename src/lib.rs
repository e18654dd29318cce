//! # RaphaCure portal shell
//!
//! Authentication shell of the RaphaCure consumer portal. Business logic
//! (OTP issuance, user records, SSO minting) stays in the remote backend;
//! this crate only routes, persists and hands off.
//!
//! ## Edge host
//!
//! The `raphacure` binary serves the pre-built site behind a route guard that
//! reads the `raphacure_auth_token` cookie:
//!
//! - **Protected** paths (`/dashboard`, `/profile` by default) without a
//!   session redirect to `/signin?redirect=<path>`.
//! - **Auth-only** paths with a session redirect to `/`.
//! - Static files, `/_next`, `/assets` and `/api` are never inspected.
//!
//! It also serves the Apple app-site-association manifest and `/health`.
//!
//! ## Shell library
//!
//! Client-side controllers run against small browser capability traits
//! ([`browser::Storage`], [`browser::CookieJar`], [`browser::Navigator`],
//! [`browser::Frame`]):
//!
//! - [`session::SessionStore`] and [`session::SessionContext`] persist and
//!   broadcast the `(token, user)` session.
//! - [`signin::OtpFlow`] drives OTP sign-in with a 60 second resend cooldown.
//! - [`signin::FederatedLogin`] exchanges a Google access token for a session.
//! - [`deeplink::DeepLinkOrchestrator`] opens deep links inside an SSO frame.

pub mod backend;
pub mod browser;
pub mod cli;
pub mod config;
pub mod deeplink;
pub mod error;
pub mod portal;
pub mod routes;
pub mod session;
pub mod signin;

pub use error::{Result, ShellError};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
