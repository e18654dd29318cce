//! Scripted [`AuthApi`] used by the controller unit tests.

use super::{AuthApi, GoogleLoginRequest, OtpRequested};
use crate::error::{Result, ShellError};
use crate::session::Session;
use crate::signin::Identifier;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Notify;
use url::Url;

#[derive(Default)]
pub(crate) struct FakeAuthApi {
    request_otp: Mutex<VecDeque<Result<OtpRequested>>>,
    verify_otp: Mutex<VecDeque<Result<Session>>>,
    google_login: Mutex<VecDeque<Result<Session>>>,
    sign_in_as_user: Mutex<VecDeque<Result<Url>>>,
    calls: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAuthApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Hold every subsequent call until `gate` is notified once per call.
    pub(crate) fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock() = Some(gate.clone());
        gate
    }

    pub(crate) fn push_request_otp(&self, result: Result<OtpRequested>) {
        self.request_otp.lock().push_back(result);
    }

    pub(crate) fn push_verify_otp(&self, result: Result<Session>) {
        self.verify_otp.lock().push_back(result);
    }

    pub(crate) fn push_google_login(&self, result: Result<Session>) {
        self.google_login.lock().push_back(result);
    }

    pub(crate) fn push_sign_in_as_user(&self, result: Result<Url>) {
        self.sign_in_as_user.lock().push_back(result);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    async fn record(&self, call: String) {
        self.calls.lock().push(call);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }
}

fn next<T>(queue: &Mutex<VecDeque<Result<T>>>) -> Result<T> {
    queue
        .lock()
        .pop_front()
        .unwrap_or_else(|| Err(ShellError::Network("no scripted response".to_string())))
}

#[async_trait]
impl AuthApi for FakeAuthApi {
    async fn request_otp(&self, identifier: &Identifier) -> Result<OtpRequested> {
        self.record(format!("request_otp:{}:{}", identifier.kind(), identifier.value()))
            .await;
        next(&self.request_otp)
    }

    async fn verify_otp(&self, identifier: &Identifier, otp: &str) -> Result<Session> {
        self.record(format!("verify_otp:{}:{otp}", identifier.value()))
            .await;
        next(&self.verify_otp)
    }

    async fn google_login(&self, request: &GoogleLoginRequest) -> Result<Session> {
        self.record(format!("google_login:{}", request.external_identifier))
            .await;
        next(&self.google_login)
    }

    async fn sign_in_as_user(&self, access_token: &str) -> Result<Url> {
        self.record(format!("sign_in_as_user:{access_token}")).await;
        next(&self.sign_in_as_user)
    }
}
