use crate::signin::Identifier;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response envelope shared by the auth endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpRequestBody<'a> {
    #[serde(flatten)]
    pub identifier: &'a Identifier,
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpVerifyBody<'a> {
    #[serde(flatten)]
    pub identifier: &'a Identifier,
    pub otp: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct OtpRequestData {
    #[serde(default, rename = "isNewUser")]
    pub is_new_user: Option<bool>,
}

/// Outcome of a successful OTP request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OtpRequested {
    pub is_new_user: bool,
}

/// Login payload: the token plus every user field, kept verbatim.
pub(crate) type LoginData = Map<String, Value>;

#[derive(Debug, Deserialize)]
pub(crate) struct SsoData {
    #[serde(default)]
    pub url: Option<String>,
}

/// Normalized provider profile forwarded to `POST /auth/google`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GoogleLoginRequest {
    pub email: Option<String>,
    #[serde(rename = "external_Identifier")]
    pub external_identifier: String,
    #[serde(rename = "external_Display_Identifier")]
    pub external_display_identifier: &'static str,
    #[serde(rename = "oAuthToken")]
    pub oauth_token: String,
    #[serde(rename = "provider_SystemName")]
    pub provider_system_name: &'static str,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "roleCode")]
    pub role_code: &'static str,
    #[serde(rename = "profileImage")]
    pub profile_image: Option<String>,
}

impl GoogleLoginRequest {
    pub const DISPLAY_IDENTIFIER: &'static str = "google";
    pub const PROVIDER_SYSTEM_NAME: &'static str = "Google";
    pub const ROLE_CODE: &'static str = "GU";
}
