//! Sign-in controllers: identifier classification, the OTP flow and the
//! federated login adapter.

pub mod federated;
mod identifier;
pub mod otp;

pub use federated::{FederatedLogin, GoogleProfileClient, ProfileProvider, ProviderProfile};
pub use identifier::{classify, Identifier};
pub use otp::{OtpChallenge, OtpFlow, OtpPhase, OtpView};
