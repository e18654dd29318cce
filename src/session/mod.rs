//! Session persistence and the shared session context.
//!
//! A session is the `(token, user)` pair; both halves are always set and
//! cleared together.

mod context;
pub mod store;
mod user;

pub use context::{use_session, SessionContext, SessionState};
pub use store::SessionStore;
pub use user::{Role, RoleClient, UserRecord};

#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: UserRecord,
}
