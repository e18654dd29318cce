//! Browser capabilities the shell depends on: key/value storage, the cookie
//! jar, top-level navigation and the embedded frame. Controllers only see
//! these traits, so the same logic runs against platform bindings, the
//! file-backed store used by native builds, or the in-memory doubles.

mod cookies;
mod navigation;
mod storage;

pub use cookies::{CookieJar, MemoryCookieJar};
pub use navigation::{Frame, Navigator, RecordingFrame, RecordingNavigator};
pub use storage::{FileStorage, MemoryStorage, Storage};
