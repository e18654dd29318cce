use parking_lot::RwLock;
use std::collections::HashMap;

/// Cookie access with `document.cookie` semantics: writes take a full
/// `name=value; attr=...` string, reads return the value for a name.
pub trait CookieJar: Send + Sync {
    fn write(&self, cookie: &str);

    fn read(&self, name: &str) -> Option<String>;
}

/// In-memory jar that honours `max-age=0` as deletion.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<HashMap<String, String>>,
}

impl MemoryCookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of the `Cookie` request header a browser would send.
    #[must_use]
    pub fn header_value(&self) -> String {
        let cookies = self.cookies.read();
        let mut pairs: Vec<String> = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }
}

impl CookieJar for MemoryCookieJar {
    fn write(&self, cookie: &str) {
        let mut parts = cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let expired = parts.any(|attribute| {
            attribute
                .split_once('=')
                .is_some_and(|(key, value)| {
                    key.trim().eq_ignore_ascii_case("max-age")
                        && value.trim().parse::<i64>().is_ok_and(|age| age <= 0)
                })
        });

        let mut cookies = self.cookies.write();
        if expired {
            cookies.remove(name);
        } else {
            cookies.insert(name.to_string(), value.trim().to_string());
        }
    }

    fn read(&self, name: &str) -> Option<String> {
        self.cookies.read().get(name).cloned()
    }
}
