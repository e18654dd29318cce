//! Path classification shared by the edge guard and the deep-link handoff.

use url::form_urlencoded;

pub const SIGNIN_PATH: &str = "/signin";
pub const HOME_PATH: &str = "/";
/// Where a successful sign-in lands without a usable return path.
pub const DEFAULT_LANDING_PATH: &str = "/site";
pub const REDIRECT_PARAM: &str = "redirect";

pub const DEFAULT_PROTECTED_ROUTES: &[&str] = &["/dashboard", "/profile"];
pub const PUBLIC_ROUTES: &[&str] = &["/", "/privacy-policy", "/terms"];
const BYPASS_PREFIXES: &[&str] = &["/_next", "/assets", "/api"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteClass {
    /// Static assets and API calls; never inspected.
    Bypass,
    Protected,
    AuthOnly,
    Public,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Redirect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteTable {
    protected: Vec<String>,
    auth_only: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_PROTECTED_ROUTES.iter().map(ToString::to_string).collect(),
            Vec::new(),
        )
    }
}

impl RouteTable {
    #[must_use]
    pub fn new(protected: Vec<String>, auth_only: Vec<String>) -> Self {
        Self {
            protected: normalize_routes(protected),
            auth_only: normalize_routes(auth_only),
        }
    }

    #[must_use]
    pub fn protected(&self) -> &[String] {
        &self.protected
    }

    #[must_use]
    pub fn auth_only(&self) -> &[String] {
        &self.auth_only
    }

    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if is_bypass(path) {
            RouteClass::Bypass
        } else if self.protected.iter().any(|route| matches_route(path, route)) {
            RouteClass::Protected
        } else if self.auth_only.iter().any(|route| matches_route(path, route)) {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }

    /// Access decision for `path` given whether a session cookie is present.
    #[must_use]
    pub fn decide(&self, path: &str, authenticated: bool) -> Decision {
        match (self.classify(path), authenticated) {
            (RouteClass::Protected, false) => Decision::Redirect(signin_redirect(path)),
            (RouteClass::AuthOnly, true) => Decision::Redirect(HOME_PATH.to_string()),
            _ => Decision::Allow,
        }
    }

    /// True when `path` is handled by the deep-link catch-all rather than a
    /// core app route.
    #[must_use]
    pub fn is_deep_link(&self, path: &str) -> bool {
        if is_bypass(path) || matches_route(path, SIGNIN_PATH) {
            return false;
        }
        if path.is_empty() || path == HOME_PATH {
            return false;
        }
        !PUBLIC_ROUTES
            .iter()
            .copied()
            .filter(|route| *route != HOME_PATH)
            .chain(self.protected.iter().map(String::as_str))
            .chain(self.auth_only.iter().map(String::as_str))
            .any(|route| matches_route(path, route))
    }
}

/// `/signin?redirect=<path>` with the path form-encoded.
#[must_use]
pub fn signin_redirect(path: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(REDIRECT_PARAM, path)
        .finish();
    format!("{SIGNIN_PATH}?{query}")
}

/// Post sign-in destination taken from a `redirect` query value.
///
/// Only same-site absolute paths are honoured; anything else (missing,
/// protocol-relative, carrying a scheme, a backslash, or whitespace and
/// control characters that browsers strip) lands on the default path.
#[must_use]
pub fn return_path(redirect: Option<&str>) -> String {
    match redirect {
        Some(path) if is_local_path(path) => path.to_string(),
        _ => DEFAULT_LANDING_PATH.to_string(),
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains("://")
        && !path
            .chars()
            .any(|c| c == '\\' || c.is_whitespace() || c.is_control())
}

/// [`return_path`] for a raw query string such as `redirect=%2Fdashboard`.
#[must_use]
pub fn return_path_from_query(query: &str) -> String {
    let redirect = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .find(|(key, _)| key == REDIRECT_PARAM)
        .map(|(_, value)| value.into_owned());
    return_path(redirect.as_deref())
}

fn is_bypass(path: &str) -> bool {
    BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) || path.contains('.')
}

/// Segment-aware prefix match: `/profile` covers `/profile/edit`, not `/profiles`.
fn matches_route(path: &str, route: &str) -> bool {
    path.strip_prefix(route)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

fn normalize_routes(routes: Vec<String>) -> Vec<String> {
    routes
        .into_iter()
        .map(|route| route.trim().trim_end_matches('/').to_string())
        .filter(|route| route.starts_with('/'))
        .collect()
}
