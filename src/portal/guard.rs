//! Route guard middleware.

use crate::routes::{Decision, RouteTable};
use crate::session::store::SESSION_COOKIE_NAME;
use axum::{
    body::Body,
    extract::State,
    http::{header::COOKIE, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tracing::debug;

/// Apply the route table to every request before it reaches a handler.
pub async fn guard(
    State(routes): State<Arc<RouteTable>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let authenticated = session_cookie(request.headers()).is_some();

    match routes.decide(&path, authenticated) {
        Decision::Allow => next.run(request).await,
        Decision::Redirect(location) => {
            debug!(%path, %location, authenticated, "Guard redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}

/// Non-empty session cookie value, searching every `Cookie` header.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            let val = val.trim();
            (key.trim() == SESSION_COOKIE_NAME && !val.is_empty()).then(|| val.to_string())
        })
}
