//! Edge host: route guard in front of the manifest, health probe and the
//! pre-built site.

mod guard;
pub mod handlers;

pub use guard::session_cookie;

use crate::routes::RouteTable;
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::get,
    Router,
};
use handlers::{app_site_association, health};
use std::{path::Path, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer,
    services::{ServeDir, ServeFile},
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug_span, info, Span};
use ulid::Ulid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Build the edge router. Unknown paths fall back to the site's `index.html`.
#[must_use]
pub fn router(assets_dir: &Path, routes: RouteTable) -> Router {
    let site = ServeDir::new(assets_dir).fallback(ServeFile::new(assets_dir.join("index.html")));

    Router::new()
        .route("/health", get(health).options(health))
        .route(
            "/.well-known/apple-app-site-association",
            get(app_site_association),
        )
        .route("/api/apple-app-site-association", get(app_site_association))
        .fallback_service(site)
        .layer(middleware::from_fn_with_state(Arc::new(routes), guard::guard))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span)),
        )
}

/// Serve until ctrl-c.
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, assets_dir: &Path, routes: RouteTable) -> Result<()> {
    let app = router(assets_dir, routes);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

// span; headers are never recorded, the cookie carries the session token
fn make_span(request: &Request<Body>) -> Span {
    let method = request.method().as_str();
    let path = request.uri().path();
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", method, path, request_id)
}
