//! Router assembly for the guarded page server.
//!
//! SYSTEM CONTEXT
//! ==============
//! Page assets are served from a directory. Every navigation that the
//! guard's matcher covers passes through `route_guard` first, which reads
//! only the `Cookie` header; token storage does not exist on this side.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::COOKIE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::guard::GuardConfig;
use crate::session::has_signal;

/// `/` always lands on the listing page.
const ROOT_REDIRECT: &str = "/properties";

/// Page server: root redirect and static pages behind the route guard,
/// plus an unguarded health check.
pub fn app(pages_dir: &Path, guard: GuardConfig) -> Router {
    let pages = ServeDir::new(pages_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/", get(redirect_root))
        .fallback_service(pages)
        .layer(middleware::from_fn_with_state(Arc::new(guard), route_guard))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
}

/// Guard middleware: redirect or pass the request on.
pub async fn route_guard(State(guard): State<Arc<GuardConfig>>, request: Request, next: Next) -> Response {
    let location = {
        let path = request.uri().path();
        if guard.matches(path) {
            let cookies = request
                .headers()
                .get_all(COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect::<Vec<_>>()
                .join("; ");
            let logged_in = has_signal(Some(cookies.as_str()));
            guard
                .decide(path, logged_in)
                .location(request.uri().query())
        } else {
            None
        }
    };

    match location {
        Some(location) => {
            tracing::debug!(path = %request.uri().path(), %location, "route guard redirect");
            Redirect::temporary(&location).into_response()
        }
        None => next.run(request).await,
    }
}

async fn redirect_root() -> Redirect {
    Redirect::temporary(ROOT_REDIRECT)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
