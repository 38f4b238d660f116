use axum::Router;
use std::path::Path;
use tower_http::services::ServeDir;

/// Serves the web UI.
///
/// `/` maps to `index.html`; `/static/<path>` and any other unmatched path are
/// looked up in `static_dir`.
pub fn create_static_router<P: AsRef<Path>>(static_dir: P) -> Router {
    let dir = static_dir.as_ref();
    Router::new()
        .nest_service("/static", ServeDir::new(dir))
        .fallback_service(ServeDir::new(dir))
}
