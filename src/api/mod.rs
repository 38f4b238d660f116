// HTTP API: token endpoints, rate limiting and static assets

pub mod rate_limit;
pub mod static_files;
pub mod tokens;

pub use rate_limit::enforce_rate_limit;
pub use static_files::create_static_router;
pub use tokens::{create_token_router, ApiError, TokenAppState};

use crate::rate_limit::RateLimiter;
use axum::{middleware, Router};
use std::path::Path;
use std::sync::Arc;

/// Assembles the full application router.
///
/// `rate_limiter` applies to the token API only; static assets are never limited.
pub fn create_app<P: AsRef<Path>>(
    state: TokenAppState,
    rate_limiter: Option<Arc<RateLimiter>>,
    static_dir: P,
) -> Router {
    let mut api = create_token_router(state);

    if let Some(limiter) = rate_limiter {
        api = api.route_layer(middleware::from_fn_with_state(limiter, enforce_rate_limit));
    }

    api.merge(create_static_router(static_dir))
}
