use crate::rate_limit::{ClientKey, RateLimiter};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::warn;

/// Rejects requests from clients that exceeded their per-minute budget with 429.
///
/// The client is the peer address when the server runs with connect info,
/// otherwise all requests share one bucket.
pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let client = connect_info
        .map(|ConnectInfo(addr)| ClientKey::Addr(addr.ip()))
        .unwrap_or(ClientKey::Unknown);

    if !limiter.check_and_consume(client) {
        warn!(client = ?client, limit = limiter.limit_per_minute(), "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "rate_limited" })),
        )
            .into_response();
    }

    next.run(request).await
}
