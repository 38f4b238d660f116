use crate::lifecycle::{LifecycleError, TokenService};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;
use zeroize::Zeroizing;

/// Label used when the caller does not supply one
const DEFAULT_LABEL: &str = "default";

/// Shared state for the token API
#[derive(Clone)]
pub struct TokenAppState {
    pub service: Arc<TokenService>,
}

#[derive(Serialize)]
struct SaveTokenResponse {
    ok: bool,
    id: i64,
}

#[derive(Serialize)]
struct UpdateBioResponse {
    ok: bool,
    upstream: Value,
}

#[derive(Serialize)]
struct DeleteTokenResponse {
    ok: bool,
    deleted: usize,
}

/// Create token API router
pub fn create_token_router(state: TokenAppState) -> Router {
    Router::new()
        .route("/api/save-token", post(save_token))
        .route("/api/update-bio", post(update_bio))
        .route("/api/delete-token", post(delete_token))
        .with_state(Arc::new(state))
}

/// POST /api/save-token - Encrypt and store a token
async fn save_token(
    State(state): State<Arc<TokenAppState>>,
    body: Bytes,
) -> Result<Json<SaveTokenResponse>, ApiError> {
    let mut request = parse_body(&body);

    let token = match request.get_mut("token").map(Value::take) {
        Some(Value::String(token)) => Zeroizing::new(token),
        _ => return Err(ApiError::Validation("token required")),
    };
    let label = request
        .get("label")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LABEL);

    let id = state.service.save(&token, label)?;

    Ok(Json(SaveTokenResponse { ok: true, id }))
}

/// POST /api/update-bio - Relay a bio update using a stored token
async fn update_bio(
    State(state): State<Arc<TokenAppState>>,
    body: Bytes,
) -> Result<Json<UpdateBioResponse>, ApiError> {
    let request = parse_body(&body);

    let id = parse_id(request.get("id"));
    let new_bio = request.get("newBio").and_then(Value::as_str);
    let (Some(id), Some(new_bio)) = (id, new_bio) else {
        return Err(ApiError::Validation("id and newBio required"));
    };

    let upstream = state.service.update_bio(id, new_bio).await?;

    Ok(Json(UpdateBioResponse { ok: true, upstream }))
}

/// POST /api/delete-token - Remove a stored token
async fn delete_token(
    State(state): State<Arc<TokenAppState>>,
    body: Bytes,
) -> Result<Json<DeleteTokenResponse>, ApiError> {
    let request = parse_body(&body);

    let id = parse_id(request.get("id")).ok_or(ApiError::Validation("id required"))?;
    let deleted = state.service.delete(id)?;

    Ok(Json(DeleteTokenResponse { ok: true, deleted }))
}

/// Missing, empty, non-JSON or non-object bodies all read as `{}`.
fn parse_body(body: &Bytes) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(Value::is_object)
        .unwrap_or_else(|| Value::Object(Default::default()))
}

/// Accepts a positive integer or a string of digits.
fn parse_id(value: Option<&Value>) -> Option<i64> {
    let id = match value? {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    (id > 0).then_some(id)
}

/// Token API errors
#[derive(Debug)]
pub enum ApiError {
    Validation(&'static str),
    NotFound,
    DecryptFailed,
    UpstreamFailed(Value),
    UpstreamError(String),
    ServerError,
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::Validation(msg) => ApiError::Validation(msg),
            LifecycleError::NotFound(_) => ApiError::NotFound,
            LifecycleError::Decryption(_) => ApiError::DecryptFailed,
            LifecycleError::UpstreamRejected { body, .. } => ApiError::UpstreamFailed(body),
            LifecycleError::Transport(message) => ApiError::UpstreamError(message),
            LifecycleError::Storage(e) | LifecycleError::Encryption(e) => {
                error!(error = %format!("{:#}", e), "Token operation failed");
                ApiError::ServerError
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": "token not found" }),
            ),
            ApiError::DecryptFailed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "decrypt_failed" }),
            ),
            ApiError::UpstreamFailed(detail) => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({ "error": "upstream_failed", "detail": detail }),
            ),
            ApiError::UpstreamError(detail) => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({ "error": "upstream_error", "detail": detail }),
            ),
            ApiError::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": "server_error" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}
