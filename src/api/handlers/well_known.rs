/*
 * Responsibility
 * - GET /.well-known/oauth-protected-resource (認証なし, CORS 全開放)
 * - OPTIONS は 204、それ以外の method は 405
 */
use axum::{
    Json,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
};

use crate::state::AppState;

pub async fn protected_resource_metadata(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static("public, max-age=3600"))],
        Json(state.metadata.as_ref().clone()),
    )
}

pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, HeaderValue::from_static("GET, OPTIONS"))],
        "Method not allowed",
    )
}
