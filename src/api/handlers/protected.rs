/*
 * Responsibility
 * - protected path に mount される handler
 * - 検証済み identity をそのまま JSON で返す (業務 handler の差し替え先)
 */
use axum::Json;

use crate::api::extractors::AuthCtxExtractor;
use crate::services::auth::VerifiedIdentity;

pub async fn identity(AuthCtxExtractor(ctx): AuthCtxExtractor) -> Json<VerifiedIdentity> {
    Json(ctx.identity().clone())
}
