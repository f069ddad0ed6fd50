/*
 * Responsibility
 * - URL 構造を定義
 * - public (/ , /health), discovery (/.well-known/...), protected (PROTECTED_PATHS) に分ける
 * - Bearer を掛けるのは protected だけ (app.rs で access::apply)
 */
use axum::{
    Router,
    routing::{any, get},
};

use crate::api::handlers::{
    health::{health, root},
    protected::identity,
    well_known::{method_not_allowed, preflight, protected_resource_metadata},
};
use crate::middleware;
use crate::services::metadata::WELL_KNOWN_PATH;
use crate::state::AppState;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

pub fn well_known_routes() -> Router<AppState> {
    let router = Router::new().route(
        WELL_KNOWN_PATH,
        get(protected_resource_metadata)
            .options(preflight)
            .fallback(method_not_allowed),
    );
    middleware::cors::discovery(router)
}

/// Each prefix is gated as a whole: the prefix itself and everything below it.
pub fn protected_routes(prefixes: &[String]) -> Router<AppState> {
    prefixes.iter().fold(Router::new(), |router, prefix| {
        router
            .route(prefix, any(identity))
            .route(&format!("{}/{{*rest}}", prefix), any(identity))
    })
}
