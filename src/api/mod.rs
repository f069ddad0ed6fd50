/*
 * Responsibility
 * - api の公開ポイント (routes の re-export など)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{protected_routes, public_routes, well_known_routes};
