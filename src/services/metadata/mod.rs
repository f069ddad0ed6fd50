/*
 * Responsibility
 * - discovery documents (authorization server / protected resource)
 * - pure data shaping; no network I/O
 */
mod oauth_server;
mod protected_resource;

pub use oauth_server::OAuthServerMetadata;
pub use protected_resource::{
    ConfigurationError, ProtectedResourceMetadata, WELL_KNOWN_PATH, check_issuer_url,
    well_known_url,
};
