//! Verification-key resolution for signed tokens.
//!
//! The verifier holds a `KeySource` by handle and never builds one per call.
//! Implementations own their caching/refresh policy and must tolerate
//! concurrent `resolve` calls.

mod jwks;
mod static_key;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};
use thiserror::Error;

pub use jwks::JwksKeySource;
pub use static_key::StaticKeySource;

#[derive(Debug, Error)]
pub enum KeySourceError {
    /// No key matches the token's `kid` (or no `kid` and the set is ambiguous).
    #[error("no verification key for kid {0:?}")]
    UnknownKey(Option<String>),
    /// A key was found but cannot be used to verify this token.
    #[error("verification key is not usable: {0}")]
    UnusableKey(String),
    /// The key set could not be obtained (network, upstream status, body).
    #[error("key set unavailable: {0}")]
    Unavailable(String),
}

impl KeySourceError {
    /// Infrastructure failure, as opposed to a problem with the token.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, KeySourceError::Unavailable(_))
    }
}

#[async_trait]
pub trait KeySource: Send + Sync {
    // Name used in logs.
    fn source_name(&self) -> &'static str;

    // Resolve the key for a token header's `kid` and `alg`.
    //
    // `alg` is a hint taken from an unverified header; implementations may use it
    // to pick among keys but must not treat it as trusted.
    async fn resolve(&self, kid: Option<&str>, alg: Algorithm)
    -> Result<DecodingKey, KeySourceError>;
}
