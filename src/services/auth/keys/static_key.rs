use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey};

use super::{KeySource, KeySourceError};

/// A single pre-configured verification key.
///
/// Used when `ACCESS_JWT_PUBLIC_KEY_PEM` is set instead of a remote key set.
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct StaticKeySource {
    key: DecodingKey,
    kid: Option<String>,
}

impl std::fmt::Debug for StaticKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeySource")
            .field("kid", &self.kid)
            .finish()
    }
}

impl StaticKeySource {
    pub fn new(key: DecodingKey) -> Self {
        Self { key, kid: None }
    }

    /// Parse a PEM public key of the family `alg` belongs to.
    pub fn from_pem(pem: &str, alg: Algorithm) -> Result<Self, String> {
        let bytes = pem.as_bytes();
        let key = match alg {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(bytes),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(bytes),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(bytes),
            _ => {
                return Err(format!("{:?} takes a shared secret, not a PEM key", alg));
            }
        }
        .map_err(|e| format!("invalid {:?} public key pem: {}", alg, e))?;

        Ok(Self::new(key))
    }

    /// Shared-secret key (HS*). Intended for local development and tests.
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret))
    }

    /// Only accept tokens whose header carries this `kid` (or none).
    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    fn source_name(&self) -> &'static str {
        "static"
    }

    async fn resolve(
        &self,
        kid: Option<&str>,
        _alg: Algorithm,
    ) -> Result<DecodingKey, KeySourceError> {
        match (self.kid.as_deref(), kid) {
            (Some(expected), Some(actual)) if expected != actual => {
                Err(KeySourceError::UnknownKey(Some(actual.to_string())))
            }
            _ => Ok(self.key.clone()),
        }
    }
}
