//! Signed-token (JWS) verification path.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use serde::Deserialize;
use thiserror::Error;

use super::identity::{IdentityExtra, ScopeSet, VerifiedIdentity, expiry_after};
use super::keys::{KeySource, KeySourceError};
use super::shape::VerificationStrategy;
use crate::error::AuthError;

#[derive(Debug, Error)]
pub enum SignedTokenError {
    #[error("malformed token header: {0}")]
    MalformedHeader(jsonwebtoken::errors::Error),
    #[error("algorithm {0:?} is not allowed")]
    DisallowedAlgorithm(Algorithm),
    #[error(transparent)]
    Key(#[from] KeySourceError),
    #[error("token rejected: {0}")]
    Rejected(jsonwebtoken::errors::Error),
    #[error("subject (sub) claim is missing")]
    MissingSubject,
}

impl SignedTokenError {
    /// Public-facing classification. Only key-set unavailability is our fault.
    pub fn to_auth_error(&self) -> AuthError {
        match self {
            SignedTokenError::Key(err) if err.is_unavailable() => {
                AuthError::server_error("Unable to verify token at this time")
            }
            SignedTokenError::Rejected(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => {
                AuthError::invalid_token("Token has expired")
            }
            SignedTokenError::MissingSubject => {
                AuthError::invalid_token("Subject (sub) claim is missing")
            }
            _ => AuthError::invalid_token("Invalid or expired token"),
        }
    }
}

/// `aud` may be a single string or an array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    fn into_vec(self) -> Vec<String> {
        match self {
            Audience::Single(s) => vec![s],
            Audience::Multiple(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(default)]
    aud: Option<Audience>,
    #[serde(default)]
    exp: Option<i64>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    client_id: Option<String>,
    // Kept untyped: a non-string `scope` means "no scopes", not a rejection.
    #[serde(default)]
    scope: Option<serde_json::Value>,

    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

/// Verifies JWS access tokens against a key source.
///
/// Checks: algorithm allow-list, signature, `iss` (exact), `aud` (contains),
/// `exp`/`nbf` with leeway, presence of `sub`.
#[derive(Clone)]
pub struct SignedTokenVerifier {
    keys: Arc<dyn KeySource>,
    issuer: String,
    audience: String,
    algorithms: Vec<Algorithm>,
    leeway_seconds: u64,
    default_lifetime: Duration,
}

impl std::fmt::Debug for SignedTokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignedTokenVerifier")
            .field("keys", &self.keys.source_name())
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("algorithms", &self.algorithms)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl SignedTokenVerifier {
    pub fn new(
        keys: Arc<dyn KeySource>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        algorithms: Vec<Algorithm>,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience: audience.into(),
            algorithms,
            leeway_seconds: 60,
            default_lifetime: Duration::from_secs(3600),
        }
    }

    pub fn leeway_seconds(mut self, leeway: u64) -> Self {
        self.leeway_seconds = leeway;
        self
    }

    /// Lifetime applied when a token carries no `exp`.
    pub fn default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    fn validation_for(&self, alg: Algorithm) -> Validation {
        // One algorithm per decode: jsonwebtoken requires every listed
        // algorithm to match the key's family.
        let mut validation = Validation::new(alg);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);
        validation.set_required_spec_claims(&["iss", "aud"]);
        validation.leeway = self.leeway_seconds;
        validation
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, SignedTokenError> {
        // Advisory only: used to pick the key and algorithm, not trusted.
        let header = jsonwebtoken::decode_header(token).map_err(SignedTokenError::MalformedHeader)?;

        if !self.algorithms.contains(&header.alg) {
            return Err(SignedTokenError::DisallowedAlgorithm(header.alg));
        }

        let key = self.keys.resolve(header.kid.as_deref(), header.alg).await?;

        let data = jsonwebtoken::decode::<AccessTokenClaims>(
            token,
            &key,
            &self.validation_for(header.alg),
        )
        .map_err(SignedTokenError::Rejected)?;

        self.to_identity(data.claims)
    }

    fn to_identity(&self, claims: AccessTokenClaims) -> Result<VerifiedIdentity, SignedTokenError> {
        let subject = claims
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(SignedTokenError::MissingSubject)?;

        let raw_scope = match claims.scope {
            Some(serde_json::Value::String(s)) => Some(s),
            _ => None,
        };
        let scopes = raw_scope
            .as_deref()
            .map(ScopeSet::from_space_delimited)
            .unwrap_or_default();

        let client_id = claims
            .azp
            .clone()
            .or(claims.client_id)
            .unwrap_or_else(|| subject.clone());

        let expires_at = match claims.exp {
            Some(exp) => exp.saturating_mul(1000),
            None => expiry_after(chrono::Utc::now().timestamp_millis(), self.default_lifetime),
        };

        let extra = IdentityExtra {
            issuer: claims.iss,
            audience: claims.aud.map(Audience::into_vec).unwrap_or_default(),
            issued_at: claims.iat,
            authorized_party: claims.azp,
            raw_scope,
            other: claims.other,
            ..IdentityExtra::default()
        };

        Ok(VerifiedIdentity::new(
            subject,
            client_id,
            scopes,
            expires_at,
            VerificationStrategy::Signed,
            extra,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::keys::StaticKeySource;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"signed-path-test-secret";
    const ISSUER: &str = "https://auth.example.com/";
    const AUDIENCE: &str = "https://api.example.com/mcp";

    fn verifier() -> SignedTokenVerifier {
        SignedTokenVerifier::new(
            Arc::new(StaticKeySource::from_secret(SECRET)),
            ISSUER,
            AUDIENCE,
            vec![Algorithm::HS256],
        )
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    fn sign(claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    fn base_claims() -> serde_json::Value {
        json!({
            "iss": ISSUER,
            "aud": AUDIENCE,
            "sub": "user-1",
            "scope": "openid",
            "exp": now() + 3600,
        })
    }

    #[tokio::test]
    async fn round_trip_yields_identity() {
        let identity = verifier().verify(&sign(base_claims())).await.unwrap();

        assert_eq!(identity.subject(), "user-1");
        assert_eq!(identity.client_id(), "user-1");
        assert_eq!(identity.scopes(), &ScopeSet::from_space_delimited("openid"));
        assert_eq!(identity.verified_by(), VerificationStrategy::Signed);
        assert_eq!(identity.extra().issuer.as_deref(), Some(ISSUER));
        assert_eq!(identity.extra().audience, vec![AUDIENCE.to_string()]);
    }

    #[tokio::test]
    async fn scope_string_becomes_a_set() {
        let mut claims = base_claims();
        claims["scope"] = json!("c a b");
        let identity = verifier().verify(&sign(claims)).await.unwrap();
        assert_eq!(identity.scopes(), &ScopeSet::from_iter(["a", "b", "c"]));
    }

    #[tokio::test]
    async fn non_string_scope_yields_no_scopes() {
        let mut claims = base_claims();
        claims["scope"] = json!(["openid"]);
        let identity = verifier().verify(&sign(claims)).await.unwrap();
        assert!(identity.scopes().is_empty());
        assert!(identity.extra().raw_scope.is_none());
    }

    #[tokio::test]
    async fn client_id_prefers_azp_then_client_id() {
        let mut claims = base_claims();
        claims["client_id"] = json!("client-b");
        let identity = verifier().verify(&sign(claims.clone())).await.unwrap();
        assert_eq!(identity.client_id(), "client-b");

        claims["azp"] = json!("client-a");
        let identity = verifier().verify(&sign(claims)).await.unwrap();
        assert_eq!(identity.client_id(), "client-a");
    }

    #[tokio::test]
    async fn exp_is_converted_to_millis() {
        let exp = now() + 120;
        let mut claims = base_claims();
        claims["exp"] = json!(exp);
        let identity = verifier().verify(&sign(claims)).await.unwrap();
        assert_eq!(identity.expires_at(), exp * 1000);
    }

    #[tokio::test]
    async fn missing_exp_gets_bounded_lifetime() {
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("exp");
        let before = chrono::Utc::now().timestamp_millis();
        let identity = verifier()
            .default_lifetime(Duration::from_secs(60))
            .verify(&sign(claims))
            .await
            .unwrap();
        assert!(identity.expires_at() >= before + 60_000);
        assert!(identity.expires_at() <= chrono::Utc::now().timestamp_millis() + 60_000);
    }

    #[tokio::test]
    async fn custom_claims_are_carried_in_extra() {
        let mut claims = base_claims();
        claims["https://example.com/roles"] = json!(["admin"]);
        let identity = verifier().verify(&sign(claims)).await.unwrap();
        assert_eq!(
            identity.extra().other.get("https://example.com/roles"),
            Some(&json!(["admin"]))
        );
    }

    #[tokio::test]
    async fn wrong_issuer_is_rejected() {
        let mut claims = base_claims();
        claims["iss"] = json!("https://evil.example.com/");
        let err = verifier().verify(&sign(claims)).await.unwrap_err();
        assert!(matches!(err, SignedTokenError::Rejected(_)));
        assert!(err.to_auth_error().is_invalid_token());
    }

    #[tokio::test]
    async fn audience_must_be_contained() {
        let mut claims = base_claims();
        claims["aud"] = json!(["https://other.example.com", AUDIENCE]);
        assert!(verifier().verify(&sign(claims.clone())).await.is_ok());

        claims["aud"] = json!(["https://other.example.com"]);
        assert!(matches!(
            verifier().verify(&sign(claims)).await,
            Err(SignedTokenError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn missing_subject_is_invalid_token() {
        let mut claims = base_claims();
        claims.as_object_mut().unwrap().remove("sub");
        let err = verifier().verify(&sign(claims)).await.unwrap_err();
        assert!(matches!(err, SignedTokenError::MissingSubject));
        assert_eq!(
            err.to_auth_error(),
            AuthError::invalid_token("Subject (sub) claim is missing")
        );
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let mut claims = base_claims();
        claims["exp"] = json!(now() - 3600);
        let err = verifier().verify(&sign(claims)).await.unwrap_err();
        assert_eq!(err.to_auth_error(), AuthError::invalid_token("Token has expired"));
    }

    #[tokio::test]
    async fn algorithm_outside_allow_list_is_rejected() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS384),
            &base_claims(),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        assert!(matches!(
            verifier().verify(&token).await,
            Err(SignedTokenError::DisallowedAlgorithm(Algorithm::HS384))
        ));
    }

    #[tokio::test]
    async fn garbage_segments_are_malformed() {
        assert!(matches!(
            verifier().verify("abc.def.ghi").await,
            Err(SignedTokenError::MalformedHeader(_))
        ));
    }

    #[test]
    fn key_set_outage_is_a_server_error() {
        let err = SignedTokenError::Key(KeySourceError::Unavailable("down".into()));
        assert_eq!(err.to_auth_error().error_code(), "server_error");

        let err = SignedTokenError::Key(KeySourceError::UnknownKey(Some("k".into())));
        assert!(err.to_auth_error().is_invalid_token());
    }
}
