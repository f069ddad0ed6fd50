//! Dual-mode token verification.
//!
//! Shape decides the plan; the plan is a fixed list of strategies. The next
//! strategy is tried only when the previous one failed with an
//! `InvalidToken`-class error. Infrastructure failures end the plan.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::identity::VerifiedIdentity;
use super::opaque::OpaqueTokenVerifier;
use super::shape::{TokenShape, VerificationStrategy, fingerprint, segment_count};
use super::signed::SignedTokenVerifier;
use crate::error::AuthError;

/// Seam between the gate and whatever verifies credentials.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, AuthError>;
}

const SIGNED_THEN_OPAQUE: &[VerificationStrategy] =
    &[VerificationStrategy::Signed, VerificationStrategy::Opaque];
const SIGNED_ONLY: &[VerificationStrategy] = &[VerificationStrategy::Signed];
const OPAQUE_ONLY: &[VerificationStrategy] = &[VerificationStrategy::Opaque];

#[derive(Debug, Clone)]
pub struct TokenVerifier {
    signed: SignedTokenVerifier,
    opaque: OpaqueTokenVerifier,
    fallback_to_opaque: bool,
    timeout: Duration,
}

impl TokenVerifier {
    pub fn new(signed: SignedTokenVerifier, opaque: OpaqueTokenVerifier) -> Self {
        Self {
            signed,
            opaque,
            fallback_to_opaque: true,
            timeout: Duration::from_secs(5),
        }
    }

    /// Try the opaque path when a signed-shaped credential is rejected.
    pub fn fallback_to_opaque(mut self, enabled: bool) -> Self {
        self.fallback_to_opaque = enabled;
        self
    }

    /// Upper bound for one `verify` call, network included.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn plan(&self, shape: TokenShape) -> &'static [VerificationStrategy] {
        match (shape, self.fallback_to_opaque) {
            (TokenShape::SignedToken, true) => SIGNED_THEN_OPAQUE,
            (TokenShape::SignedToken, false) => SIGNED_ONLY,
            (TokenShape::OpaqueToken, _) => OPAQUE_ONLY,
        }
    }

    async fn attempt(
        &self,
        strategy: VerificationStrategy,
        credential: &str,
        token_fp: &str,
    ) -> Result<VerifiedIdentity, AuthError> {
        let (result, cause) = match strategy {
            VerificationStrategy::Signed => match self.signed.verify(credential).await {
                Ok(identity) => (Ok(identity), None),
                Err(err) => (Err(err.to_auth_error()), Some(err.to_string())),
            },
            VerificationStrategy::Opaque => match self.opaque.verify(credential).await {
                Ok(identity) => (Ok(identity), None),
                Err(err) => (Err(err.to_auth_error()), Some(err.to_string())),
            },
        };

        if let (Err(err), Some(cause)) = (&result, cause) {
            if err.is_invalid_token() {
                debug!(token_fp, ?strategy, %cause, "token verification rejected");
            } else {
                warn!(token_fp, ?strategy, %cause, "token verification failed");
            }
        }
        result
    }

    async fn verify_unbounded(&self, credential: &str) -> Result<VerifiedIdentity, AuthError> {
        let shape = TokenShape::classify(credential);
        let token_fp = fingerprint(credential);
        let plan = self.plan(shape);
        let segments = segment_count(credential);

        debug!(
            token_fp,
            ?shape,
            segments,
            encrypted = segments == 5,
            ?plan,
            "verifying bearer credential"
        );

        let mut result = Err(AuthError::invalid_token("Invalid or expired token"));
        for (attempt, strategy) in plan.iter().enumerate() {
            result = self.attempt(*strategy, credential, &token_fp).await;
            match &result {
                Ok(_) => {
                    if attempt > 0 {
                        info!(token_fp, ?strategy, "token verified after fallback");
                    }
                    break;
                }
                Err(err) if err.is_invalid_token() => continue,
                Err(_) => break,
            }
        }
        result
    }
}

#[async_trait]
impl IdentityVerifier for TokenVerifier {
    async fn verify(&self, credential: &str) -> Result<VerifiedIdentity, AuthError> {
        match tokio::time::timeout(self.timeout, self.verify_unbounded(credential)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    token_fp = fingerprint(credential),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "token verification timed out"
                );
                Err(AuthError::server_error("Token verification timed out"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::keys::StaticKeySource;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use std::sync::Arc;
    use url::Url;

    const SECRET: &[u8] = b"verifier-test-secret";

    fn verifier(userinfo: &str) -> TokenVerifier {
        let signed = SignedTokenVerifier::new(
            Arc::new(StaticKeySource::from_secret(SECRET)),
            "https://auth.example.com/",
            "https://api.example.com",
            vec![Algorithm::HS256],
        );
        let opaque = OpaqueTokenVerifier::new(reqwest::Client::new(), Url::parse(userinfo).unwrap());
        TokenVerifier::new(signed, opaque)
    }

    fn signed_token() -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({
                "iss": "https://auth.example.com/",
                "aud": "https://api.example.com",
                "sub": "user-1",
                "exp": chrono::Utc::now().timestamp() + 3600,
            }),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap()
    }

    #[test]
    fn plan_follows_shape_and_fallback_setting() {
        let v = verifier("http://127.0.0.1:1/userinfo");
        assert_eq!(v.plan(TokenShape::SignedToken), SIGNED_THEN_OPAQUE);
        assert_eq!(v.plan(TokenShape::OpaqueToken), OPAQUE_ONLY);

        let v = v.fallback_to_opaque(false);
        assert_eq!(v.plan(TokenShape::SignedToken), SIGNED_ONLY);
        assert_eq!(v.plan(TokenShape::OpaqueToken), OPAQUE_ONLY);
    }

    #[tokio::test]
    async fn valid_signed_token_never_reaches_opaque_path() {
        // The userinfo endpoint is unreachable; success proves it was not called.
        let identity = verifier("http://127.0.0.1:1/userinfo")
            .verify(&signed_token())
            .await
            .unwrap();
        assert_eq!(identity.verified_by(), VerificationStrategy::Signed);
    }

    #[tokio::test]
    async fn rejected_signed_token_without_fallback_is_invalid_token() {
        let err = verifier("http://127.0.0.1:1/userinfo")
            .fallback_to_opaque(false)
            .verify("abc.def.ghi")
            .await
            .unwrap_err();
        assert!(err.is_invalid_token());
    }

    #[tokio::test]
    async fn fallback_reports_the_opaque_outcome() {
        // Signed path rejects, opaque path cannot reach its endpoint.
        let err = verifier("http://127.0.0.1:1/userinfo")
            .verify("abc.def.ghi")
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "server_error");
    }

    #[tokio::test]
    async fn hanging_dependency_is_bounded_by_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let _hold = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let err = verifier(&format!("http://{}/userinfo", addr))
            .timeout(Duration::from_millis(200))
            .verify("opaque-token")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::server_error("Token verification timed out"));
    }
}
