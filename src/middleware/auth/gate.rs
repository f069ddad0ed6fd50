//! Per-request admission for protected routes.
//!
//! `Start → header present → scheme is bearer → verify → scopes → not expired → admit`.
//! Every step is terminal on failure; nothing is retried.

use std::sync::Arc;

use axum::http::{HeaderMap, header};

use crate::error::{AuthError, AuthRejection};
use crate::services::auth::{IdentityVerifier, VerifiedIdentity};

#[derive(Clone)]
pub struct BearerAuthGate {
    verifier: Arc<dyn IdentityVerifier>,
    required_scopes: Vec<String>,
    resource_metadata_url: Option<String>,
}

impl std::fmt::Debug for BearerAuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthGate")
            .field("required_scopes", &self.required_scopes)
            .field("resource_metadata_url", &self.resource_metadata_url)
            .finish_non_exhaustive()
    }
}

impl BearerAuthGate {
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            verifier,
            required_scopes: Vec::new(),
            resource_metadata_url: None,
        }
    }

    /// Every listed scope must be granted (superset check).
    pub fn required_scopes(mut self, scopes: Vec<String>) -> Self {
        self.required_scopes = scopes;
        self
    }

    /// Advertised as `resource_metadata` in challenge headers.
    pub fn resource_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.resource_metadata_url = Some(url.into());
        self
    }

    /// Credential from `Authorization: Bearer <token>` (scheme is case-insensitive).
    pub fn bearer_credential(headers: &HeaderMap) -> Result<&str, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AuthError::invalid_token("Missing Authorization header"))?;

        let invalid_format = || AuthError::invalid_token("Invalid Authorization header format");

        let value = value.to_str().map_err(|_| invalid_format())?;
        let (scheme, token) = value.trim().split_once(' ').ok_or_else(invalid_format)?;
        let token = token.trim();

        if !scheme.eq_ignore_ascii_case("bearer")
            || token.is_empty()
            || token.contains(char::is_whitespace)
        {
            return Err(invalid_format());
        }
        Ok(token)
    }

    pub async fn admit(&self, headers: &HeaderMap) -> Result<VerifiedIdentity, AuthError> {
        self.admit_at(headers, chrono::Utc::now().timestamp_millis()).await
    }

    pub(crate) async fn admit_at(
        &self,
        headers: &HeaderMap,
        now_ms: i64,
    ) -> Result<VerifiedIdentity, AuthError> {
        let credential = Self::bearer_credential(headers)?;

        let identity = self.verifier.verify(credential).await?;

        if !identity.scopes().contains_all(&self.required_scopes) {
            tracing::info!(
                subject = identity.subject(),
                granted = %identity.scopes(),
                missing = ?identity.scopes().missing(&self.required_scopes),
                "insufficient scope"
            );
            return Err(AuthError::insufficient_scope("Insufficient scope"));
        }

        if identity.is_expired_at(now_ms) {
            return Err(AuthError::invalid_token("Token has expired"));
        }

        Ok(identity)
    }

    /// Response for a failed admission, carrying this route's metadata URL.
    pub fn reject(&self, error: AuthError) -> AuthRejection {
        AuthRejection::new(error, self.resource_metadata_url.clone())
    }
}
