//! Opaque-token verification via the authorization server's userinfo endpoint.
//!
//! Opaque tokens carry no verifiable structure; a successful userinfo call with
//! the credential is the only proof of validity available to us.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::http::{StatusCode, header};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::identity::{IdentityExtra, ScopeSet, VerifiedIdentity, expiry_after};
use super::shape::VerificationStrategy;
use crate::error::AuthError;

/// Scope implied by a successful userinfo call.
pub const BASELINE_SCOPE: &str = "openid";

#[derive(Debug, Error)]
pub enum OpaqueTokenError {
    /// 401 from the endpoint: the credential is not valid.
    #[error("userinfo endpoint rejected the token")]
    Rejected,
    #[error("userinfo endpoint returned {0}")]
    Upstream(StatusCode),
    #[error("userinfo request failed: {0}")]
    Transport(reqwest::Error),
    #[error("userinfo response is not valid json: {0}")]
    MalformedResponse(reqwest::Error),
    #[error("subject (sub) field is missing in userinfo")]
    MissingSubject,
}

impl OpaqueTokenError {
    /// Caller fault (InvalidToken) vs. dependency fault (ServerError).
    pub fn to_auth_error(&self) -> AuthError {
        match self {
            OpaqueTokenError::Rejected => AuthError::invalid_token("Invalid or expired token"),
            OpaqueTokenError::MissingSubject => {
                AuthError::invalid_token("Subject (sub) field is missing in UserInfo")
            }
            OpaqueTokenError::Upstream(_)
            | OpaqueTokenError::Transport(_)
            | OpaqueTokenError::MalformedResponse(_) => {
                AuthError::server_error("Unable to verify token at this time")
            }
        }
    }
}

/// OIDC userinfo response (the fields we type; the rest is kept as-is).
#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    // Some providers send "true"/"false" strings.
    #[serde(default)]
    email_verified: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    // OIDC says epoch seconds; some providers send an RFC 3339 string.
    #[serde(default)]
    updated_at: Option<serde_json::Value>,

    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

fn as_flag(value: &serde_json::Value) -> Option<bool> {
    match value {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct OpaqueTokenVerifier {
    client: reqwest::Client,
    userinfo_endpoint: Url,
    lifetime: Duration,
}

impl OpaqueTokenVerifier {
    pub fn new(client: reqwest::Client, userinfo_endpoint: Url) -> Self {
        Self {
            client,
            userinfo_endpoint,
            lifetime: Duration::from_secs(3600),
        }
    }

    /// Lifetime assumed for a verified opaque token (it has no `exp` of its own).
    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub async fn verify(&self, token: &str) -> Result<VerifiedIdentity, OpaqueTokenError> {
        let resp = self
            .client
            .get(self.userinfo_endpoint.clone())
            .bearer_auth(token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(OpaqueTokenError::Transport)?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(OpaqueTokenError::Rejected);
        }
        if !status.is_success() {
            return Err(OpaqueTokenError::Upstream(status));
        }

        let info: UserInfo = resp
            .json()
            .await
            .map_err(OpaqueTokenError::MalformedResponse)?;

        let subject = info
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(OpaqueTokenError::MissingSubject)?;

        let expires_at = expiry_after(chrono::Utc::now().timestamp_millis(), self.lifetime);

        let extra = IdentityExtra {
            email: info.email,
            email_verified: info.email_verified.as_ref().and_then(as_flag),
            name: info.name,
            nickname: info.nickname,
            picture: info.picture,
            updated_at: info.updated_at.as_ref().and_then(as_text),
            other: info.other,
            ..IdentityExtra::default()
        };

        Ok(VerifiedIdentity::new(
            subject.clone(),
            subject,
            ScopeSet::from_iter([BASELINE_SCOPE]),
            expires_at,
            VerificationStrategy::Opaque,
            extra,
        ))
    }
}
