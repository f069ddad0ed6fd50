//! Verified identity produced by a successful verification path.
//!
//! `VerifiedIdentity` has no public constructor: only the signed and opaque
//! verifiers in this crate can build one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use super::shape::VerificationStrategy;

/// Granted scopes. Order-insignificant; membership-tested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<String>);

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a space-delimited `scope` value (RFC 6749 §3.3).
    pub fn from_space_delimited(raw: &str) -> Self {
        raw.split_whitespace().map(String::from).collect()
    }

    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    /// Superset check: every scope in `required` must be granted.
    pub fn contains_all<I, S>(&self, required: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        required.into_iter().all(|s| self.0.contains(s.as_ref()))
    }

    /// Scopes of `required` that are not granted.
    pub fn missing<'a>(&self, required: &'a [String]) -> Vec<&'a str> {
        required
            .iter()
            .filter(|s| !self.0.contains(s.as_str()))
            .map(String::as_str)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<S: Into<String>> FromIterator<S> for ScopeSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self.0.iter().map(String::as_str).collect::<Vec<_>>().join(" ");
        f.write_str(&joined)
    }
}

/// Attributes carried through for downstream handlers.
///
/// Never consulted by the gate. Known claim/profile keys are typed fields;
/// everything else lands in `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IdentityExtra {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub audience: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_party: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_scope: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// `now_ms + lifetime`, saturating instead of wrapping.
pub(crate) fn expiry_after(now_ms: i64, lifetime: Duration) -> i64 {
    let lifetime_ms = i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_add(lifetime_ms)
}

/// Normalized result of successful verification.
///
/// Owned by the request it was computed for; never cached or shared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifiedIdentity {
    subject: String,
    client_id: String,
    scopes: ScopeSet,
    /// Epoch milliseconds.
    expires_at: i64,
    verified_by: VerificationStrategy,
    extra: IdentityExtra,
}

impl VerifiedIdentity {
    pub(crate) fn new(
        subject: String,
        client_id: String,
        scopes: ScopeSet,
        expires_at: i64,
        verified_by: VerificationStrategy,
        extra: IdentityExtra,
    ) -> Self {
        Self {
            subject,
            client_id,
            scopes,
            expires_at,
            verified_by,
            extra,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    pub fn verified_by(&self) -> VerificationStrategy {
        self.verified_by
    }

    pub fn extra(&self) -> &IdentityExtra {
        &self.extra
    }

    /// `expires_at` has been reached at `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}
