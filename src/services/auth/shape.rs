//! Structural classification of bearer credentials.
//!
//! Shape is a syntactic property and is decided without any decoding attempt.
//! Which verifiers are then tried, and in what order, is a separate
//! verification-strategy decision (see `verifier::TokenVerifier::plan`).

use base64::Engine as _;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenShape {
    /// Three non-empty base64url segments (JWS compact serialization).
    SignedToken,
    /// Anything else.
    OpaqueToken,
}

impl TokenShape {
    pub fn classify(credential: &str) -> Self {
        let mut segments = 0usize;
        for segment in credential.split('.') {
            segments += 1;
            if segments > 3 || segment.is_empty() || !is_base64url(segment) {
                return Self::OpaqueToken;
            }
        }

        if segments == 3 {
            Self::SignedToken
        } else {
            Self::OpaqueToken
        }
    }
}

/// How a credential was (or will be) verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStrategy {
    /// Local signature + registered-claim validation.
    Signed,
    /// Call-back to the authorization server's userinfo endpoint.
    Opaque,
}

fn is_base64url(segment: &str) -> bool {
    segment
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Dot-separated part count, for diagnostics (5 = JWE compact).
pub fn segment_count(credential: &str) -> usize {
    credential.split('.').count()
}

/// Short, non-reversible identifier of a credential for log correlation.
///
/// base64url(SHA-256(credential)) truncated to 12 chars.
pub fn fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    let mut encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(12);
    encoded
}
