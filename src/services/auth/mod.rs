/*
 * Responsibility
 * - bearer credential の検証 (signed / opaque の二経路)
 * - 検証済み identity の型 (VerifiedIdentity, ScopeSet)
 * - key source (JWKS / static PEM) と factory
 */
pub mod factory;
pub mod identity;
pub mod keys;
pub mod opaque;
pub mod shape;
pub mod signed;
pub mod verifier;

pub use factory::{AuthComponents, AuthSetupError, build_auth_components};
pub use identity::{IdentityExtra, ScopeSet, VerifiedIdentity};
pub use shape::{TokenShape, VerificationStrategy};
pub use verifier::{IdentityVerifier, TokenVerifier};
