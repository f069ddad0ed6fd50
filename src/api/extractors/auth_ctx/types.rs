/*
 * Responsibility
 * - Handler から見える「認証済みコンテキスト」の型
 * - middleware が検証して request extensions に格納し、handler はこの型だけを受け取る
 *
 * Notes
 * - token の検証は middleware/services 側の責務
 * - VerifiedIdentity は検証経路からしか作れないので、ここで偽造はできない
 */
use std::sync::Arc;

use crate::services::auth::VerifiedIdentity;

/// 認証済みのリクエストに付与されるコンテキスト
#[derive(Debug, Clone)]
pub struct AuthCtx {
    identity: Arc<VerifiedIdentity>,
}

impl AuthCtx {
    pub fn new(identity: VerifiedIdentity) -> Self {
        Self {
            identity: Arc::new(identity),
        }
    }

    pub fn identity(&self) -> &VerifiedIdentity {
        &self.identity
    }
}
