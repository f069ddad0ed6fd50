/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - gate: protected route の認証 (verifier, required scopes, resource_metadata URL)
 *   - metadata: /.well-known/oauth-protected-resource の文書
 * - Clone 前提で持つ (内部は Arc で cheap)
 */
use std::sync::Arc;

use crate::middleware::auth::BearerAuthGate;
use crate::services::metadata::ProtectedResourceMetadata;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<BearerAuthGate>,
    pub metadata: Arc<ProtectedResourceMetadata>,
}

impl AppState {
    pub fn new(gate: BearerAuthGate, metadata: ProtectedResourceMetadata) -> Self {
        Self {
            gate: Arc::new(gate),
            metadata: Arc::new(metadata),
        }
    }
}
