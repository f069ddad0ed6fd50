//! bearer token 検証 → AuthCtx を extensions に入れる
//!
//! - 判定そのもの (header → verify → scope → expiry) は `BearerAuthGate::admit`
//! - ここは axum との配線と、失敗時のレスポンス変換 (AuthRejection) だけを持つ

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AuthRejection;
use crate::state::AppState;

/// 保護対象の route に認証を掛ける。
///
/// `route_layer` なので、既存の route にだけ適用され、未定義 path の 404 はそのまま返る。
///
/// 例：
/// ```ignore
/// let protected = api::routes::protected_router(&config.protected_paths);
/// let protected = middleware::auth::access::apply(protected, state.clone());
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, access_middleware))
}

async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthRejection> {
    let gate = &state.gate;

    let identity = match gate.admit(req.headers()).await {
        Ok(identity) => identity,
        Err(err) => {
            if err.status_code().is_server_error() {
                tracing::warn!(
                    error = ?err,
                    method = %req.method(),
                    path = %req.uri().path(),
                    "bearer authentication failed"
                );
            } else {
                tracing::info!(
                    code = err.error_code(),
                    method = %req.method(),
                    path = %req.uri().path(),
                    "bearer authentication rejected"
                );
            }
            return Err(gate.reject(err));
        }
    };

    tracing::debug!(
        subject = identity.subject(),
        client_id = identity.client_id(),
        verified_by = ?identity.verified_by(),
        "request admitted"
    );

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(AuthCtx::new(identity));

    Ok(next.run(req).await)
}
