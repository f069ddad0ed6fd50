/*
 * Responsibility
 * - Config 読み込み → 依存生成 (verifier, gate, metadata) → Router 組み立て
 * - Middleware の適用 (http / security headers / CORS / Bearer)
 * - axum::serve() で起動、Ctrl-C / SIGTERM で graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::Config;
use crate::middleware::{self, auth::BearerAuthGate};
use crate::services::auth::{build_auth_components, keys::JwksKeySource};
use crate::services::metadata::{OAuthServerMetadata, ProtectedResourceMetadata, well_known_url};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,resource_guard=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched.
        tracing::error!(?info, "panic");

        // Development: fail fast. Production: default behavior, keep serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting resource server in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let (state, jwks) = build_state(&config)?;

    if let Some(jwks) = jwks {
        // Warm the key cache; verification refreshes on demand if this fails.
        tokio::spawn(async move {
            if let Err(err) = jwks.prefetch().await {
                tracing::warn!(error = %err, jwks_uri = %jwks.jwks_uri(), "jwks prefetch failed");
            }
        });
    }

    let app = build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Build process-level services and inject them into the shared application state.
///
/// Fails fast on configuration that could only break at request time
/// (invalid issuer URL, unusable static key).
pub fn build_state(config: &Config) -> Result<(AppState, Option<Arc<JwksKeySource>>)> {
    let oauth = OAuthServerMetadata::for_issuer(&config.auth_issuer_url);

    let metadata = ProtectedResourceMetadata::build(
        &oauth,
        &config.resource_server_url,
        &config.scopes_supported,
        Some(&config.resource_name),
        Some(&config.resource_documentation_url),
    )?;

    let auth = build_auth_components(config, &oauth)?;
    let key_source = if auth.jwks.is_some() { "jwks" } else { "static" };

    tracing::info!(
        issuer = %oauth.issuer,
        audience = %config.auth_audience,
        algorithms = ?config.signed_token_algorithms,
        key_source,
        opaque_fallback = config.opaque_fallback,
        required_scopes = ?config.required_scopes,
        protected_paths = ?config.protected_paths,
        "token verification configured"
    );

    let gate = BearerAuthGate::new(auth.verifier)
        .required_scopes(config.required_scopes.clone())
        .resource_metadata_url(well_known_url(&config.public_base_url));

    Ok((AppState::new(gate, metadata), auth.jwks))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let protected = api::protected_routes(&config.protected_paths);
    let protected = middleware::auth::access::apply(protected, state.clone());
    let protected = middleware::cors::apply(protected, config);

    let router = Router::new()
        .merge(api::public_routes())
        .merge(api::well_known_routes())
        .merge(protected)
        .with_state(state);

    let router = middleware::security_headers::apply(router);
    middleware::http::apply(router, config.request_timeout)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
