/// Factory: build the token verifier and its collaborators from application `Config`.
use std::sync::Arc;

use thiserror::Error;
use url::Url;

use crate::config::{Config, ConfigError};
use crate::services::auth::keys::{JwksKeySource, KeySource, StaticKeySource};
use crate::services::auth::opaque::OpaqueTokenVerifier;
use crate::services::auth::signed::SignedTokenVerifier;
use crate::services::auth::verifier::TokenVerifier;
use crate::services::metadata::OAuthServerMetadata;

#[derive(Debug, Error)]
pub enum AuthSetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct AuthComponents {
    pub verifier: Arc<TokenVerifier>,
    /// Present when keys come from the authorization server (no static PEM).
    pub jwks: Option<Arc<JwksKeySource>>,
}

pub fn build_auth_components(
    config: &Config,
    oauth: &OAuthServerMetadata,
) -> Result<AuthComponents, AuthSetupError> {
    let client = reqwest::Client::builder()
        .timeout(config.verify_timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let (keys, jwks): (Arc<dyn KeySource>, Option<Arc<JwksKeySource>>) =
        match &config.access_jwt_public_key_pem {
            Some(pem) => {
                let alg = config
                    .signed_token_algorithms
                    .first()
                    .copied()
                    .ok_or(ConfigError::Invalid("SIGNED_TOKEN_ALGORITHMS"))?;
                let source = StaticKeySource::from_pem(pem, alg).map_err(|err| {
                    tracing::error!(error = %err, "static verification key rejected");
                    ConfigError::Invalid("ACCESS_JWT_PUBLIC_KEY_PEM")
                })?;
                (Arc::new(source) as Arc<dyn KeySource>, None)
            }
            None => {
                let jwks_uri =
                    Url::parse(&oauth.jwks_uri).map_err(|_| ConfigError::Invalid("AUTH_ISSUER_URL"))?;
                let source = Arc::new(JwksKeySource::new(
                    client.clone(),
                    jwks_uri,
                    config.jwks_cache_ttl,
                ));
                (source.clone() as Arc<dyn KeySource>, Some(source))
            }
        };

    let signed = SignedTokenVerifier::new(
        keys,
        oauth.issuer.clone(),
        config.auth_audience.clone(),
        config.signed_token_algorithms.clone(),
    )
    .leeway_seconds(config.access_token_leeway_seconds)
    .default_lifetime(config.default_token_lifetime);

    let userinfo = Url::parse(&oauth.userinfo_endpoint)
        .map_err(|_| ConfigError::Invalid("AUTH_ISSUER_URL"))?;
    let opaque = OpaqueTokenVerifier::new(client, userinfo).lifetime(config.default_token_lifetime);

    let verifier = TokenVerifier::new(signed, opaque)
        .fallback_to_opaque(config.opaque_fallback)
        .timeout(config.verify_timeout);

    Ok(AuthComponents {
        verifier: Arc::new(verifier),
        jwks,
    })
}
