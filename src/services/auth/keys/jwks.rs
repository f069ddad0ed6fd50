//! Remote JSON Web Key Set with a TTL cache.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::header;
use jsonwebtoken::{
    Algorithm, DecodingKey,
    jwk::{Jwk, JwkSet},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{KeySource, KeySourceError};

const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

struct CachedKeySet {
    keys: JwkSet,
    fetched_at: Instant,
}

/// Key source backed by the authorization server's `jwks_uri`.
///
/// - Refreshes when the cached set is older than `ttl`, or when a `kid` is unknown.
/// - Refreshes are serialized and rate-limited by `min_refresh_interval`.
/// - If a refresh fails, previously fetched keys keep being served.
pub struct JwksKeySource {
    client: reqwest::Client,
    jwks_uri: Url,
    ttl: Duration,
    min_refresh_interval: Duration,
    cache: RwLock<Option<CachedKeySet>>,
    // Guards refreshes; holds the time of the last attempt.
    last_attempt: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for JwksKeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksKeySource")
            .field("jwks_uri", &self.jwks_uri.as_str())
            .field("ttl", &self.ttl)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

impl JwksKeySource {
    pub fn new(client: reqwest::Client, jwks_uri: Url, ttl: Duration) -> Self {
        Self {
            client,
            jwks_uri,
            ttl,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            cache: RwLock::new(None),
            last_attempt: Mutex::new(None),
        }
    }

    pub fn min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Fetch the key set now (startup warm-up).
    pub async fn prefetch(&self) -> Result<(), KeySourceError> {
        self.refresh().await
    }

    #[instrument(skip(self), fields(jwks_uri = %self.jwks_uri), level = "debug")]
    async fn fetch(&self) -> Result<JwkSet, KeySourceError> {
        let resp = self
            .client
            .get(self.jwks_uri.clone())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| KeySourceError::Unavailable(format!("jwks request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KeySourceError::Unavailable(format!(
                "jwks endpoint returned {}",
                status
            )));
        }

        resp.json::<JwkSet>()
            .await
            .map_err(|e| KeySourceError::Unavailable(format!("invalid jwks document: {}", e)))
    }

    async fn refresh(&self) -> Result<(), KeySourceError> {
        let mut last_attempt = self.last_attempt.lock().await;

        // Another caller may have refreshed while we waited for the lock.
        if let Some(at) = *last_attempt {
            if at.elapsed() < self.min_refresh_interval {
                debug!("jwks refresh skipped (rate limited)");
                return Ok(());
            }
        }
        *last_attempt = Some(Instant::now());

        let keys = self.fetch().await?;
        debug!(keys = keys.keys.len(), "jwks refreshed");

        *self.cache.write().await = Some(CachedKeySet {
            keys,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    fn select<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, KeySourceError> {
        match kid {
            Some(kid) => keys
                .find(kid)
                .ok_or_else(|| KeySourceError::UnknownKey(Some(kid.to_string()))),
            // Without a kid the choice is only unambiguous for a single-key set.
            None => match keys.keys.as_slice() {
                [only] => Ok(only),
                _ => Err(KeySourceError::UnknownKey(None)),
            },
        }
    }

    fn to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, KeySourceError> {
        DecodingKey::from_jwk(jwk).map_err(|e| KeySourceError::UnusableKey(e.to_string()))
    }
}

#[async_trait]
impl KeySource for JwksKeySource {
    fn source_name(&self) -> &'static str {
        "jwks"
    }

    async fn resolve(
        &self,
        kid: Option<&str>,
        _alg: Algorithm,
    ) -> Result<DecodingKey, KeySourceError> {
        let (cached, fresh) = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(c) => (
                    Self::select(&c.keys, kid).ok().cloned(),
                    c.fetched_at.elapsed() < self.ttl,
                ),
                None => (None, false),
            }
        };

        if let (Some(jwk), true) = (&cached, fresh) {
            return Self::to_decoding_key(jwk);
        }

        if let Err(err) = self.refresh().await {
            match cached {
                Some(jwk) => {
                    warn!(error = %err, "jwks refresh failed; serving cached key");
                    return Self::to_decoding_key(&jwk);
                }
                None => {
                    warn!(error = %err, "jwks refresh failed");
                    return Err(err);
                }
            }
        }

        let cache = self.cache.read().await;
        match cache.as_ref() {
            Some(c) => Self::to_decoding_key(Self::select(&c.keys, kid)?),
            None => Err(KeySourceError::Unavailable(
                "key set has not been fetched yet".to_string(),
            )),
        }
    }
}
