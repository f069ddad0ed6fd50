/*
 * Responsibility
 * - 環境変数や設定の読み込み (issuer, audience, protected paths, timeouts など)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub cors_allowed_origins: Vec<String>,

    /// Authorization server base URL; endpoints are derived from it.
    pub auth_issuer_url: String,
    pub auth_audience: String,

    pub public_base_url: String,
    pub resource_server_url: Url,
    pub resource_name: String,
    pub resource_documentation_url: Url,

    pub required_scopes: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub protected_paths: Vec<String>,

    pub signed_token_algorithms: Vec<Algorithm>,
    pub access_jwt_public_key_pem: Option<String>,
    pub access_token_leeway_seconds: u64,
    pub opaque_fallback: bool,
    pub verify_timeout: Duration,
    pub request_timeout: Duration,
    pub jwks_cache_ttl: Duration,
    pub default_token_lifetime: Duration,
}

/// Upper bound for the lifetime assumed for tokens without their own expiry.
const MAX_TOKEN_LIFETIME_SECONDS: u64 = 24 * 60 * 60;

/// Paths served without a bearer token; a protected prefix may not cover them.
const PUBLIC_PATHS: &[&str] = &["/health", "/.well-known"];

/// Normalizes prefixes (no trailing '/') and rejects ones that would shadow a
/// public route, repeat another prefix, or carry route pattern syntax.
fn protected_path_list(raw: Vec<String>) -> Result<Vec<String>, ConfigError> {
    let invalid = ConfigError::Invalid("PROTECTED_PATHS");
    if raw.is_empty() {
        return Err(invalid);
    }

    let mut paths: Vec<String> = Vec::with_capacity(raw.len());
    for path in raw {
        let path = path.trim_end_matches('/').to_string();
        // An empty result means "/", which would cover everything.
        if !path.starts_with('/') || path.contains(['{', '}', '*']) {
            return Err(invalid);
        }
        let shadows_public = PUBLIC_PATHS
            .iter()
            .any(|public| path == *public || path.starts_with(&format!("{public}/")));
        if shadows_public || paths.contains(&path) {
            return Err(invalid);
        }
        paths.push(path);
    }
    Ok(paths)
}

fn list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let number = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match var(key) {
                Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
                None => Ok(default),
            }
        };

        let port = number("PORT", 3000)?;
        let port = u16::try_from(port).map_err(|_| ConfigError::Invalid("PORT"))?;
        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(&var("APP_ENV").unwrap_or_else(|| "development".to_string()));

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let auth_issuer_url = var("AUTH_ISSUER_URL").ok_or(ConfigError::Missing("AUTH_ISSUER_URL"))?;
        Url::parse(&auth_issuer_url).map_err(|_| ConfigError::Invalid("AUTH_ISSUER_URL"))?;

        let public_base_url = var("PUBLIC_BASE_URL").ok_or(ConfigError::Missing("PUBLIC_BASE_URL"))?;
        Url::parse(&public_base_url).map_err(|_| ConfigError::Invalid("PUBLIC_BASE_URL"))?;

        let resource_server_url = Url::parse(
            &var("RESOURCE_SERVER_URL").unwrap_or_else(|| public_base_url.clone()),
        )
        .map_err(|_| ConfigError::Invalid("RESOURCE_SERVER_URL"))?;

        let auth_audience = var("AUTH_AUDIENCE").unwrap_or_else(|| resource_server_url.to_string());

        let resource_name = var("RESOURCE_NAME").unwrap_or_else(|| "mcp-server".to_string());

        let resource_documentation_url = match var("RESOURCE_DOCUMENTATION_URL") {
            Some(v) => Url::parse(&v).map_err(|_| ConfigError::Invalid("RESOURCE_DOCUMENTATION_URL"))?,
            None => resource_server_url.clone(),
        };

        let required_scopes = var("REQUIRED_SCOPES").map(|v| list(&v)).unwrap_or_default();
        let scopes_supported = var("SCOPES_SUPPORTED")
            .map(|v| list(&v))
            .unwrap_or_else(|| vec!["openid".to_string()]);

        let protected_paths = protected_path_list(
            var("PROTECTED_PATHS")
                .map(|v| list(&v))
                .unwrap_or_else(|| vec!["/mcp".to_string()]),
        )?;

        let signed_token_algorithms = var("SIGNED_TOKEN_ALGORITHMS")
            .map(|v| list(&v))
            .unwrap_or_else(|| vec!["RS256".to_string()])
            .iter()
            .map(|s| Algorithm::from_str(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ConfigError::Invalid("SIGNED_TOKEN_ALGORITHMS"))?;
        if signed_token_algorithms.is_empty() {
            return Err(ConfigError::Invalid("SIGNED_TOKEN_ALGORITHMS"));
        }

        let access_jwt_public_key_pem =
            var("ACCESS_JWT_PUBLIC_KEY_PEM").map(|v| v.replace("\\n", "\n"));

        let access_token_leeway_seconds = number("ACCESS_TOKEN_LEEWAY_SECONDS", 60)?;

        let opaque_fallback = match var("OPAQUE_FALLBACK") {
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid("OPAQUE_FALLBACK"))?,
            None => true,
        };

        let verify_timeout = Duration::from_millis(number("VERIFY_TIMEOUT_MS", 5000)?);
        let request_timeout = Duration::from_secs(number("REQUEST_TIMEOUT_SECONDS", 30)?);
        let jwks_cache_ttl = Duration::from_secs(number("JWKS_CACHE_TTL_SECONDS", 600)?);
        let default_token_lifetime = match number("DEFAULT_TOKEN_LIFETIME_SECONDS", 3600)? {
            secs @ 1..=MAX_TOKEN_LIFETIME_SECONDS => Duration::from_secs(secs),
            _ => return Err(ConfigError::Invalid("DEFAULT_TOKEN_LIFETIME_SECONDS")),
        };

        Ok(Self {
            addr,
            app_env,
            cors_allowed_origins,
            auth_issuer_url,
            auth_audience,
            public_base_url,
            resource_server_url,
            resource_name,
            resource_documentation_url,
            required_scopes,
            scopes_supported,
            protected_paths,
            signed_token_algorithms,
            access_jwt_public_key_pem,
            access_token_leeway_seconds,
            opaque_fallback,
            verify_timeout,
            request_timeout,
            jwks_cache_ttl,
            default_token_lifetime,
        })
    }
}
