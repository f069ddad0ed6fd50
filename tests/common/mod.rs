#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

use resource_guard::app;
use resource_guard::config::Config;
use resource_guard::middleware::auth::BearerAuthGate;
use resource_guard::services::auth::TokenVerifier;
use resource_guard::services::auth::keys::StaticKeySource;
use resource_guard::services::auth::opaque::OpaqueTokenVerifier;
use resource_guard::services::auth::signed::SignedTokenVerifier;
use resource_guard::services::metadata::{
    OAuthServerMetadata, ProtectedResourceMetadata, well_known_url,
};
use resource_guard::state::AppState;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const ISSUER_BASE: &str = "https://auth.example.com";
pub const ISSUER: &str = "https://auth.example.com/";
pub const PUBLIC_BASE: &str = "https://api.example.com";
pub const AUDIENCE: &str = "https://api.example.com/mcp";
pub const METADATA_URL: &str = "https://api.example.com/.well-known/oauth-protected-resource";

pub const GOOD_OPAQUE: &str = "good-opaque-token";

pub fn config(extra: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = [
        ("AUTH_ISSUER_URL", ISSUER_BASE),
        ("PUBLIC_BASE_URL", PUBLIC_BASE),
        ("RESOURCE_SERVER_URL", AUDIENCE),
    ]
    .iter()
    .chain(extra.iter())
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn sign(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

pub fn valid_claims(scope: &str) -> Value {
    json!({
        "iss": ISSUER,
        "aud": AUDIENCE,
        "sub": "user-1",
        "scope": scope,
        "exp": now() + 3600,
    })
}

/// Userinfo stand-in: `GOOD_OPAQUE` gets a profile, anything else a 401.
#[derive(Clone, Default)]
pub struct UserinfoStub {
    pub calls: Arc<AtomicUsize>,
}

impl UserinfoStub {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

async fn userinfo(State(stub): State<UserinfoStub>, headers: HeaderMap) -> Response {
    stub.calls.fetch_add(1, Ordering::SeqCst);

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if authorization == format!("Bearer {GOOD_OPAQUE}") {
        Json(json!({
            "sub": "auth0|abc123",
            "email": "alice@example.com",
            "email_verified": true,
            "name": "Alice",
            "nickname": "alice",
            "updated_at": "2024-01-01T00:00:00.000Z"
        }))
        .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn userinfo_without_subject() -> Json<Value> {
    Json(json!({ "email": "alice@example.com", "name": "Alice" }))
}

async fn userinfo_html() -> Response {
    (
        [(header::CONTENT_TYPE, "text/html")],
        "<html><body>Sign in</body></html>",
    )
        .into_response()
}

async fn userinfo_unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn userinfo_hangs() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(30)).await;
    StatusCode::OK
}

/// Serve `router` on an ephemeral loopback port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

pub async fn userinfo_server() -> (Url, UserinfoStub) {
    let stub = UserinfoStub::default();
    let router = Router::new()
        .route("/userinfo", get(userinfo))
        .route("/no-subject", get(userinfo_without_subject))
        .route("/html", get(userinfo_html))
        .route("/unavailable", get(userinfo_unavailable))
        .route("/hangs", get(userinfo_hangs))
        .with_state(stub.clone());
    let addr = serve(router).await;
    (Url::parse(&format!("http://{addr}/userinfo")).unwrap(), stub)
}

pub fn sibling(url: &Url, path: &str) -> Url {
    url.join(path).unwrap()
}

pub struct TestApp {
    pub router: Router,
    pub config: Config,
}

pub struct Options {
    pub userinfo: Url,
    pub fallback: bool,
    pub timeout: Duration,
    pub env: Vec<(&'static str, &'static str)>,
}

impl Options {
    pub fn new(userinfo: Url) -> Self {
        Self {
            userinfo,
            fallback: true,
            timeout: Duration::from_secs(5),
            env: Vec::new(),
        }
    }
}

/// Full application router with an HS256 static key and the given userinfo endpoint.
pub fn test_app(options: Options) -> TestApp {
    let config = config(&options.env);
    let oauth = OAuthServerMetadata::for_issuer(&config.auth_issuer_url);

    let signed = SignedTokenVerifier::new(
        Arc::new(StaticKeySource::from_secret(SECRET)),
        oauth.issuer.clone(),
        config.auth_audience.clone(),
        vec![Algorithm::HS256],
    );
    let opaque = OpaqueTokenVerifier::new(reqwest::Client::new(), options.userinfo);
    let verifier = TokenVerifier::new(signed, opaque)
        .fallback_to_opaque(options.fallback)
        .timeout(options.timeout);

    let gate = BearerAuthGate::new(Arc::new(verifier))
        .required_scopes(config.required_scopes.clone())
        .resource_metadata_url(well_known_url(&config.public_base_url));

    let metadata = ProtectedResourceMetadata::build(
        &oauth,
        &config.resource_server_url,
        &config.scopes_supported,
        Some(&config.resource_name),
        Some(&config.resource_documentation_url),
    )
    .unwrap();

    let router = app::build_router(AppState::new(gate, metadata), &config);
    TestApp { router, config }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    (status, headers, body)
}

pub fn get_with(path: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}
