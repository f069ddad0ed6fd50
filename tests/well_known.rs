mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::json;
use url::Url;

use resource_guard::services::metadata::{
    ConfigurationError, OAuthServerMetadata, ProtectedResourceMetadata, WELL_KNOWN_PATH,
};

use common::*;

fn request(method: Method) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(WELL_KNOWN_PATH)
        .header(header::ORIGIN, "https://client.example.org")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn get_returns_metadata_with_issuer_as_sole_authorization_server() {
    let (userinfo, _) = userinfo_server().await;
    let app = test_app(Options::new(userinfo));

    let (status, headers, body) = send(&app.router, request(Method::GET)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, OPTIONS");

    let doc = json_body(&body);
    assert_eq!(doc["authorization_servers"], json!([ISSUER]));
    assert_eq!(doc["resource"], AUDIENCE);
    assert_eq!(doc["scopes_supported"], json!(["openid"]));
    assert_eq!(doc["resource_name"], "mcp-server");
    assert_eq!(doc["bearer_methods_supported"], json!(["header"]));
}

#[tokio::test]
async fn options_is_204_with_empty_body() {
    let (userinfo, _) = userinfo_server().await;
    let app = test_app(Options::new(userinfo));

    let (status, headers, body) = send(&app.router, request(Method::OPTIONS)).await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn other_methods_are_405() {
    let (userinfo, _) = userinfo_server().await;
    let app = test_app(Options::new(userinfo));

    for method in [Method::POST, Method::PUT, Method::DELETE] {
        let (status, _, body) = send(&app.router, request(method.clone())).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method}");
        assert_eq!(body, b"Method not allowed");
    }
}

#[tokio::test]
async fn metadata_is_public() {
    let (userinfo, stub) = userinfo_server().await;
    let app = test_app(Options::new(userinfo));

    let (status, _, _) = send(&app.router, get_with(WELL_KNOWN_PATH, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stub.calls(), 0);
}

#[test]
fn build_is_byte_identical_across_calls() {
    let config = config(&[("SCOPES_SUPPORTED", "openid mcp:tools")]);
    let oauth = OAuthServerMetadata::for_issuer(&config.auth_issuer_url);
    let build = || {
        let doc = ProtectedResourceMetadata::build(
            &oauth,
            &config.resource_server_url,
            &config.scopes_supported,
            Some(&config.resource_name),
            Some(&config.resource_documentation_url),
        )
        .unwrap();
        serde_json::to_vec(&doc).unwrap()
    };
    assert_eq!(build(), build());
}

#[test]
fn insecure_issuer_fails_at_build_time() {
    let resource = Url::parse(AUDIENCE).unwrap();

    let oauth = OAuthServerMetadata::for_issuer("http://auth.example.com");
    assert!(matches!(
        ProtectedResourceMetadata::build(&oauth, &resource, &[], None, None),
        Err(ConfigurationError::InsecureIssuerUrl(_))
    ));

    let oauth = OAuthServerMetadata::for_issuer("http://localhost:8080");
    assert!(ProtectedResourceMetadata::build(&oauth, &resource, &[], None, None).is_ok());
}

#[test]
fn app_state_rejects_insecure_issuer() {
    let config = config(&[("AUTH_ISSUER_URL", "http://auth.example.com")]);
    assert!(resource_guard::app::build_state(&config).is_err());
}
