//! Protected resource metadata (RFC 9728).
//!
//! The document tells clients which authorization server protects this
//! resource. Its only trust anchor is the issuer, so the issuer URL is checked
//! when the document is built, which happens once at startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::oauth_server::OAuthServerMetadata;

/// Discovery path, relative to the public base URL.
pub const WELL_KNOWN_PATH: &str = "/.well-known/oauth-protected-resource";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("issuer url is invalid: {0}")]
    InvalidIssuerUrl(String),
    #[error("issuer url must be https: {0}")]
    InsecureIssuerUrl(String),
    #[error("issuer url must not have a fragment: {0}")]
    IssuerUrlHasFragment(String),
    #[error("issuer url must not have a query string: {0}")]
    IssuerUrlHasQuery(String),
}

/// `https` is required except for loopback hosts used in local testing.
pub fn check_issuer_url(issuer: &str) -> Result<Url, ConfigurationError> {
    let url =
        Url::parse(issuer).map_err(|e| ConfigurationError::InvalidIssuerUrl(format!("{issuer}: {e}")))?;

    let loopback = matches!(url.host_str(), Some("localhost") | Some("127.0.0.1"));
    if url.scheme() != "https" && !loopback {
        return Err(ConfigurationError::InsecureIssuerUrl(issuer.to_string()));
    }
    if url.fragment().is_some() {
        return Err(ConfigurationError::IssuerUrlHasFragment(issuer.to_string()));
    }
    if url.query().is_some() {
        return Err(ConfigurationError::IssuerUrlHasQuery(issuer.to_string()));
    }
    Ok(url)
}

/// `<public base>/.well-known/oauth-protected-resource`
pub fn well_known_url(public_base_url: &str) -> String {
    format!("{}{}", public_base_url.trim_end_matches('/'), WELL_KNOWN_PATH)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectedResourceMetadata {
    resource: String,
    authorization_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    scopes_supported: Vec<String>,
    bearer_methods_supported: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource_documentation: Option<String>,
}

impl ProtectedResourceMetadata {
    /// Pure and deterministic: equal inputs serialize to identical bytes.
    pub fn build(
        oauth_metadata: &OAuthServerMetadata,
        resource_server_url: &Url,
        scopes_supported: &[String],
        resource_name: Option<&str>,
        documentation_url: Option<&Url>,
    ) -> Result<Self, ConfigurationError> {
        check_issuer_url(&oauth_metadata.issuer)?;

        Ok(Self {
            resource: resource_server_url.to_string(),
            authorization_servers: vec![oauth_metadata.issuer.clone()],
            scopes_supported: scopes_supported.to_vec(),
            bearer_methods_supported: vec!["header".to_string()],
            resource_name: resource_name.map(str::to_string),
            resource_documentation: documentation_url.map(Url::to_string),
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn authorization_servers(&self) -> &[String] {
        &self.authorization_servers
    }
}
