use serde::{Deserialize, Serialize};

/// Authorization-server metadata (RFC 8414 field names).
///
/// Built once from configuration and treated as a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthServerMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub device_authorization_endpoint: String,
    pub userinfo_endpoint: String,
    pub mfa_challenge_endpoint: String,
    pub jwks_uri: String,
    pub registration_endpoint: String,
    pub revocation_endpoint: String,
    pub end_session_endpoint: String,

    pub response_types_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub response_modes_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub grant_types_supported: Vec<String>,
    pub code_challenge_methods_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_signing_alg_values_supported: Vec<String>,
    pub claims_supported: Vec<String>,
    pub request_uri_parameter_supported: bool,
    pub request_parameter_supported: bool,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl OAuthServerMetadata {
    /// Endpoint layout of a hosted OIDC tenant rooted at `base`
    /// (e.g. `https://tenant.example.auth0.com`).
    ///
    /// The issuer identifier is the base URL with a trailing slash, which is
    /// what such tenants put in the `iss` claim.
    pub fn for_issuer(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        let endpoint = |path: &str| format!("{}{}", base, path);

        Self {
            issuer: endpoint("/"),
            authorization_endpoint: endpoint("/authorize"),
            token_endpoint: endpoint("/oauth/token"),
            device_authorization_endpoint: endpoint("/oauth/device/code"),
            userinfo_endpoint: endpoint("/userinfo"),
            mfa_challenge_endpoint: endpoint("/mfa/challenge"),
            jwks_uri: endpoint("/.well-known/jwks.json"),
            registration_endpoint: endpoint("/oidc/register"),
            revocation_endpoint: endpoint("/oauth/revoke"),
            end_session_endpoint: endpoint("/oidc/logout"),

            response_types_supported: strings(&["code", "token"]),
            scopes_supported: strings(&[
                "openid",
                "profile",
                "offline_access",
                "name",
                "given_name",
                "family_name",
                "nickname",
                "email",
                "email_verified",
                "picture",
                "created_at",
                "identities",
                "phone",
                "address",
            ]),
            response_modes_supported: strings(&["query", "fragment", "form_post"]),
            subject_types_supported: strings(&["public"]),
            token_endpoint_auth_methods_supported: strings(&[
                "client_secret_basic",
                "client_secret_post",
                "private_key_jwt",
            ]),
            grant_types_supported: strings(&["authorization_code"]),
            code_challenge_methods_supported: strings(&["S256", "plain"]),
            id_token_signing_alg_values_supported: strings(&["RS256", "RS384", "PS256"]),
            token_endpoint_auth_signing_alg_values_supported: strings(&[
                "RS256", "RS384", "PS256",
            ]),
            claims_supported: strings(&[
                "aud",
                "auth_time",
                "created_at",
                "email",
                "email_verified",
                "exp",
                "family_name",
                "given_name",
                "iat",
                "identities",
                "iss",
                "name",
                "nickname",
                "phone_number",
                "picture",
                "sub",
            ]),
            request_uri_parameter_supported: false,
            request_parameter_supported: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_hang_off_the_base_url() {
        let m = OAuthServerMetadata::for_issuer("https://tenant.example.com/");
        assert_eq!(m.issuer, "https://tenant.example.com/");
        assert_eq!(m.jwks_uri, "https://tenant.example.com/.well-known/jwks.json");
        assert_eq!(m.userinfo_endpoint, "https://tenant.example.com/userinfo");
        assert_eq!(m.token_endpoint, "https://tenant.example.com/oauth/token");
        assert_eq!(m.end_session_endpoint, "https://tenant.example.com/oidc/logout");
    }

    #[test]
    fn trailing_slash_does_not_change_issuer() {
        assert_eq!(
            OAuthServerMetadata::for_issuer("https://a.example.com"),
            OAuthServerMetadata::for_issuer("https://a.example.com/")
        );
    }
}
