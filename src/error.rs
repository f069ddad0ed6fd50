/*
 * Responsibility
 * - Bearer authentication error taxonomy (AuthError)
 * - Wire format of failures: `{ "error", "error_description" }`
 * - HTTP mapping (status + WWW-Authenticate challenge) via AuthRejection
 */
use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Body returned for every authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

/// Failure of bearer authentication.
///
/// The status code and challenge shape are a property of the kind, never of the
/// call site: callers only decide *whether* a request is gated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Malformed, unverifiable, expired, or structurally wrong credential.
    #[error("invalid token: {0}")]
    InvalidToken(String),
    /// Authenticated, but the granted scopes do not cover the requirement.
    #[error("insufficient scope: {0}")]
    InsufficientScope(String),
    /// One of the verifier's own dependencies failed.
    ///
    /// The description is sent to the caller, so it must stay generic; the
    /// underlying cause is logged where the error is created.
    #[error("server error: {0}")]
    ServerError(String),
    /// Any other OAuth error with its own code (e.g. `invalid_request`).
    #[error("{code}: {description}")]
    Other {
        code: &'static str,
        description: String,
    },
}

impl AuthError {
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::InvalidToken(description.into())
    }

    pub fn insufficient_scope(description: impl Into<String>) -> Self {
        Self::InsufficientScope(description.into())
    }

    pub fn server_error(description: impl Into<String>) -> Self {
        Self::ServerError(description.into())
    }

    pub fn other(code: &'static str, description: impl Into<String>) -> Self {
        Self::Other {
            code,
            description: description.into(),
        }
    }

    /// Stable machine-readable code (RFC 6750 §3.1 where one exists).
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::InsufficientScope(_) => "insufficient_scope",
            AuthError::ServerError(_) => "server_error",
            AuthError::Other { code, .. } => code,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            AuthError::InvalidToken(d)
            | AuthError::InsufficientScope(d)
            | AuthError::ServerError(d) => d,
            AuthError::Other { description, .. } => description,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientScope(_) => StatusCode::FORBIDDEN,
            AuthError::ServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Other { .. } => StatusCode::BAD_REQUEST,
        }
    }

    /// True for failures caused by the presented credential itself.
    pub fn is_invalid_token(&self) -> bool {
        matches!(self, AuthError::InvalidToken(_))
    }

    pub fn to_response_object(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            error_description: self.description().to_string(),
        }
    }

    /// `WWW-Authenticate` value for this failure, if it carries a challenge.
    ///
    /// Only 401/403 failures challenge the client. `resource_metadata` (RFC 9728)
    /// is appended when the protected route has a discovery URL.
    pub fn www_authenticate(&self, resource_metadata_url: Option<&str>) -> Option<String> {
        if !matches!(
            self,
            AuthError::InvalidToken(_) | AuthError::InsufficientScope(_)
        ) {
            return None;
        }

        let mut value = format!(
            "Bearer error=\"{}\", error_description=\"{}\"",
            self.error_code(),
            quoted_string_safe(self.description())
        );
        if let Some(url) = resource_metadata_url {
            value.push_str(&format!(", resource_metadata=\"{}\"", url));
        }
        Some(value)
    }
}

// auth-param values are quoted-strings; strip what would break the header.
fn quoted_string_safe(s: &str) -> String {
    s.chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect()
}

/// Response mapper: an `AuthError` bound to the discovery URL of the route
/// that rejected the request.
#[derive(Debug, Clone)]
pub struct AuthRejection {
    pub error: AuthError,
    pub resource_metadata_url: Option<String>,
}

impl AuthRejection {
    pub fn new(error: AuthError, resource_metadata_url: Option<String>) -> Self {
        Self {
            error,
            resource_metadata_url,
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let challenge = self
            .error
            .www_authenticate(self.resource_metadata_url.as_deref());

        let mut response = (status, Json(self.error.to_response_object())).into_response();

        if let Some(challenge) = challenge {
            match HeaderValue::from_str(&challenge) {
                Ok(value) => {
                    response
                        .headers_mut()
                        .insert(header::WWW_AUTHENTICATE, value);
                }
                Err(err) => {
                    // Description or URL contained non-visible ASCII; keep the scheme at least.
                    tracing::warn!(error = ?err, "unencodable WWW-Authenticate value");
                    response.headers_mut().insert(
                        header::WWW_AUTHENTICATE,
                        HeaderValue::from_static("Bearer"),
                    );
                }
            }
        }

        response
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AuthRejection::new(self, None).into_response()
    }
}
