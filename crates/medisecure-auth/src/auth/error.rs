//! Authentication errors.

use axum::{
    Json,
    http::{StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use super::config::ConfigError;
use crate::user::StoreError;

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication errors.
///
/// The `Display` text may carry internal detail and is meant for logs. What a
/// caller sees comes from [`AuthError::public_message`].
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier, inactive account or wrong secret.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token is malformed or its signature does not verify.
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token signature is valid but the expiry has passed.
    #[error("token expired")]
    Expired,

    /// Token was rejected by the configured revocation check.
    #[error("token revoked")]
    Revoked,

    /// Configuration is unusable. Raised at construction only.
    #[error("authentication misconfigured: {0}")]
    Misconfigured(#[from] ConfigError),

    /// The credential store failed or timed out.
    #[error("credential store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller passed an argument outside its contract.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error.
    #[error("internal auth error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::StoreUnavailable(err.to_string())
    }
}

impl AuthError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InvalidSignature => "invalid_token",
            AuthError::Expired => "token_expired",
            AuthError::Revoked => "invalid_token",
            AuthError::Misconfigured(_) => "internal_error",
            AuthError::StoreUnavailable(_) => "service_unavailable",
            AuthError::InvalidRequest(_) => "invalid_request",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to return to a caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid credentials",
            // Revoked and bad-signature tokens are indistinguishable to callers
            AuthError::InvalidSignature | AuthError::Revoked => "invalid token",
            AuthError::Expired => "token expired",
            AuthError::StoreUnavailable(_) => "authentication temporarily unavailable",
            AuthError::InvalidRequest(_) => "invalid request",
            AuthError::Misconfigured(_) | AuthError::Internal(_) => "internal server error",
        }
    }

    /// HTTP status a transport layer should use.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::Revoked => StatusCode::UNAUTHORIZED,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::Misconfigured(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_))
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub error_code: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorResponse {
            error: self.public_message().to_string(),
            error_code: self.error_code().to_string(),
        });

        if status == StatusCode::UNAUTHORIZED {
            (status, [(WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_auth_error_display() {
        assert_eq!(AuthError::InvalidCredentials.to_string(), "invalid credentials");
        assert_eq!(AuthError::Expired.to_string(), "token expired");
        assert_eq!(
            AuthError::StoreUnavailable("connection refused".to_string()).to_string(),
            "credential store unavailable: connection refused"
        );
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = AuthError::Internal("stack trace: at foo.rs:12".to_string());
        assert_eq!(err.public_message(), "internal server error");

        let err = AuthError::StoreUnavailable("postgres://user:pw@db".to_string());
        assert!(!err.public_message().contains("postgres"));

        let err = AuthError::Misconfigured(ConfigError::JwtSecretTooShort);
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn test_revoked_looks_like_invalid_signature() {
        assert_eq!(
            AuthError::Revoked.public_message(),
            AuthError::InvalidSignature.public_message()
        );
        assert_eq!(
            AuthError::Revoked.error_code(),
            AuthError::InvalidSignature.error_code()
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: AuthError = StoreError::Unavailable("pool closed".to_string()).into();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
        assert!(err.is_retryable());
        assert!(!AuthError::InvalidCredentials.is_retryable());
    }

    #[tokio::test]
    async fn test_unauthorized_response() {
        let response = AuthError::InvalidCredentials.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Bearer"
        );

        let json = body_json(response).await;
        assert_eq!(json["error"], "invalid credentials");
        assert_eq!(json["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn test_expired_response_is_distinct() {
        let response = AuthError::Expired.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error_code"], "token_expired");
    }

    #[tokio::test]
    async fn test_store_unavailable_response() {
        let response = AuthError::StoreUnavailable("timeout after 5s".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let json = body_json(response).await;
        assert_eq!(json["error_code"], "service_unavailable");
        assert!(!json["error"].as_str().unwrap().contains("timeout"));
    }

    #[tokio::test]
    async fn test_internal_response() {
        let response = AuthError::Internal("join error: panicked".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "internal server error");
    }
}
