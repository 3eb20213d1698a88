// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::RefreshFailure;
use crate::slack::SignatureError;

/// API errors that can occur during request processing
#[derive(Error, Debug)]
pub enum ApiError {
    /// Diagnostic API key missing or wrong
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Slack signature did not verify
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Malformed or unverifiable request
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found")]
    NotFound,

    /// Route exists but is not configured
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Token endpoint exchange failed
    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshFailure),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<SignatureError> for ApiError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Mismatch => ApiError::InvalidSignature(err.to_string()),
            SignatureError::MissingHeaders
            | SignatureError::InvalidTimestamp
            | SignatureError::Stale => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::AuthError(msg) => (StatusCode::UNAUTHORIZED, "auth_error", msg),
            ApiError::InvalidSignature(msg) => {
                (StatusCode::UNAUTHORIZED, "invalid_signature", msg)
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "not_found", "Not found".to_string()),
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
            ApiError::RefreshFailed(failure) => {
                // Token endpoint bodies stay in the logs
                tracing::error!("Token refresh failed: {}", failure);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "refresh_failed",
                    "Failed to refresh token. Check server logs for details.".to_string(),
                )
            }
            ApiError::Internal(err) => {
                // Log internal errors
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ApiError::AuthError("Invalid token".to_string());
        assert_eq!(err.to_string(), "Authentication failed: Invalid token");

        let err = ApiError::BadRequest("missing payload".to_string());
        assert_eq!(err.to_string(), "Bad request: missing payload");

        let err = ApiError::RefreshFailed(RefreshFailure::Network("timed out".to_string()));
        assert!(err.to_string().starts_with("Token refresh failed:"));
    }

    #[test]
    fn test_internal_error_message() {
        let err = ApiError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }

    #[test]
    fn test_signature_error_mapping() {
        assert!(matches!(
            ApiError::from(SignatureError::Mismatch),
            ApiError::InvalidSignature(_)
        ));
        assert!(matches!(
            ApiError::from(SignatureError::Stale),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(SignatureError::MissingHeaders),
            ApiError::BadRequest(_)
        ));
    }

    #[tokio::test]
    async fn test_error_response_conversion() {
        let cases = vec![
            (ApiError::AuthError("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::InvalidSignature("x".into()), StatusCode::UNAUTHORIZED),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::NotFound, StatusCode::NOT_FOUND),
            (
                ApiError::ServiceUnavailable("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::RefreshFailed(RefreshFailure::Rejected {
                    status: 400,
                    body: "invalid_grant".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Internal(anyhow::anyhow!("Unexpected error")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::BadRequest("stale request".to_string()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["type"], "bad_request");
        assert_eq!(body["error"]["message"], "stale request");
    }
}
