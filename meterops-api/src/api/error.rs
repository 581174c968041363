//! HTTP error responses
//!
//! Every failure leaves the service as `{error, message}` JSON. Store and
//! internal failures are logged in full and reported with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use meterops_common::api::{ApiAuthError, ErrorResponse};
use thiserror::Error;
use tracing::error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<meterops_common::Error> for ApiError {
    fn from(err: meterops_common::Error) -> Self {
        use meterops_common::Error;

        match err {
            Error::Database(e) => ApiError::Database(e),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ApiAuthError> for ApiError {
    fn from(err: ApiAuthError) -> Self {
        match err {
            ApiAuthError::MissingHeader => {
                ApiError::Unauthorized("Missing Authorization header".to_string())
            }
            ApiAuthError::InvalidHeader => {
                ApiError::Unauthorized("Invalid Authorization header".to_string())
            }
            ApiAuthError::DatabaseError(msg) => ApiError::Internal(msg),
            // Verification details stay in the logs
            _ => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Database(e) => {
                error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_failures_hide_details() {
        let err: ApiError = ApiAuthError::InvalidSignature.into();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid token"));

        let err: ApiError = ApiAuthError::Expired { exp: 1, now: 2 }.into();
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Invalid token"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::BadRequest("x".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("x".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Internal("x".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_common_errors_map_to_http_kinds() {
        let err: ApiError = meterops_common::Error::NotFound("Reading R1".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = meterops_common::Error::InvalidInput("since".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
