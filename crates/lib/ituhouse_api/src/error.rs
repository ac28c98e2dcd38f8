//! Application error types.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};
use ituhouse_core::auth::AuthError;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid code: {0}")]
    InvalidCode(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database unavailable: {0}")]
    DbUnavailable(String),

    #[error("Dependency failure: {0}")]
    DependencyFailure(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::InvalidCode(m) => (StatusCode::BAD_REQUEST, "invalid_code", m.as_str()),
            AppError::Conflict(m) => (StatusCode::BAD_REQUEST, "conflict", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::DbUnavailable(m) => {
                error!(detail = %m, "database unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "db_unavailable",
                    "Database unavailable",
                )
            }
            AppError::DependencyFailure(m) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "dependency_failure",
                m.as_str(),
            ),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(m) => {
                error!(detail = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DbUnavailable(e.to_string())
            }
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".into()),
            AuthError::AccountInactive => AppError::Forbidden("User inactive".into()),
            AuthError::Unauthenticated | AuthError::InvalidToken(_) => {
                AppError::Unauthorized("Could not validate credentials".into())
            }
            AuthError::Forbidden => AppError::Forbidden("Insufficient permissions".into()),
            AuthError::InvalidOrExpiredCode => {
                AppError::InvalidCode("Invalid or expired code".into())
            }
            AuthError::EmailTaken => AppError::Conflict("email already registered".into()),
            AuthError::UsernameTaken => AppError::Conflict("username already registered".into()),
            AuthError::NotFound(msg) => AppError::NotFound(msg),
            AuthError::SuperadminDemotion => {
                AppError::Validation("Cannot demote super admin".into())
            }
            AuthError::Validation(msg) => AppError::Validation(msg),
            AuthError::Delivery(msg) => AppError::DependencyFailure(msg),
            AuthError::Db(e) => AppError::from(e),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: AuthError) -> StatusCode {
        AppError::from(e).into_response().status()
    }

    #[test]
    fn auth_errors_map_to_statuses() {
        assert_eq!(status_of(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::AccountInactive), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AuthError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(AuthError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(status_of(AuthError::InvalidOrExpiredCode), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AuthError::EmailTaken), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AuthError::UsernameTaken), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(AuthError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AuthError::SuperadminDemotion), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(AuthError::Delivery("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(AuthError::Db(sqlx::Error::PoolTimedOut)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn token_failures_are_indistinguishable() {
        let a = AppError::from(AuthError::InvalidToken("ExpiredSignature".into()));
        let b = AppError::from(AuthError::Unauthenticated);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn unauthorized_carries_bearer_challenge() {
        let resp = AppError::Unauthorized("x".into()).into_response();
        assert_eq!(resp.headers().get(WWW_AUTHENTICATE).unwrap(), "Bearer");
    }
}
