//! Unified Error Handling
//!
//! Maps domain errors onto HTTP responses. Validation-class failures are 400,
//! duplicates 409, auth failures 401, database failures 500. Cache errors
//! never surface here: they are logged and swallowed at the service layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::domain::OrderError;

/// Application-level Result type used by HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Application-level error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== Authentication Errors ==========
    #[error("authentication required")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    // ========== Validation Errors ==========
    #[error("malformed request body")]
    WrongJson,

    #[error("{0}")]
    Validation(String),

    // ========== Domain Errors ==========
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("user with this email is already registered")]
    UserAlreadyExists,

    #[error("email or password is incorrect")]
    InvalidCredentials,

    // ========== System Errors ==========
    #[error("database error: {0}")]
    Database(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::WrongJson | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::UserAlreadyExists => StatusCode::CONFLICT,
            AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Order(err) => match err {
                OrderError::Duplicate => StatusCode::CONFLICT,
                OrderError::NotFound => StatusCode::BAD_REQUEST,
                OrderError::Database(_) | OrderError::Cache(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            },
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "request failed");
        }
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_status() {
        assert_eq!(
            AppError::Order(OrderError::Duplicate).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Order(OrderError::Expired).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Order(OrderError::NotIssued).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Order(OrderError::Database("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::UserAlreadyExists.status(), StatusCode::CONFLICT);
    }
}
