use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keystone_core::AppError;
use tracing::error;

mod types;

pub use types::ErrorResponse;

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, payload) = match self.0 {
            AppError::Validation(errors) | AppError::Conflict(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse::validation(&errors),
            ),
            AppError::NotFound(message) => {
                (StatusCode::NOT_FOUND, ErrorResponse::new("not-found", message))
            }
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("unauthorized", message),
            ),
            AppError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, ErrorResponse::forbidden(reason))
            }
            AppError::Internal(message) => {
                error!(%message, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("error", "internal server error".to_owned()),
                )
            }
        };

        (status, Json(payload)).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
