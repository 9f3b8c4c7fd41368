use axum::extract::FromRequest;
use axum::extract::rejection::JsonRejection;
use keystone_core::AppError;

use crate::error::ApiError;

/// JSON body extractor whose rejections use the API error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(AppError::validation("body", rejection.body_text()))
    }
}
