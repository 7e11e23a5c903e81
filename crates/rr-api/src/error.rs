//! HTTP mapping for `AppError`.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use rr_core::error::{AppError, FieldErrors};
use serde_json::json;
use std::fmt;

/// `AppError` as an actix response. Validation failures become a
/// per-field map; everything else is `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    pub fn not_found() -> Self {
        ApiError(AppError::not_found("Resource", "?"))
    }

    pub fn unauthorized(detail: &str) -> Self {
        ApiError(AppError::Unauthorized(detail.to_string()))
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ApiError(AppError::ValidationError(FieldErrors::single(field, message)))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl From<FieldErrors> for ApiError {
    fn from(errors: FieldErrors) -> Self {
        ApiError(AppError::ValidationError(errors))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError(AppError::from(err))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            AppError::NotFound(..) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        match &self.0 {
            AppError::NotFound(..) => response.json(json!({ "detail": "Not found." })),
            AppError::ValidationError(errors) => response.json(errors),
            AppError::Unauthorized(detail) | AppError::Forbidden(detail) => {
                response.json(json!({ "detail": detail }))
            }
            AppError::Internal(message) => {
                log::error!("Internal error: {}", message);
                response.json(json!({ "detail": "A server error occurred." }))
            }
        }
    }
}
