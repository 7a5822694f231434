use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use tidings_core::error::AppError;

use crate::dto::RunResponse;

/// Wrapper so we can implement `IntoResponse` for `AppError`.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::ConfigError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(error = %self.0, "Request failed");
        let body = RunResponse::Error {
            detail: self.0.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
