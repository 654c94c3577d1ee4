use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fluxgate_core::AppError;
use serde::Serialize;
use tracing::error;
use ts_rs::TS;

/// API error payload.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/error-response.ts"
)]
pub struct ErrorResponse {
    error: &'static str,
    message: String,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self.0 {
            AppError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation_failed"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "rule_not_found"),
            AppError::AlreadyExists(_) => (StatusCode::CONFLICT, "rule_already_exists"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Storage { .. } => (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if let AppError::Storage { operation, .. } = &self.0 {
            error!(operation, error = %self.0, "storage failure surfaced to client");
        }

        let details = match &self.0 {
            AppError::Validation { field, reason } => Some(vec![format!("{field}: {reason}")]),
            _ => None,
        };

        let payload = Json(ErrorResponse {
            error: code,
            message: self.0.to_string(),
            retryable: self.0.is_retryable(),
            details,
        });

        (status, payload).into_response()
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;
