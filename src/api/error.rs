//! Mapping of pipeline errors onto HTTP responses.

use super::types::ErrorResponse;
use crate::error::PipelineError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// An error answered as JSON `{error_type, message, status_code}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub message: String,
}

impl ApiError {
    /// A malformed request (bad multipart, missing file field, …).
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error_type: "BadRequest",
            message: message.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let (status, error_type) = match &err {
            PipelineError::UnsupportedFormat { .. } => {
                (StatusCode::BAD_REQUEST, "UnsupportedFormat")
            }
            PipelineError::InvalidFilename { .. } => (StatusCode::BAD_REQUEST, "InvalidFilename"),
            PipelineError::ArtifactNotFound { .. } => (StatusCode::NOT_FOUND, "ArtifactNotFound"),
            PipelineError::SourceNotFound { .. } => (StatusCode::NOT_FOUND, "SourceNotFound"),
            PipelineError::DocumentCorrupt { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "DocumentCorrupt")
            }
            PipelineError::OcrService { .. } => (StatusCode::BAD_GATEWAY, "OcrServiceError"),
            PipelineError::Cancelled { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "Cancelled"),
            PipelineError::PdfiumBindingFailed(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PdfiumBindingFailed")
            }
            PipelineError::StorageFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "StorageFailed")
            }
            PipelineError::OutputWriteFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "OutputWriteFailed")
            }
            PipelineError::InvalidConfig(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InvalidConfig")
            }
            PipelineError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        if status.is_server_error() {
            tracing::error!("{}: {}", error_type, err);
        } else {
            tracing::debug!("{}: {}", error_type, err);
        }

        Self {
            status,
            error_type,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error_type: self.error_type.to_string(),
            message: self.message,
            status_code: self.status.as_u16(),
        };
        (self.status, Json(body)).into_response()
    }
}
