//! API request and response types.

use crate::convert::Pipeline;
use crate::output::PageText;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body limits applied by the router.
#[derive(Debug, Clone, Copy)]
pub struct ApiSizeLimits {
    /// Maximum size of the whole request body.
    pub max_request_body_bytes: usize,

    /// Maximum size of one multipart field (the uploaded file).
    pub max_multipart_field_bytes: usize,
}

impl Default for ApiSizeLimits {
    fn default() -> Self {
        Self::from_mb(100, 100)
    }
}

impl ApiSizeLimits {
    pub fn new(max_request_body_bytes: usize, max_multipart_field_bytes: usize) -> Self {
        Self {
            max_request_body_bytes,
            max_multipart_field_bytes,
        }
    }

    pub fn from_mb(max_request_body_mb: usize, max_multipart_field_mb: usize) -> Self {
        Self {
            max_request_body_bytes: max_request_body_mb * 1024 * 1024,
            max_multipart_field_bytes: max_multipart_field_mb * 1024 * 1024,
        }
    }
}

/// Shared router state.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub pipeline: Arc<Pipeline>,
}

/// `POST /upload` answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Name the upload was stored under.
    pub source_filename: String,
    /// Name to pass to `GET /download_word/{filename}`.
    pub artifact_filename: String,
    /// Recognised text per page, pages without text omitted.
    pub detected_texts: Vec<PageText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    pub status_code: u16,
}
