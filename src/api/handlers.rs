//! API request handlers.

use super::error::ApiError;
use super::types::{ApiState, HealthResponse, UploadResponse};
use crate::error::PipelineError;
use crate::export::docx::DOCX_MIME_TYPE;
use crate::output::SourceFormat;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// Upload endpoint handler.
///
/// POST /upload
///
/// Accepts multipart form data with a single `file` field. The file name
/// must end in `.pdf`, `.jpg`, `.jpeg` or `.png`; anything else is rejected
/// with 400 before the file is stored or sent to OCR.
///
/// Returns the per-page text and the name of the `.docx` artifact.
pub async fn upload_handler(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("").to_string();
        if file_name.is_empty() {
            return Err(ApiError::bad_request("No selected file"));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        upload = Some((file_name, data.to_vec()));
    }

    let (file_name, data) = upload.ok_or_else(|| ApiError::bad_request("No file part"))?;
    let output = state.pipeline.upload(&file_name, data).await?;

    Ok(Json(UploadResponse {
        source_filename: output.source_filename,
        artifact_filename: output.artifact.filename,
        detected_texts: output.detected_texts.as_slice().to_vec(),
    }))
}

/// Rich-text download handler.
///
/// GET /download_word/{filename}
pub async fn download_word_handler(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state.pipeline.artifact_path(&filename)?;
    let bytes = read_file(&path, || PipelineError::ArtifactNotFound {
        filename: filename.clone(),
    })
    .await?;
    Ok(attachment(&file_name_of(&path), DOCX_MIME_TYPE, bytes))
}

/// Overlay-text download handler.
///
/// GET /download_text/{filename}
///
/// Re-runs rasterisation and OCR on the stored source every time.
pub async fn download_text_handler(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let artifact = state.pipeline.reconvert(&filename).await?;
    let bytes = read_file(&artifact.path, || PipelineError::ArtifactNotFound {
        filename: artifact.filename.clone(),
    })
    .await?;
    Ok(attachment(&artifact.filename, PLAIN_TEXT, bytes))
}

/// Stored upload handler.
///
/// GET /uploads/{filename}
pub async fn uploaded_file_handler(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let bytes = state.pipeline.source_bytes(&filename).await?;
    let content_type = SourceFormat::from_filename(&filename)
        .map(SourceFormat::mime_type)
        .unwrap_or(PLAIN_TEXT);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Health check endpoint handler.
///
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn read_file(
    path: &std::path::Path,
    not_found: impl FnOnce() -> PipelineError,
) -> Result<Vec<u8>, ApiError> {
    tokio::fs::read(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::from(not_found())
        } else {
            ApiError::from(PipelineError::StorageFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    })
}

fn file_name_of(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn attachment(filename: &str, content_type: &str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}
