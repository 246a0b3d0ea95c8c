//! Error types for the docscan-ocr library.
//!
//! Two error types reflect two layers of the pipeline:
//!
//! * [`PipelineError`]: **Fatal for the request**. The conversion cannot
//!   produce an artifact (unsupported upload, unreadable document, OCR
//!   service failure, missing file). Every `Pipeline` operation returns it.
//!
//! * [`OcrServiceError`]: what a [`crate::pipeline::ocr::TextDetector`]
//!   reports when the external service call fails. The aggregator wraps it in
//!   [`PipelineError::OcrService`] together with the failing page number.
//!
//! There is no partial-success mode: one failed page fails the whole request.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the conversion pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The uploaded name does not end in `.pdf`, `.jpg`, `.jpeg` or `.png`.
    #[error("Unsupported file '{filename}': only PDF, JPEG and PNG uploads are accepted")]
    UnsupportedFormat { filename: String },

    /// The name is empty (or loses its extension) once sanitised.
    #[error("Invalid file name '{filename}'")]
    InvalidFilename { filename: String },

    /// A generated artifact was requested that does not exist.
    #[error("Artifact not found: '{filename}'")]
    ArtifactNotFound { filename: String },

    /// A stored source was requested that does not exist.
    #[error("Source file not found: '{filename}'")]
    SourceNotFound { filename: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The stored file cannot be parsed as its declared format.
    #[error("Document '{path}' cannot be read: {detail}")]
    DocumentCorrupt { path: PathBuf, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH (or --pdfium-lib) to the directory containing libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR service failed on a page; the request is aborted.
    #[error("OCR failed on page {page}: {source}")]
    OcrService {
        page: usize,
        #[source]
        source: OcrServiceError,
    },

    /// The progress callback asked the aggregator to stop.
    #[error("Conversion cancelled before page {page}")]
    Cancelled { page: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create a storage directory or store an upload.
    #[error("Storage error at '{path}': {source}")]
    StorageFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an artifact.
    #[error("Failed to write artifact '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Whether the caller caused the failure (bad name, missing file).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFormat { .. }
                | PipelineError::InvalidFilename { .. }
                | PipelineError::ArtifactNotFound { .. }
                | PipelineError::SourceNotFound { .. }
        )
    }

    /// Whether the failure means "no such file".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PipelineError::ArtifactNotFound { .. } | PipelineError::SourceNotFound { .. }
        )
    }
}

/// Failure of a single call to the external OCR service.
///
/// Never retried by the detector or the aggregator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OcrServiceError {
    /// Network-level failure (DNS, TLS, connection reset, …).
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 401/403 from the service.
    #[error("authentication rejected (HTTP {status}): {detail}")]
    Auth { status: u16, detail: String },

    /// HTTP 429 or a RESOURCE_EXHAUSTED status.
    #[error("quota exceeded: {detail}")]
    Quota { detail: String },

    /// The service answered with an error.
    #[error("service error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// No answer within the configured timeout.
    #[error("no response after {secs}s")]
    Timeout { secs: u64 },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    InvalidResponse(String),

    /// Credentials or provider are missing.
    #[error("OCR backend not configured: {0}")]
    NotConfigured(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_service_display_includes_page() {
        let e = PipelineError::OcrService {
            page: 2,
            source: OcrServiceError::Quota {
                detail: "daily limit".into(),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("page 2"), "got: {msg}");
        assert!(msg.contains("daily limit"), "got: {msg}");
    }

    #[test]
    fn api_error_display_with_and_without_status() {
        let with = OcrServiceError::Api {
            status: Some(500),
            message: "backend".into(),
        };
        assert_eq!(with.to_string(), "service error (HTTP 500): backend");

        let without = OcrServiceError::Api {
            status: None,
            message: "backend".into(),
        };
        assert_eq!(without.to_string(), "service error: backend");
    }

    #[test]
    fn unsupported_format_is_client_error() {
        let e = PipelineError::UnsupportedFormat {
            filename: "anim.gif".into(),
        };
        assert!(e.is_client_error());
        assert!(!e.is_not_found());
    }

    #[test]
    fn not_found_classification() {
        let e = PipelineError::ArtifactNotFound {
            filename: "x.docx".into(),
        };
        assert!(e.is_not_found());
        assert!(e.is_client_error());

        let corrupt = PipelineError::DocumentCorrupt {
            path: PathBuf::from("a.pdf"),
            detail: "bad xref".into(),
        };
        assert!(!corrupt.is_client_error());
    }

    #[test]
    fn timeout_display() {
        let e = OcrServiceError::Timeout { secs: 30 };
        assert!(e.to_string().contains("30s"));
    }
}
