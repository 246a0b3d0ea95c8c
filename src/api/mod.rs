//! HTTP API for uploading scans and downloading their text.
//!
//! An axum router over a shared [`crate::Pipeline`].
//!
//! # Endpoints
//!
//! - `POST /upload` - Store a PDF/JPEG/PNG (multipart field `file`), OCR it, export `.docx`
//! - `GET /download_word/{filename}` - Download a `.docx` artifact
//! - `GET /download_text/{filename}` - Re-run OCR on a stored source, download the text file
//! - `GET /uploads/{filename}` - Raw stored upload
//! - `GET /health` - Health check
//!
//! # cURL Examples
//!
//! ```bash
//! curl -F "file=@scan.pdf" http://localhost:5000/upload
//! curl -OJ http://localhost:5000/download_word/scan.docx
//! curl -OJ http://localhost:5000/download_text/scan.pdf
//! ```

mod error;
mod handlers;
mod server;
mod types;

pub use error::ApiError;
pub use server::{
    create_router, create_router_with_limits, parse_size_limits_from_env, serve, serve_with_limits,
};
pub use types::{ApiSizeLimits, ApiState, ErrorResponse, HealthResponse, UploadResponse};
