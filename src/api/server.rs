//! API server setup and configuration.

use super::handlers::{
    download_text_handler, download_word_handler, health_handler, upload_handler,
    uploaded_file_handler,
};
use super::types::{ApiSizeLimits, ApiState};
use crate::convert::Pipeline;
use crate::error::PipelineError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Parse size limits from environment variables.
///
/// `DOCSCAN_MAX_UPLOAD_MB` sets both the request-body and the per-field
/// limit. Falls back to 100 MB if unset, zero or not a number.
pub fn parse_size_limits_from_env() -> ApiSizeLimits {
    const DEFAULT_100MB_MB: usize = 100;

    if let Ok(value) = std::env::var("DOCSCAN_MAX_UPLOAD_MB") {
        match value.parse::<usize>() {
            Ok(mb) if mb > 0 => {
                tracing::info!("Upload size limit configured from environment: {} MB", mb);
                return ApiSizeLimits::from_mb(mb, mb);
            }
            Ok(_) => tracing::warn!("Invalid DOCSCAN_MAX_UPLOAD_MB value (must be > 0)"),
            Err(_) => tracing::warn!(
                "Failed to parse DOCSCAN_MAX_UPLOAD_MB='{}', must be a valid usize",
                value
            ),
        }
    }

    let limits = ApiSizeLimits::from_mb(DEFAULT_100MB_MB, DEFAULT_100MB_MB);
    tracing::info!(
        "Upload size limit: 100 MB (default, {} bytes) - Configure with DOCSCAN_MAX_UPLOAD_MB",
        limits.max_request_body_bytes
    );
    limits
}

/// Create the API router with default size limits.
///
/// Public so the routes can be nested into a larger application.
pub fn create_router(pipeline: Arc<Pipeline>) -> Router {
    create_router_with_limits(pipeline, ApiSizeLimits::default())
}

/// Create the API router with explicit size limits.
pub fn create_router_with_limits(pipeline: Arc<Pipeline>, limits: ApiSizeLimits) -> Router {
    let state = ApiState { pipeline };

    Router::new()
        .route("/upload", post(upload_handler))
        .route("/download_word/{filename}", get(download_word_handler))
        .route("/download_text/{filename}", get(download_text_handler))
        .route("/uploads/{filename}", get(uploaded_file_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(limits.max_multipart_field_bytes))
        .layer(RequestBodyLimitLayer::new(limits.max_request_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server, reading size limits from the environment.
///
/// # Examples
///
/// ```no_run
/// use docscan_ocr::{GoogleVisionDetector, Pipeline, PipelineConfig, api::serve};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let detector = Arc::new(GoogleVisionDetector::from_env()?);
///     let pipeline = Arc::new(Pipeline::new(PipelineConfig::default(), detector)?);
///     serve("127.0.0.1", 5000, pipeline).await?;
///     Ok(())
/// }
/// ```
pub async fn serve(
    host: impl AsRef<str>,
    port: u16,
    pipeline: Arc<Pipeline>,
) -> Result<(), PipelineError> {
    serve_with_limits(host, port, pipeline, parse_size_limits_from_env()).await
}

/// Start the API server with explicit size limits.
pub async fn serve_with_limits(
    host: impl AsRef<str>,
    port: u16,
    pipeline: Arc<Pipeline>,
    limits: ApiSizeLimits,
) -> Result<(), PipelineError> {
    let ip: IpAddr = host
        .as_ref()
        .parse()
        .map_err(|e| PipelineError::InvalidConfig(format!("Invalid host address: {}", e)))?;

    let addr = SocketAddr::new(ip, port);
    let app = create_router_with_limits(pipeline, limits);

    tracing::info!("Starting docscan server on http://{}:{}", ip, port);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PipelineError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| PipelineError::Internal(e.to_string()))?;

    Ok(())
}
