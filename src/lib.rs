//! # docscan-ocr
//!
//! Turn scanned PDFs and photos of documents into editable text through an
//! external OCR service.
//!
//! Every page is rasterised, sent to the OCR backend as a PNG, and the
//! recognised text is collected in page order. The result is exported as a
//! Word document (`.docx`, one paragraph per page) or, on request, as a flat
//! text file next to the upload.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (pdf / jpg / png)
//!  │
//!  ├─ 1. Route      by file extension; anything else is rejected up front
//!  ├─ 2. Store      sanitised name in the upload directory
//!  ├─ 3. Render     pdfium (PDF, spawn_blocking) or image decode (JPEG/PNG)
//!  ├─ 4. Encode     PNG
//!  ├─ 5. OCR        Google Cloud Vision TEXT_DETECTION, or a vision LLM
//!  ├─ 6. Aggregate  page-ordered text; pages without text are dropped
//!  └─ 7. Export     "Page N:\n{text}\n" per page → .docx or _text file
//! ```
//!
//! Any OCR failure aborts the whole request: no partial document is ever
//! produced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docscan_ocr::{GoogleVisionDetector, Pipeline, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GOOGLE_VISION_API_KEY or GOOGLE_CLOUD_ACCESS_TOKEN
//!     let detector = Arc::new(GoogleVisionDetector::from_env()?);
//!     let pipeline = Pipeline::new(PipelineConfig::default(), detector)?;
//!
//!     let output = pipeline.upload("scan.pdf", std::fs::read("scan.pdf")?).await?;
//!     println!("{} page(s) with text → {}",
//!         output.detected_texts.len(),
//!         output.artifact.path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `api`   | via cli | axum HTTP server ([`api`]) |
//! | `cli`   | on      | Enables the `docscan` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable default features when using only the library:
//! ```toml
//! docscan-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod storage;

#[cfg(feature = "api")]
pub mod api;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OverlayNaming, PipelineConfig, PipelineConfigBuilder};
pub use convert::Pipeline;
pub use error::{OcrServiceError, PipelineError};
pub use output::{
    AggregatedText, ArtifactKind, ConversionOutput, ConversionStats, ExportedArtifact, OcrResult,
    PageImage, PageText, SourceDocument, SourceFormat,
};
pub use pipeline::aggregate::Aggregator;
pub use pipeline::encode::EncodedPage;
pub use pipeline::llm::VisionLlmDetector;
pub use pipeline::ocr::{GoogleVisionDetector, TextDetector, VisionAuth, VisionConfig};
pub use pipeline::render::{PdfiumRasterizer, Rasterizer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::sanitize_filename;
