//! Pipeline orchestration: upload → rasterise → OCR → export.
//!
//! A [`Pipeline`] owns its configuration, its storage directories and the
//! injected rasteriser and OCR backend. Nothing is global, so tests build one
//! per temp directory with stub backends.
//!
//! Two request paths exist:
//!
//! * **upload** ([`Pipeline::upload`] / [`Pipeline::run`]): aggregate the
//!   text and export the rich-text `.docx` artifact.
//! * **reconvert** ([`Pipeline::reconvert`]): re-run rasterisation and OCR
//!   on a stored source and export a fresh overlay-text artifact. Nothing is
//!   cached between the two.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::export;
use crate::output::{ConversionOutput, ExportedArtifact, SourceDocument};
use crate::pipeline::aggregate::Aggregator;
use crate::pipeline::ocr::TextDetector;
use crate::pipeline::render::{PdfiumRasterizer, Rasterizer};
use crate::storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// The conversion pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    storage: Storage,
    aggregator: Aggregator,
}

impl Pipeline {
    /// Build a pipeline that rasterises with pdfium.
    ///
    /// Creates the upload and export directories if they are missing.
    ///
    /// # Example
    /// ```rust,no_run
    /// use docscan_ocr::{GoogleVisionDetector, Pipeline, PipelineConfig};
    /// use std::sync::Arc;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let detector = Arc::new(GoogleVisionDetector::from_env()?);
    /// let pipeline = Pipeline::new(PipelineConfig::default(), detector)?;
    ///
    /// let bytes = std::fs::read("scan.pdf")?;
    /// let output = pipeline.upload("scan.pdf", bytes).await?;
    /// for page in output.detected_texts.iter() {
    ///     println!("Page {}:\n{}", page.page, page.text);
    /// }
    /// println!("→ {}", output.artifact.path.display());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(
        config: PipelineConfig,
        detector: Arc<dyn TextDetector>,
    ) -> Result<Self, PipelineError> {
        let rasterizer = Arc::new(PdfiumRasterizer::from_config(&config));
        Self::with_rasterizer(config, rasterizer, detector)
    }

    /// Build a pipeline with an explicit rasteriser.
    pub fn with_rasterizer(
        config: PipelineConfig,
        rasterizer: Arc<dyn Rasterizer>,
        detector: Arc<dyn TextDetector>,
    ) -> Result<Self, PipelineError> {
        let storage = Storage::new(&config.upload_dir, &config.export_dir);
        storage.ensure_dirs()?;
        let aggregator = Aggregator::from_config(&config, rasterizer, detector);

        Ok(Self {
            config,
            storage,
            aggregator,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Store an upload and run the rich-text path on it.
    ///
    /// Unsupported extensions are rejected before anything is stored or sent
    /// to the OCR service.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ConversionOutput, PipelineError> {
        let source = self.storage.save_source(filename, bytes).await?;
        self.run(&source).await
    }

    /// Aggregate the text of a stored source and export it as `.docx`.
    pub async fn run(&self, source: &SourceDocument) -> Result<ConversionOutput, PipelineError> {
        let start = Instant::now();
        let source_filename = source.file_name();
        info!("Converting '{}'", source_filename);

        let (detected_texts, mut stats) = self.aggregator.aggregate_with_stats(source).await?;
        let artifact =
            export::export_rich_text(self.storage.export_dir(), &source_filename, &detected_texts)
                .await?;
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Converted '{}' → '{}' in {}ms",
            source_filename, artifact.filename, stats.total_duration_ms
        );
        Ok(ConversionOutput {
            source_filename,
            detected_texts,
            artifact,
            stats,
        })
    }

    /// Re-run OCR on a stored source and export a fresh overlay-text artifact.
    pub async fn reconvert(&self, stored_name: &str) -> Result<ExportedArtifact, PipelineError> {
        let source = self.storage.open_source(stored_name)?;
        let source_filename = source.file_name();
        info!("Re-running OCR on '{}'", source_filename);

        let text = self.aggregator.aggregate(&source).await?;
        export::export_overlay_text(
            self.storage.upload_dir(),
            &source_filename,
            &text,
            self.config.overlay_naming,
        )
        .await
    }

    /// Path of a previously exported rich-text artifact.
    pub fn artifact_path(&self, filename: &str) -> Result<PathBuf, PipelineError> {
        self.storage.rich_text_artifact(filename)
    }

    /// Raw bytes of a file in the upload directory.
    pub async fn source_bytes(&self, filename: &str) -> Result<Vec<u8>, PipelineError> {
        let path = self.storage.uploaded_file(filename)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::SourceNotFound {
                    filename: filename.to_string(),
                }
            } else {
                PipelineError::StorageFailed { path, source: e }
            }
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}
