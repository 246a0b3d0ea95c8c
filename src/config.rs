//! Configuration for the conversion pipeline.
//!
//! Every knob lives in [`PipelineConfig`], built via [`PipelineConfigBuilder`]
//! and handed to [`crate::convert::Pipeline`] at construction. Nothing is read
//! from process-wide state after that, so several pipelines (one per test, for
//! instance) can run side by side with different directories.

use crate::error::PipelineError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a [`crate::convert::Pipeline`].
///
/// # Example
/// ```rust
/// use docscan_ocr::{OverlayNaming, PipelineConfig};
///
/// let config = PipelineConfig::builder()
///     .upload_dir("/tmp/docscan/uploads")
///     .export_dir("/tmp/docscan/word_documents")
///     .dpi(150)
///     .overlay_naming(OverlayNaming::PlainText)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// Directory holding uploaded sources (and overlay-text artifacts). Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory holding rich-text artifacts. Default: `word_documents`.
    pub export_dir: PathBuf,

    /// Rendering DPI for PDF pages. Range: 36–600. Default: 72.
    ///
    /// 72 DPI is the page's native resolution (one pixel per PDF point).
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 10000.
    pub max_rendered_pixels: u32,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Directory containing the pdfium shared library. If None, the system
    /// library search path is used.
    pub pdfium_library_path: Option<PathBuf>,

    /// Per-page OCR call timeout in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Number of OCR calls in flight at once. Default: 1 (strictly sequential).
    ///
    /// Results are always collected in page order, whatever this is set to.
    pub concurrency: usize,

    /// How the overlay-text artifact is named. Default: [`OverlayNaming::PdfSuffix`].
    pub overlay_naming: OverlayNaming,

    /// Optional progress callback; also the cancellation hook.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            export_dir: PathBuf::from("word_documents"),
            dpi: 72,
            max_rendered_pixels: 10_000,
            password: None,
            pdfium_library_path: None,
            ocr_timeout_secs: 60,
            concurrency: 1,
            overlay_naming: OverlayNaming::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("upload_dir", &self.upload_dir)
            .field("export_dir", &self.export_dir)
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_library_path", &self.pdfium_library_path)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("overlay_naming", &self.overlay_naming)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.export_dir = dir.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(36, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_library_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.pdfium_library_path = Some(dir.into());
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn overlay_naming(mut self, naming: OverlayNaming) -> Self {
        self.config.overlay_naming = naming;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.upload_dir.as_os_str().is_empty() || c.export_dir.as_os_str().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "upload and export directories must be set".into(),
            ));
        }
        if c.dpi < 36 || c.dpi > 600 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 36–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(PipelineError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Naming rule for the overlay-text artifact.
///
/// The overlay is always plain UTF-8 text, whatever its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayNaming {
    /// `{name}_text.pdf` whatever the source format (default).
    #[default]
    PdfSuffix,
    /// `{name}_text.txt`.
    PlainText,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_flat_file_layout() {
        let c = PipelineConfig::default();
        assert_eq!(c.upload_dir, PathBuf::from("uploads"));
        assert_eq!(c.export_dir, PathBuf::from("word_documents"));
        assert_eq!(c.dpi, 72);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.ocr_timeout_secs, 60);
        assert_eq!(c.overlay_naming, OverlayNaming::PdfSuffix);
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = PipelineConfig::builder()
            .dpi(10_000)
            .concurrency(0)
            .ocr_timeout_secs(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.ocr_timeout_secs, 1);
    }

    #[test]
    fn empty_directory_is_rejected() {
        let err = PipelineConfig::builder().upload_dir("").build().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let c = PipelineConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn overlay_naming_serde() {
        let json = serde_json::to_string(&OverlayNaming::PlainText).unwrap();
        assert_eq!(json, "\"plain_text\"");
    }
}
