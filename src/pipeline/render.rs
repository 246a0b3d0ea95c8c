//! Rasterisation: turn a stored source into one `DynamicImage` per page.
//!
//! PDFs go through pdfium, which keeps thread-local state and blocks, so
//! the whole document lifetime lives inside `tokio::task::spawn_blocking`.
//! The document and the library bindings are dropped when that closure
//! returns, on success and on every error path.
//!
//! JPEG and PNG sources are a single page and never touch pdfium.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::output::{PageImage, SourceDocument, SourceFormat};
use crate::pipeline::input;
use async_trait::async_trait;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Produces the ordered page images of a source document.
///
/// Implementations must yield indices `1..=N` in ascending order.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, source: &SourceDocument) -> Result<Vec<PageImage>, PipelineError>;
}

/// pdfium-backed rasteriser (images are decoded with the `image` crate).
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    dpi: u32,
    max_pixels: u32,
    password: Option<String>,
    library_path: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            dpi: config.dpi,
            max_pixels: config.max_rendered_pixels,
            password: config.password.clone(),
            library_path: config.pdfium_library_path.clone(),
        }
    }
}

impl Default for PdfiumRasterizer {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[async_trait]
impl Rasterizer for PdfiumRasterizer {
    async fn rasterize(&self, source: &SourceDocument) -> Result<Vec<PageImage>, PipelineError> {
        let path = source.path.clone();
        let format = source.format;
        let this = self.clone();

        let pages = tokio::task::spawn_blocking(move || match format {
            SourceFormat::Pdf => this.render_pdf_blocking(&path),
            SourceFormat::Jpeg | SourceFormat::Png => load_image_blocking(&path, format),
        })
        .await
        .map_err(|e| PipelineError::Internal(format!("Render task panicked: {}", e)))??;

        info!("Rasterised '{}': {} page(s)", source.file_name(), pages.len());
        Ok(pages)
    }
}

impl PdfiumRasterizer {
    fn render_pdf_blocking(&self, path: &Path) -> Result<Vec<PageImage>, PipelineError> {
        input::check_pdf_magic(path)?;

        let pdfium = bind_pdfium(self.library_path.as_deref())?;
        let password = self.password.as_deref();

        let document = pdfium.load_pdf_from_file(path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            let detail = if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    "incorrect password".to_string()
                } else {
                    "document is encrypted; a password is required".to_string()
                }
            } else {
                err_str
            };
            PipelineError::DocumentCorrupt {
                path: path.to_path_buf(),
                detail,
            }
        })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        debug!("PDF loaded: {} pages", total_pages);

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.dpi as f32 / 72.0)
            .set_maximum_width(self.max_pixels as i32)
            .set_maximum_height(self.max_pixels as i32);

        let mut results = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap =
                page.render_with_config(&render_config)
                    .map_err(|e| PipelineError::DocumentCorrupt {
                        path: path.to_path_buf(),
                        detail: format!("page {} failed to render: {:?}", idx + 1, e),
                    })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            results.push(PageImage {
                index: idx + 1,
                image,
            });
        }

        Ok(results)
    }
}

/// Bind to pdfium from `library_dir` when given, else from the system search path.
pub fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, PipelineError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            .or_else(|_| Pdfium::bind_to_system_library()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| PipelineError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn load_image_blocking(path: &Path, format: SourceFormat) -> Result<Vec<PageImage>, PipelineError> {
    let bytes = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::SourceNotFound {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
            }
        } else {
            PipelineError::DocumentCorrupt {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        }
    })?;

    let image = decode_image(&bytes, format).map_err(|detail| PipelineError::DocumentCorrupt {
        path: path.to_path_buf(),
        detail,
    })?;
    debug!("Loaded image → {}x{} px", image.width(), image.height());

    Ok(vec![PageImage { index: 1, image }])
}

/// Decode a raster source with its declared format.
fn decode_image(bytes: &[u8], format: SourceFormat) -> Result<DynamicImage, String> {
    let image_format = format
        .image_format()
        .ok_or_else(|| format!("{} is not a raster format", format))?;
    image::load_from_memory_with_format(bytes, image_format).map_err(|e| e.to_string())
}
