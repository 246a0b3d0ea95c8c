//! Data model shared by the pipeline stages.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Format of an uploaded source, decided from its file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Jpeg,
    Png,
}

impl SourceFormat {
    /// Route a filename to a format by its extension (case-insensitive).
    ///
    /// Returns `None` for anything other than `.pdf`, `.jpg`, `.jpeg`, `.png`.
    pub fn from_filename(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "jpg" | "jpeg" => Some(SourceFormat::Jpeg),
            "png" => Some(SourceFormat::Png),
            _ => None,
        }
    }

    /// The decoder to use for raster sources; `None` for PDF.
    pub fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            SourceFormat::Pdf => None,
            SourceFormat::Jpeg => Some(image::ImageFormat::Jpeg),
            SourceFormat::Png => Some(image::ImageFormat::Png),
        }
    }

    /// MIME type served for the raw source.
    pub fn mime_type(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "application/pdf",
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Jpeg => "jpeg",
            SourceFormat::Png => "png",
        })
    }
}

/// A stored upload. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub path: PathBuf,
    pub format: SourceFormat,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>, format: SourceFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// The stored file name (no directory).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// One rasterised page. `index` is 1-based.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub index: usize,
    pub image: DynamicImage,
}

/// What the OCR service reported for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrResult {
    pub page_index: usize,
    /// `None` when the service found no text.
    pub text: Option<String>,
}

/// Recognised text of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page: usize,
    pub text: String,
}

/// Per-page text in ascending page order. Pages without text are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedText(Vec<PageText>);

impl AggregatedText {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from OCR results, dropping pages without text and ordering by page.
    pub fn from_results(results: impl IntoIterator<Item = OcrResult>) -> Self {
        let mut pages: Vec<PageText> = results
            .into_iter()
            .filter_map(|r| {
                r.text.map(|text| PageText {
                    page: r.page_index,
                    text,
                })
            })
            .collect();
        pages.sort_by_key(|p| p.page);
        Self(pages)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageText> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Page numbers that produced text.
    pub fn pages(&self) -> Vec<usize> {
        self.0.iter().map(|p| p.page).collect()
    }

    pub fn as_slice(&self) -> &[PageText] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a AggregatedText {
    type Item = &'a PageText;
    type IntoIter = std::slice::Iter<'a, PageText>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Kind of a generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// `.docx` document in the export directory.
    RichText,
    /// Plain text in the upload directory.
    OverlayText,
}

/// A generated output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub kind: ArtifactKind,
}

/// Timing and page counts for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages produced by the rasteriser.
    pub total_pages: usize,
    /// Pages the OCR service found text on.
    pub text_pages: usize,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of the upload path: the text shown to the user plus the rich-text artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub source_filename: String,
    pub detected_texts: AggregatedText,
    pub artifact: ExportedArtifact,
    pub stats: ConversionStats,
}
