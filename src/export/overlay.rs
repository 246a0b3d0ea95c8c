//! Overlay-text export: the aggregated text as a flat UTF-8 file.
//!
//! The file lives next to the uploads. By default it keeps the historical
//! name `{base}_text.pdf` for every source format even though the content is
//! plain text; [`OverlayNaming::PlainText`] names it `{base}_text.txt` instead.

use crate::config::OverlayNaming;
use crate::error::PipelineError;
use crate::export::{page_block, write_atomic};
use crate::output::{AggregatedText, ArtifactKind, ExportedArtifact};
use crate::pipeline::input::base_name;
use std::path::Path;
use tracing::info;

/// Filename of the overlay artifact for `source_name`.
pub fn overlay_filename(source_name: &str, naming: OverlayNaming) -> String {
    let base = base_name(source_name);
    let ext = match naming {
        OverlayNaming::PdfSuffix => "pdf",
        OverlayNaming::PlainText => "txt",
    };
    format!("{}_text.{}", base, ext)
}

/// Serialise the text: one block per page followed by a blank line.
pub fn render_overlay(text: &AggregatedText) -> String {
    let mut out = String::new();
    for page in text {
        out.push_str(&page_block(page.page, &page.text));
        out.push('\n');
    }
    out
}

/// Export `text` as an overlay artifact into `upload_dir`.
pub async fn export_overlay_text(
    upload_dir: &Path,
    source_name: &str,
    text: &AggregatedText,
    naming: OverlayNaming,
) -> Result<ExportedArtifact, PipelineError> {
    let filename = overlay_filename(source_name, naming);
    let path = write_atomic(upload_dir.join(&filename), render_overlay(text).into_bytes()).await?;

    info!("Overlay artifact: {} ({} page(s))", path.display(), text.len());
    Ok(ExportedArtifact {
        filename,
        path,
        kind: ArtifactKind::OverlayText,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OcrResult;

    #[test]
    fn pdf_suffix_naming_for_every_source_format() {
        assert_eq!(
            overlay_filename("scan.pdf", OverlayNaming::PdfSuffix),
            "scan_text.pdf"
        );
        assert_eq!(
            overlay_filename("photo.png", OverlayNaming::PdfSuffix),
            "photo_text.pdf"
        );
        assert_eq!(
            overlay_filename("receipt.JPEG", OverlayNaming::PdfSuffix),
            "receipt_text.pdf"
        );
    }

    #[test]
    fn plain_text_naming() {
        assert_eq!(
            overlay_filename("scan.pdf", OverlayNaming::PlainText),
            "scan_text.txt"
        );
    }

    #[test]
    fn blocks_are_separated_by_blank_line() {
        let text = AggregatedText::from_results(vec![
            OcrResult {
                page_index: 1,
                text: Some("alpha".into()),
            },
            OcrResult {
                page_index: 2,
                text: Some("beta\ngamma".into()),
            },
        ]);
        assert_eq!(
            render_overlay(&text),
            "Page 1:\nalpha\n\nPage 2:\nbeta\ngamma\n\n"
        );
    }

    #[test]
    fn empty_text_renders_empty_file() {
        assert_eq!(render_overlay(&AggregatedText::new()), "");
    }

    #[tokio::test]
    async fn export_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let text = AggregatedText::from_results(vec![OcrResult {
            page_index: 1,
            text: Some("hello".into()),
        }]);

        let a = export_overlay_text(dir.path(), "scan.pdf", &text, OverlayNaming::default())
            .await
            .unwrap();
        let first = std::fs::read(&a.path).unwrap();
        let b = export_overlay_text(dir.path(), "scan.pdf", &text, OverlayNaming::default())
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a.kind, ArtifactKind::OverlayText);
        assert_eq!(std::fs::read(&b.path).unwrap(), first);
        assert_eq!(first, b"Page 1:\nhello\n\n");
    }
}
