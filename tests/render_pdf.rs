//! PDF rasterisation against a real pdfium library.
//!
//! Skipped (with a message) when pdfium cannot be bound. Point
//! `PDFIUM_LIB_PATH` at the directory holding libpdfium to run them:
//!   PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test render_pdf -- --nocapture
//!
//! Fixtures in `tests/fixtures/`:
//! - `three_pages.pdf`: blank pages 200, 300 and 400 pt wide, 100 pt high
//! - `encrypted.pdf`: one 144×72 pt page, RC4 user password `secret`

use docscan_ocr::pipeline::render::bind_pdfium;
use docscan_ocr::{
    PdfiumRasterizer, PipelineConfig, PipelineError, Rasterizer, SourceDocument, SourceFormat,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

/// Skip this test unless pdfium can be bound; yields the library directory.
macro_rules! skip_unless_pdfium {
    () => {{
        let lib = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
        if let Err(e) = bind_pdfium(lib.as_deref()) {
            println!("SKIP: pdfium not available ({e})");
            println!("      Set PDFIUM_LIB_PATH to the directory containing libpdfium");
            return;
        }
        lib
    }};
}

fn rasterizer(lib: Option<PathBuf>, password: Option<&str>) -> PdfiumRasterizer {
    let mut builder = PipelineConfig::builder();
    if let Some(dir) = lib {
        builder = builder.pdfium_library_path(dir);
    }
    if let Some(pwd) = password {
        builder = builder.password(pwd);
    }
    PdfiumRasterizer::from_config(&builder.build().unwrap())
}

fn pdf(path: PathBuf) -> SourceDocument {
    SourceDocument::new(path, SourceFormat::Pdf)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn three_page_pdf_yields_pages_one_to_three_in_order() {
    let lib = skip_unless_pdfium!();

    let pages = rasterizer(lib, None)
        .rasterize(&pdf(fixture("three_pages.pdf")))
        .await
        .unwrap();

    let indices: Vec<usize> = pages.iter().map(|p| p.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);

    // Rendered at 72 DPI: one pixel per point, so widths follow document order.
    let widths: Vec<u32> = pages.iter().map(|p| p.image.width()).collect();
    assert_eq!(widths, vec![200, 300, 400]);
    assert!(pages.iter().all(|p| p.image.height() == 100));
}

#[tokio::test]
async fn dpi_scales_rendered_pages() {
    let lib = skip_unless_pdfium!();
    let mut builder = PipelineConfig::builder().dpi(144);
    if let Some(dir) = lib {
        builder = builder.pdfium_library_path(dir);
    }
    let rasterizer = PdfiumRasterizer::from_config(&builder.build().unwrap());

    let pages = rasterizer
        .rasterize(&pdf(fixture("three_pages.pdf")))
        .await
        .unwrap();

    assert_eq!(pages[0].image.width(), 400);
    assert_eq!(pages[0].image.height(), 200);
}

#[tokio::test]
async fn corrupt_body_after_pdf_header_is_document_corrupt() {
    let lib = skip_unless_pdfium!();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.pdf");
    std::fs::write(&path, b"%PDF-1.4\n1 0 obj\n<< /Type /Cat").unwrap();

    let err = rasterizer(lib, None).rasterize(&pdf(path)).await.unwrap_err();
    assert!(matches!(err, PipelineError::DocumentCorrupt { .. }), "got {err:?}");
}

#[tokio::test]
async fn encrypted_pdf_without_password_is_document_corrupt() {
    let lib = skip_unless_pdfium!();

    let err = rasterizer(lib, None)
        .rasterize(&pdf(fixture("encrypted.pdf")))
        .await
        .unwrap_err();

    match err {
        PipelineError::DocumentCorrupt { detail, .. } => {
            assert!(detail.contains("password"), "got detail: {detail}")
        }
        other => panic!("expected DocumentCorrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn encrypted_pdf_with_wrong_password_is_document_corrupt() {
    let lib = skip_unless_pdfium!();

    let err = rasterizer(lib, Some("not-the-password"))
        .rasterize(&pdf(fixture("encrypted.pdf")))
        .await
        .unwrap_err();

    match err {
        PipelineError::DocumentCorrupt { detail, .. } => {
            assert_eq!(detail, "incorrect password")
        }
        other => panic!("expected DocumentCorrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn encrypted_pdf_with_password_renders() {
    let lib = skip_unless_pdfium!();

    let pages = rasterizer(lib, Some("secret"))
        .rasterize(&pdf(fixture("encrypted.pdf")))
        .await
        .unwrap();

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].index, 1);
    assert_eq!(pages[0].image.width(), 144);
}
