//! Input routing: decide how a source is rasterised before any OCR cost.
//!
//! Routing looks only at the declared format (the file extension). Content
//! sniffing happens later and only for PDFs, where a missing `%PDF` header is
//! reported as [`PipelineError::DocumentCorrupt`] instead of a pdfium crash.

use crate::error::PipelineError;
use crate::output::SourceFormat;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Route an uploaded filename to its declared format.
///
/// Anything outside `.pdf`, `.jpg`, `.jpeg`, `.png` (case-insensitive) is
/// rejected with [`PipelineError::UnsupportedFormat`].
pub fn route(filename: &str) -> Result<SourceFormat, PipelineError> {
    let format = SourceFormat::from_filename(filename).ok_or_else(|| {
        PipelineError::UnsupportedFormat {
            filename: filename.to_string(),
        }
    })?;
    debug!("Routed '{}' → {}", filename, format);
    Ok(format)
}

/// Verify the `%PDF` magic bytes of a stored file.
///
/// A missing file maps to [`PipelineError::SourceNotFound`].
pub fn check_pdf_magic(path: &Path) -> Result<(), PipelineError> {
    let mut f = std::fs::File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::SourceNotFound {
                filename: display_name(path),
            }
        } else {
            PipelineError::DocumentCorrupt {
                path: path.to_path_buf(),
                detail: e.to_string(),
            }
        }
    })?;

    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(PipelineError::DocumentCorrupt {
            path: path.to_path_buf(),
            detail: format!("missing %PDF header (found {:02x?})", magic),
        });
    }
    Ok(())
}

/// Base name of a file: its name without the last extension.
///
/// `scan.final.pdf` → `scan.final`.
pub fn base_name(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((base, _)) if !base.is_empty() => base,
        _ => filename,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn route_accepts_mixed_case() {
        assert_eq!(route("Scan.PDF").unwrap(), SourceFormat::Pdf);
        assert_eq!(route("photo.Jpeg").unwrap(), SourceFormat::Jpeg);
    }

    #[test]
    fn route_rejects_gif() {
        let err = route("anim.gif").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::UnsupportedFormat { ref filename } if filename == "anim.gif"
        ));
    }

    #[test]
    fn base_name_strips_last_extension() {
        assert_eq!(base_name("scan.pdf"), "scan");
        assert_eq!(base_name("scan.final.pdf"), "scan.final");
        assert_eq!(base_name("README"), "README");
    }

    #[test]
    fn magic_check_rejects_non_pdf() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"GIF89a....").unwrap();
        let err = check_pdf_magic(f.path()).unwrap_err();
        assert!(matches!(err, PipelineError::DocumentCorrupt { .. }));
    }

    #[test]
    fn magic_check_accepts_pdf_header() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert!(check_pdf_magic(f.path()).is_ok());
    }

    #[test]
    fn magic_check_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_pdf_magic(&dir.path().join("gone.pdf")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn short_file_is_corrupt() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            check_pdf_magic(f.path()),
            Err(PipelineError::DocumentCorrupt { .. })
        ));
    }
}
