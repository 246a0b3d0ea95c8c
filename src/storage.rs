//! Flat-file storage: uploaded sources and generated artifacts.
//!
//! Two directories, both created when the pipeline starts:
//!
//! * `upload_dir`: stored sources and overlay-text artifacts
//! * `export_dir`: rich-text (`.docx`) artifacts
//!
//! Every name coming from a client, on upload and on lookup, goes through
//! [`sanitize_filename`] first, so no request can reach outside these
//! directories.

use crate::error::PipelineError;
use crate::export::write_atomic;
use crate::output::{SourceDocument, SourceFormat};
use crate::pipeline::input;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap());

/// Reduce a client-supplied name to a safe flat filename.
///
/// Compatibility-decomposes Unicode and drops what is not ASCII, turns path
/// separators and whitespace runs into `_`, strips everything outside
/// `[A-Za-z0-9_.-]`, then trims leading/trailing `.` and `_`. The result may
/// be empty, which callers treat as an invalid name.
///
/// `"../../etc/passwd"` → `"etc_passwd"`, `"My Scan (2).pdf"` → `"My_Scan_2.pdf"`.
pub fn sanitize_filename(name: &str) -> String {
    let ascii: String = name.nfkd().filter(char::is_ascii).collect();
    let spaced = ascii.replace(['/', '\\'], " ");
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    RE_UNSAFE_CHARS
        .replace_all(&joined, "")
        .trim_matches(|c: char| c == '.' || c == '_')
        .to_string()
}

/// The two storage directories.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    export_dir: PathBuf,
}

impl Storage {
    pub fn new(upload_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            export_dir: export_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Create both directories if missing.
    pub fn ensure_dirs(&self) -> Result<(), PipelineError> {
        for dir in [&self.upload_dir, &self.export_dir] {
            std::fs::create_dir_all(dir).map_err(|source| PipelineError::StorageFailed {
                path: dir.clone(),
                source,
            })?;
        }
        debug!(
            "Storage ready: uploads={} exports={}",
            self.upload_dir.display(),
            self.export_dir.display()
        );
        Ok(())
    }

    /// Validate, sanitise and store an upload.
    ///
    /// The extension is checked on the name as sent, before anything is
    /// written; a name that loses its extension to sanitisation is invalid.
    pub async fn save_source(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<SourceDocument, PipelineError> {
        input::route(original_name)?;

        let safe = sanitize_filename(original_name);
        let format = SourceFormat::from_filename(&safe).ok_or_else(|| {
            PipelineError::InvalidFilename {
                filename: original_name.to_string(),
            }
        })?;

        let size = bytes.len();
        let path = write_atomic(self.upload_dir.join(&safe), bytes)
            .await
            .map_err(|e| match e {
                PipelineError::OutputWriteFailed { path, source } => {
                    PipelineError::StorageFailed { path, source }
                }
                other => other,
            })?;

        info!("Stored upload '{}' as '{}' ({} bytes)", original_name, safe, size);
        Ok(SourceDocument::new(path, format))
    }

    /// Look up a stored source by (client-supplied) name.
    pub fn open_source(&self, name: &str) -> Result<SourceDocument, PipelineError> {
        let safe = sanitize_filename(name);
        let not_found = || PipelineError::SourceNotFound {
            filename: name.to_string(),
        };
        if safe.is_empty() {
            return Err(not_found());
        }

        let path = self.upload_dir.join(&safe);
        if !path.is_file() {
            return Err(not_found());
        }
        let format = input::route(&safe)?;
        Ok(SourceDocument::new(path, format))
    }

    /// Path of an existing file in the upload directory.
    pub fn uploaded_file(&self, name: &str) -> Result<PathBuf, PipelineError> {
        existing(&self.upload_dir, name).ok_or_else(|| PipelineError::SourceNotFound {
            filename: name.to_string(),
        })
    }

    /// Path of an existing rich-text artifact.
    pub fn rich_text_artifact(&self, name: &str) -> Result<PathBuf, PipelineError> {
        existing(&self.export_dir, name).ok_or_else(|| PipelineError::ArtifactNotFound {
            filename: name.to_string(),
        })
    }
}

fn existing(dir: &Path, name: &str) -> Option<PathBuf> {
    let safe = sanitize_filename(name);
    if safe.is_empty() {
        return None;
    }
    let path = dir.join(safe);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_matches_flat_name_rules() {
        assert_eq!(sanitize_filename("My Scan (2).pdf"), "My_Scan_2.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("..\\windows\\win.ini"), "windows_win.ini");
        assert_eq!(sanitize_filename("  .hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("café menu.jpg"), "cafe_menu.jpg");
    }

    #[test]
    fn sanitize_can_empty_a_name() {
        assert_eq!(sanitize_filename("日本語"), "");
        assert_eq!(sanitize_filename("..."), "");
    }

    #[tokio::test]
    async fn save_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("up"), dir.path().join("ex"));
        storage.ensure_dirs().unwrap();

        let stored = storage
            .save_source("My Scan.PDF", b"%PDF-1.4".to_vec())
            .await
            .unwrap();
        assert_eq!(stored.file_name(), "My_Scan.PDF");
        assert_eq!(stored.format, SourceFormat::Pdf);

        let opened = storage.open_source("My Scan.PDF").unwrap();
        assert_eq!(opened, stored);
    }

    #[tokio::test]
    async fn gif_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("up"), dir.path().join("ex"));
        storage.ensure_dirs().unwrap();

        let err = storage
            .save_source("anim.gif", b"GIF89a".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
        assert_eq!(std::fs::read_dir(storage.upload_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn name_without_stem_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("up"), dir.path().join("ex"));
        storage.ensure_dirs().unwrap();

        let err = storage.save_source("写真.png", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidFilename { .. }));
    }

    #[test]
    fn lookups_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.docx"), b"x").unwrap();
        let storage = Storage::new(dir.path().join("up"), dir.path().join("ex"));
        storage.ensure_dirs().unwrap();

        assert!(storage.rich_text_artifact("../secret.docx").unwrap_err().is_not_found());
        assert!(storage.uploaded_file("../secret.docx").is_err());
    }

    #[test]
    fn missing_artifact_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("up"), dir.path().join("ex"));
        storage.ensure_dirs().unwrap();

        let err = storage.rich_text_artifact("never.docx").unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactNotFound { .. }));
        let err = storage.open_source("never.pdf").unwrap_err();
        assert!(matches!(err, PipelineError::SourceNotFound { .. }));
    }
}
