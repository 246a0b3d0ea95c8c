//! Artifact exporters.
//!
//! Both exporters emit the same per-page block, `"Page {index}:\n{text}\n"`,
//! and write their file atomically: the bytes go to a temporary file in the
//! destination directory which is then renamed over the target. Readers see
//! either the previous artifact or the new one, never a truncated file.
//! Re-exporting the same source name overwrites (no versioning).

pub mod docx;
pub mod overlay;

use crate::error::PipelineError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub use docx::export_rich_text;
pub use overlay::export_overlay_text;

/// Label + text of one page, as shared by both artifact kinds.
pub fn page_block(page: usize, text: &str) -> String {
    format!("Page {}:\n{}\n", page, text)
}

/// Write `bytes` to `path` via a temp file in the same directory + rename.
pub async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> Result<PathBuf, PipelineError> {
    tokio::task::spawn_blocking(move || write_atomic_blocking(&path, &bytes).map(|_| path))
        .await
        .map_err(|e| PipelineError::Internal(format!("Write task panicked: {}", e)))?
}

fn write_atomic_blocking(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let fail = |source: std::io::Error| PipelineError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(bytes).map_err(fail)?;
    tmp.as_file().sync_all().map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;

    debug!("Wrote {} bytes → {}", bytes.len(), path.display());
    Ok(())
}
