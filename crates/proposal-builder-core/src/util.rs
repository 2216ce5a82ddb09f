//! Utility functions shared across the crate.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Get the user's data directory following XDG conventions.
///
/// Returns `$XDG_DATA_HOME` if set, otherwise `$HOME/.local/share`.
pub fn data_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/share")))
}

/// Default directory for template blobs and metadata.
pub fn data_path() -> PathBuf {
    data_dir()
        .unwrap_or_else(|| PathBuf::from(".data"))
        .join("proposal-builder")
}

/// Write `bytes` to `path` so that readers see either nothing or the whole file.
///
/// The data goes to a temporary file in the destination directory first and
/// is renamed into place; on any failure no file appears at `path`.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".partial-")
        .suffix(".pdf")
        .tempfile_in(&dir)
        .map_err(|e| Error::PdfSave(format!("Failed to create temp file in {}: {e}", dir.display())))?;

    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| Error::PdfSave(format!("Failed to write {}: {e}", path.display())))?;

    tmp.persist(path)
        .map_err(|e| Error::PdfSave(format!("Failed to move output to {}: {}", path.display(), e.error)))?;

    Ok(())
}

/// Whether `a` and `b` name the same file.
///
/// Existing paths are compared after resolving symlinks and `..`; otherwise
/// the paths are compared as given.
pub fn same_file(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Fail when `output` would overwrite one of the `inputs`.
pub fn ensure_distinct_output<P: AsRef<Path>>(inputs: &[P], output: &Path) -> Result<()> {
    match inputs.iter().find(|input| same_file(input.as_ref(), output)) {
        Some(input) => Err(Error::document_access(
            input.as_ref(),
            format!("output {} would overwrite this input", output.display()),
        )),
        None => Ok(()),
    }
}

/// Run CPU-bound PDF work off the async runtime.
pub async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("blocking task failed: {e}"))))?
}
