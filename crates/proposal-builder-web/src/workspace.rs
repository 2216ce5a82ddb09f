//! Per-session scratch directory for fetched templates and generated PDFs.
//!
//! Paths are handed out inside session locks (cheap), the files themselves
//! are written outside them. The directory is removed when the `Workspace`
//! (and thus the session) is dropped.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use uuid::Uuid;

/// Temp directory plus a version counter for the merged proposal.
///
/// The version feeds page-image ETags so previews refresh after a re-merge.
pub struct Workspace {
    /// Temp directory - auto-cleaned on drop
    dir: TempDir,
    merged_version: u64,
}

impl Workspace {
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("proposal-").tempdir()?;
        debug!("Created workspace at {}", dir.path().display());
        Ok(Self {
            dir,
            merged_version: 0,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// A fresh file name, e.g. `cover_filled_<uuid>.pdf`.
    pub fn unique_path(&self, prefix: &str) -> PathBuf {
        self.dir
            .path()
            .join(format!("{prefix}_{}.pdf", Uuid::new_v4().simple()))
    }

    pub fn merged_path(&self) -> PathBuf {
        self.dir.path().join("proposal.pdf")
    }

    /// Register a new merged proposal. Call after the file is written.
    pub fn mark_merged(&mut self) -> u64 {
        self.merged_version += 1;
        debug!("Merged proposal now at v{}", self.merged_version);
        self.merged_version
    }
}
