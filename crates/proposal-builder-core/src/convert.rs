//! PDF to Word conversion through a headless LibreOffice.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ConvertConfig;
use crate::error::{Error, Result};

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Runs `soffice --convert-to docx` on PDFs.
#[derive(Debug, Clone)]
pub struct DocxConverter {
    soffice_path: PathBuf,
    timeout: Duration,
}

impl DocxConverter {
    pub fn new(soffice_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            soffice_path: soffice_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ConvertConfig) -> Self {
        Self::new(config.soffice_path.clone(), config.timeout())
    }

    /// Convert `pdf` into `out_dir/<stem>.docx` and return the output path.
    pub async fn convert(&self, pdf: &Path, out_dir: &Path) -> Result<PathBuf> {
        let stem = pdf
            .file_stem()
            .ok_or_else(|| Error::Conversion(format!("{} has no file name", pdf.display())))?;
        let output = out_dir.join(stem).with_extension("docx");

        debug!("Converting {} with {}", pdf.display(), self.soffice_path.display());

        let child = Command::new(&self.soffice_path)
            .arg("--headless")
            .arg("--infilter=writer_pdf_import")
            .arg("--convert-to")
            .arg("docx")
            .arg("--outdir")
            .arg(out_dir)
            .arg(pdf)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Conversion(format!("Failed to start {}: {e}", self.soffice_path.display()))
            })?;

        let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::Conversion(format!("Timed out after {}s", self.timeout.as_secs()))
            })?
            .map_err(|e| Error::Conversion(format!("Converter failed: {e}")))?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            return Err(Error::Conversion(format!(
                "Converter exited with {}: {}",
                finished.status,
                stderr.trim()
            )));
        }

        if !tokio::fs::try_exists(&output).await.unwrap_or(false) {
            return Err(Error::Conversion(format!(
                "Converter produced no output at {}",
                output.display()
            )));
        }

        info!("Converted {} -> {}", pdf.display(), output.display());
        Ok(output)
    }
}
