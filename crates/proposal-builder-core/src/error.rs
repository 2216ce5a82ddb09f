use std::path::Path;

use thiserror::Error;

/// Unified error type for proposal-builder-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - PDF operations (opening, locating text, filling, merging, rendering)
/// - Template storage (blob transfers, metadata records)
/// - Word conversion
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // PDF Errors
    // ==========================================================================
    /// A document on disk could not be opened, read, or addressed
    #[error("cannot access document {path}: {reason}")]
    DocumentAccess { path: String, reason: String },

    /// Failed to open or parse PDF bytes
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to extract text from a PDF page
    #[error("failed to extract text from page {page}: {reason}")]
    PdfTextExtraction { page: usize, reason: String },

    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    /// A merge was requested with no input documents
    #[error("no documents to merge")]
    EmptyInput,

    // ==========================================================================
    // Storage Errors
    // ==========================================================================
    /// Upload or download of a blob failed
    #[error("storage transfer failed for {path}: {reason}")]
    StorageTransfer { path: String, reason: String },

    /// Creating, updating or deleting a metadata record failed
    #[error("failed to write template record {id}: {reason}")]
    MetadataWrite { id: String, reason: String },

    /// Reading metadata records failed
    #[error("failed to read template records: {0}")]
    MetadataRead(String),

    /// The blob store or metadata database could not be opened
    #[error("failed to open template store: {0}")]
    StoreOpen(String),

    /// Template upload rejected before touching storage
    #[error("invalid template: {0}")]
    TemplateInvalid(String),

    // ==========================================================================
    // Conversion Errors
    // ==========================================================================
    /// PDF to word-processor conversion failed
    #[error("document conversion failed: {0}")]
    Conversion(String),

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error categories surfaced to users and callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DocumentAccess,
    EmptyInput,
    StorageTransfer,
    MetadataWrite,
    Conversion,
    Configuration,
    InvalidInput,
    Io,
}

impl Error {
    /// Build a `DocumentAccess` error for a path.
    pub fn document_access(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::DocumentAccess {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    /// Attach a document path to PDF-level errors.
    ///
    /// Open/parse/page errors become `DocumentAccess` naming `path`; other
    /// variants pass through unchanged.
    #[must_use]
    pub fn at_path(self, path: impl AsRef<Path>) -> Self {
        match self {
            Self::PdfOpen(reason) | Self::Lopdf(reason) => Self::document_access(path, reason),
            Self::PdfInvalidPage { .. } | Self::PdfTextExtraction { .. } | Self::PdfRender { .. } => {
                Self::document_access(path, self.to_string())
            }
            other => other,
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::DocumentAccess { .. }
            | Self::PdfOpen(_)
            | Self::PdfInvalidPage { .. }
            | Self::PdfTextExtraction { .. }
            | Self::PdfRender { .. }
            | Self::Lopdf(_) => ErrorKind::DocumentAccess,
            Self::EmptyInput => ErrorKind::EmptyInput,
            Self::StorageTransfer { .. } | Self::StoreOpen(_) => ErrorKind::StorageTransfer,
            Self::MetadataWrite { .. } | Self::MetadataRead(_) => ErrorKind::MetadataWrite,
            Self::Conversion(_) => ErrorKind::Conversion,
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => ErrorKind::Configuration,
            Self::TemplateInvalid(_) => ErrorKind::InvalidInput,
            Self::PdfSave(_) | Self::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_path_wraps_page_errors() {
        let err = Error::PdfInvalidPage { page: 4, total: 2 }.at_path("/tmp/cover.pdf");
        assert_eq!(err.kind(), ErrorKind::DocumentAccess);
        let msg = err.to_string();
        assert!(msg.contains("/tmp/cover.pdf"), "{msg}");
        assert!(msg.contains("invalid page number 4"), "{msg}");
    }

    #[test]
    fn test_at_path_keeps_other_errors() {
        let err = Error::EmptyInput.at_path("/tmp/x.pdf");
        assert!(matches!(err, Error::EmptyInput));
    }
}
