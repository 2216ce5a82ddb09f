use std::path::Path;
use std::sync::Arc;

use mupdf::{Document as MuDocument, MetadataName};

use crate::error::{Error, Result};

/// Thread-safe wrapper around a PDF document
pub struct PdfDocument {
    /// The raw PDF bytes (kept for re-opening with lopdf or mupdf)
    bytes: Arc<Vec<u8>>,
    /// Where the bytes came from (file path or a descriptive label)
    source: String,
    /// Cached metadata
    metadata: DocumentMetadata,
    /// Number of pages
    page_count: usize,
}

/// Document metadata
#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
}

impl PdfDocument {
    /// Open a PDF from bytes
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::from_bytes_labeled(bytes, "<memory>")
    }

    /// Open a PDF from bytes, remembering a label for error messages
    pub fn from_bytes_labeled(bytes: impl Into<Vec<u8>>, source: impl Into<String>) -> Result<Self> {
        let bytes = bytes.into();

        // Open document to extract metadata and page count
        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse PDF: {e}")))?;

        let page_count = doc.page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count: {e}")))?;

        // mupdf returns an empty string for absent entries
        let get_meta = |name| -> Option<String> {
            doc.metadata(name).ok().filter(|s| !s.is_empty())
        };

        let metadata = DocumentMetadata {
            title: get_meta(MetadataName::Title),
            author: get_meta(MetadataName::Author),
            creator: get_meta(MetadataName::Creator),
            producer: get_meta(MetadataName::Producer),
        };

        Ok(Self {
            bytes: Arc::new(bytes),
            source: source.into(),
            metadata,
            page_count: usize::try_from(page_count).unwrap_or(0),
        })
    }

    /// Open a PDF from a file path.
    ///
    /// Any failure (missing file, unreadable file, corrupt PDF) is reported
    /// as `DocumentAccess` naming the path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::document_access(path, e.to_string()))?;
        Self::from_bytes_labeled(bytes, path.display().to_string()).map_err(|e| e.at_path(path))
    }

    /// Get document metadata
    pub const fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Open the document for operations (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }
}

impl Clone for PdfDocument {
    /// Clone the document efficiently.
    ///
    /// This is O(1) for the byte buffer - only the `Arc` pointer is cloned.
    fn clone(&self) -> Self {
        Self {
            bytes: Arc::clone(&self.bytes),
            source: self.source.clone(),
            metadata: self.metadata.clone(),
            page_count: self.page_count,
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("source", &self.source)
            .field("page_count", &self.page_count)
            .field("metadata", &self.metadata)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
