//! Template storage: PDF blobs plus ordering/visibility metadata.

mod blob;
mod metadata;
mod preview;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use blob::LocalBlobStore;
pub use metadata::SledTemplateRepository;
pub use preview::PreviewCache;

/// The two template families managed by the admin panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Pages of the proposal body; the first one carries the cover fields
    Content,
    /// Alternative index pages, one of which the user picks
    Index,
}

impl TemplateKind {
    pub const ALL: [Self; 2] = [Self::Content, Self::Index];

    /// Metadata collection holding records of this kind.
    pub const fn collection(self) -> &'static str {
        match self {
            Self::Content => "templates",
            Self::Index => "index_templates",
        }
    }

    /// Blob path prefix for this kind.
    pub const fn storage_prefix(self) -> &'static str {
        match self {
            Self::Content => "pdf_templates",
            Self::Index => "index_templates",
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Index => "index",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Content => "Content templates",
            Self::Index => "Index templates",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "content" => Some(Self::Content),
            "index" => Some(Self::Index),
            _ => None,
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blob path of a template: `{prefix}/{document_type}/template_{order}.pdf`.
pub fn storage_path(kind: TemplateKind, document_type: &str, order: u32) -> String {
    format!("{}/{document_type}/template_{order}.pdf", kind.storage_prefix())
}

/// A stored template record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub kind: TemplateKind,
    pub document_type: String,
    pub storage_path: String,
    pub display_name: String,
    /// Position within its document type, starting at 1
    pub order: u32,
    pub visible: bool,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

/// Admin input for a template upload
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub kind: TemplateKind,
    pub document_type: String,
    pub display_name: String,
    pub order: u32,
    pub uploaded_by: String,
}

/// Byte storage for template PDFs, addressed by relative path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing blob.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn delete(&self, path: &str) -> Result<()>;

    /// Copy the blob at `path` into a local file.
    async fn download_to(&self, path: &str, dest: &Path) -> Result<()> {
        let bytes = self.get(path).await?;
        tokio::fs::write(dest, bytes).await.map_err(|e| Error::StorageTransfer {
            path: path.to_string(),
            reason: format!("Failed to write {}: {e}", dest.display()),
        })
    }
}

/// Metadata records for templates, one collection per kind.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn insert(&self, template: &Template) -> Result<()>;

    /// Records of `kind`, optionally restricted to one document type, in no
    /// particular order.
    async fn list(&self, kind: TemplateKind, document_type: Option<&str>) -> Result<Vec<Template>>;

    async fn get(&self, kind: TemplateKind, id: &str) -> Result<Option<Template>>;

    async fn set_visible(&self, kind: TemplateKind, id: &str, visible: bool) -> Result<()>;

    async fn set_order(&self, kind: TemplateKind, id: &str, order: u32) -> Result<()>;

    async fn delete(&self, kind: TemplateKind, id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_path_layout() {
        assert_eq!(
            storage_path(TemplateKind::Content, "Proposal", 3),
            "pdf_templates/Proposal/template_3.pdf"
        );
        assert_eq!(
            storage_path(TemplateKind::Index, "NDA", 1),
            "index_templates/NDA/template_1.pdf"
        );
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(TemplateKind::Content.collection(), "templates");
        assert_eq!(TemplateKind::Index.collection(), "index_templates");
        for kind in TemplateKind::ALL {
            assert_eq!(TemplateKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TemplateKind::parse("cover"), None);
    }
}
