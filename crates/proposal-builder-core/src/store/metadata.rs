use std::path::Path;

use async_trait::async_trait;
use sled::{Db, Tree};
use tracing::debug;

use crate::error::{Error, Result};
use super::{Template, TemplateKind, TemplateRepository};

/// Template records in a sled database, one tree per template kind.
///
/// Values are JSON-encoded [`Template`]s keyed by id.
pub struct SledTemplateRepository {
    db: Db,
}

impl SledTemplateRepository {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StoreOpen(format!(
                    "Failed to create metadata directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let db = sled::open(path).map_err(|e| {
            let err_str = e.to_string();
            if err_str.contains("WouldBlock") || err_str.contains("lock") {
                Error::StoreOpen(format!(
                    "Metadata database locked at {}\n\n\
                    Another process is using it, or a previous instance crashed.\n\
                    To fix: rm {}/db/LOCK",
                    path.display(),
                    path.display()
                ))
            } else {
                Error::StoreOpen(format!("Failed to open metadata at {}: {}", path.display(), e))
            }
        })?;

        debug!("Opened template metadata at {}", path.display());
        Ok(Self { db })
    }

    /// In-memory database for tests and throwaway runs.
    pub fn temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| Error::StoreOpen(e.to_string()))?;
        Ok(Self { db })
    }

    fn tree(&self, kind: TemplateKind) -> Result<Tree> {
        self.db
            .open_tree(kind.collection())
            .map_err(|e| Error::MetadataRead(format!("Failed to open {}: {e}", kind.collection())))
    }

    fn write(&self, tree: &Tree, template: &Template) -> Result<()> {
        let write_err = |reason: String| Error::MetadataWrite {
            id: template.id.clone(),
            reason,
        };
        let value = serde_json::to_vec(template).map_err(|e| write_err(e.to_string()))?;
        tree.insert(template.id.as_bytes(), value)
            .map_err(|e| write_err(e.to_string()))?;
        // Flush to ensure persistence
        tree.flush().map_err(|e| write_err(format!("Flush failed: {e}")))?;
        Ok(())
    }

    fn read(tree: &Tree, id: &str) -> Result<Option<Template>> {
        let Some(value) = tree.get(id.as_bytes()).map_err(|e| Error::MetadataRead(e.to_string()))? else {
            return Ok(None);
        };
        serde_json::from_slice(&value)
            .map(Some)
            .map_err(|e| Error::MetadataRead(format!("Corrupt record {id}: {e}")))
    }

    fn modify(&self, kind: TemplateKind, id: &str, change: impl FnOnce(&mut Template)) -> Result<()> {
        let tree = self.tree(kind)?;
        let mut template = Self::read(&tree, id)?.ok_or_else(|| Error::MetadataWrite {
            id: id.to_string(),
            reason: "no such template".to_string(),
        })?;
        change(&mut template);
        self.write(&tree, &template)
    }
}

#[async_trait]
impl TemplateRepository for SledTemplateRepository {
    async fn insert(&self, template: &Template) -> Result<()> {
        let tree = self.tree(template.kind)?;
        self.write(&tree, template)
    }

    async fn list(&self, kind: TemplateKind, document_type: Option<&str>) -> Result<Vec<Template>> {
        let tree = self.tree(kind)?;
        let mut templates = Vec::new();
        for entry in tree.iter() {
            let (key, value) = entry.map_err(|e| Error::MetadataRead(e.to_string()))?;
            let template: Template = serde_json::from_slice(&value).map_err(|e| {
                Error::MetadataRead(format!("Corrupt record {}: {e}", String::from_utf8_lossy(&key)))
            })?;
            if document_type.is_none_or(|t| t == template.document_type) {
                templates.push(template);
            }
        }
        Ok(templates)
    }

    async fn get(&self, kind: TemplateKind, id: &str) -> Result<Option<Template>> {
        Self::read(&self.tree(kind)?, id)
    }

    async fn set_visible(&self, kind: TemplateKind, id: &str, visible: bool) -> Result<()> {
        self.modify(kind, id, |t| t.visible = visible)
    }

    async fn set_order(&self, kind: TemplateKind, id: &str, order: u32) -> Result<()> {
        self.modify(kind, id, |t| t.order = order)
    }

    async fn delete(&self, kind: TemplateKind, id: &str) -> Result<()> {
        let tree = self.tree(kind)?;
        let write_err = |reason: String| Error::MetadataWrite {
            id: id.to_string(),
            reason,
        };
        let removed = tree.remove(id.as_bytes()).map_err(|e| write_err(e.to_string()))?;
        if removed.is_none() {
            return Err(write_err("no such template".to_string()));
        }
        tree.flush().map_err(|e| write_err(format!("Flush failed: {e}")))?;
        Ok(())
    }
}
