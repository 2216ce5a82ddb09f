//! Template catalog: the admin and wizard view over blob and metadata storage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::pdf::{PageRenderer, PdfDocument};
use crate::store::{
    BlobStore, LocalBlobStore, NewTemplate, PreviewCache, SledTemplateRepository, Template,
    TemplateKind, TemplateRepository, storage_path,
};
use crate::util::run_blocking;

/// A visible template downloaded into a local directory.
#[derive(Debug, Clone)]
pub struct FetchedTemplate {
    pub template: Template,
    pub path: PathBuf,
}

/// Result of an operation applied to several templates.
///
/// Every item is attempted; failures do not stop the batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: usize,
    pub failures: Vec<(String, Error)>,
}

impl BatchOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, id: &str, result: Result<()>) {
        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                warn!("Template {}: {}", id, e);
                self.failures.push((id.to_string(), e));
            }
        }
    }
}

/// Templates downloaded by [`TemplateCatalog::fetch_ordered`].
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Downloaded templates, in order
    pub fetched: Vec<FetchedTemplate>,
    /// Templates whose blob could not be transferred, in order
    pub failures: Vec<(Template, Error)>,
    failed_before_first: bool,
}

impl FetchOutcome {
    /// The failure that precedes every fetched template, if any.
    ///
    /// For content templates this is the cover page.
    pub fn leading_failure(&self) -> Option<&(Template, Error)> {
        if self.failed_before_first {
            self.failures.first()
        } else {
            None
        }
    }

    fn record(&mut self, template: Template, result: Result<PathBuf>) {
        match result {
            Ok(path) => self.fetched.push(FetchedTemplate { template, path }),
            Err(e) => {
                warn!("Failed to fetch {}: {}", template.storage_path, e);
                if self.fetched.is_empty() && self.failures.is_empty() {
                    self.failed_before_first = true;
                }
                self.failures.push((template, e));
            }
        }
    }
}

/// Template management on top of a [`BlobStore`] and a [`TemplateRepository`].
#[derive(Clone)]
pub struct TemplateCatalog {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn TemplateRepository>,
    previews: PreviewCache,
}

impl TemplateCatalog {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        records: Arc<dyn TemplateRepository>,
        previews: PreviewCache,
    ) -> Self {
        Self {
            blobs,
            records,
            previews,
        }
    }

    /// Open the local blob directory and sled database named by `config`.
    pub fn open(config: &AppConfig) -> Result<Self> {
        let blobs = LocalBlobStore::new(config.storage.blob_root())?;
        let records = SledTemplateRepository::open(config.storage.metadata_path())?;
        Ok(Self::new(
            Arc::new(blobs),
            Arc::new(records),
            PreviewCache::new(config.render.preview_cache_entries),
        ))
    }

    /// Store a new template PDF and its record.
    ///
    /// The blob path is derived from kind, document type and order, so an
    /// upload with the same triple replaces the earlier file.
    pub async fn upload(&self, new: NewTemplate, bytes: Vec<u8>) -> Result<Template> {
        let display_name = new.display_name.trim();
        if display_name.is_empty() {
            return Err(Error::TemplateInvalid("template name is required".to_string()));
        }
        if new.order == 0 {
            return Err(Error::TemplateInvalid("order must be at least 1".to_string()));
        }
        if new.document_type.trim().is_empty() {
            return Err(Error::TemplateInvalid("document type is required".to_string()));
        }

        let probe = bytes.clone();
        let (pages, title) = run_blocking(move || {
            PdfDocument::from_bytes(probe).map(|doc| (doc.page_count(), doc.metadata().title.clone()))
        })
        .await
            .map_err(|e| Error::TemplateInvalid(format!("not a readable PDF: {e}")))?;

        let path = storage_path(new.kind, &new.document_type, new.order);
        self.blobs.put(&path, bytes).await?;

        let template = Template {
            id: Uuid::new_v4().simple().to_string(),
            kind: new.kind,
            document_type: new.document_type,
            storage_path: path,
            display_name: display_name.to_string(),
            order: new.order,
            visible: true,
            uploaded_at: Utc::now(),
            uploaded_by: new.uploaded_by,
        };
        self.records.insert(&template).await?;

        info!(
            "Uploaded {} template {:?} ({} pages, title {:?}) to {}",
            template.kind,
            template.display_name,
            pages,
            title.unwrap_or_default(),
            template.storage_path
        );
        Ok(template)
    }

    /// Records of one kind and document type, by order then upload time.
    pub async fn list(&self, kind: TemplateKind, document_type: &str) -> Result<Vec<Template>> {
        let mut templates = self.records.list(kind, Some(document_type)).await?;
        templates.sort_by(|a, b| {
            a.order
                .cmp(&b.order)
                .then_with(|| a.uploaded_at.cmp(&b.uploaded_at))
        });
        Ok(templates)
    }

    pub async fn get(&self, kind: TemplateKind, id: &str) -> Result<Option<Template>> {
        self.records.get(kind, id).await
    }

    pub async fn set_visibility(&self, kind: TemplateKind, id: &str, visible: bool) -> Result<()> {
        self.records.set_visible(kind, id, visible).await?;
        info!("Template {} visibility set to {}", id, visible);
        Ok(())
    }

    /// Assign orders 1..=N following the sequence of `ids`.
    pub async fn reorder(&self, kind: TemplateKind, ids: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (position, id) in ids.iter().enumerate() {
            let order = u32::try_from(position + 1).unwrap_or(u32::MAX);
            outcome.record(id, self.records.set_order(kind, id, order).await);
        }
        info!("Reordered {} {} template(s)", outcome.succeeded, kind);
        outcome
    }

    /// Remove template records. Blobs stay, since another record may share the path.
    pub async fn delete(&self, kind: TemplateKind, ids: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for id in ids {
            outcome.record(id, self.records.delete(kind, id).await);
        }
        info!("Deleted {} {} template(s)", outcome.succeeded, kind);
        outcome
    }

    /// Download every visible template of a kind into `dest_dir`, sorted by order.
    ///
    /// Records whose blob is missing are skipped with a warning. A failed
    /// transfer is recorded in the outcome and the remaining templates are
    /// still fetched; only listing the records can fail the whole call.
    pub async fn fetch_ordered(
        &self,
        kind: TemplateKind,
        document_type: &str,
        dest_dir: &Path,
    ) -> Result<FetchOutcome> {
        let file_prefix = match kind {
            TemplateKind::Content => "template",
            TemplateKind::Index => "index",
        };

        let mut outcome = FetchOutcome::default();
        for template in self.list(kind, document_type).await? {
            if !template.visible {
                continue;
            }
            match self.blobs.exists(&template.storage_path).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!("File not found in storage: {}", template.storage_path);
                    continue;
                }
                Err(e) => {
                    outcome.record(template, Err(e));
                    continue;
                }
            }

            let path = dest_dir.join(format!(
                "{file_prefix}_order_{}_{}.pdf",
                template.order,
                Uuid::new_v4().simple()
            ));
            let result = self.blobs.download_to(&template.storage_path, &path).await;
            if result.is_ok() {
                debug!("Fetched {} -> {}", template.storage_path, path.display());
            }
            outcome.record(template, result.map(|()| path));
        }

        Ok(outcome)
    }

    /// PNG of a template's first page.
    pub async fn preview(&self, template: &Template, dpi: f32) -> Result<Vec<u8>> {
        let key = PreviewCache::key(template, dpi);
        if let Some(png) = self.previews.get(&key).await {
            debug!("Preview cache hit for {}", template.storage_path);
            return Ok(png);
        }

        let bytes = self.blobs.get(&template.storage_path).await?;
        let label = template.storage_path.clone();
        let png = run_blocking(move || {
            let doc = PdfDocument::from_bytes_labeled(bytes, label.clone())
                .map_err(|e| e.at_path(&label))?;
            if doc.page_count() == 0 {
                return Err(Error::document_access(&label, "document has no pages"));
            }
            PageRenderer::with_dpi(&doc, dpi)
                .render_page_png(0)
                .map_err(|e| e.at_path(&label))
        })
        .await?;

        self.previews.insert(key, png.clone()).await;
        Ok(png)
    }
}

impl std::fmt::Debug for TemplateCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCatalog")
            .field("previews", &self.previews)
            .finish_non_exhaustive()
    }
}
