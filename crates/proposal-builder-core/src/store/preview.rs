use moka::future::Cache;

use super::Template;

/// In-memory cache of rendered template previews (PNG bytes).
///
/// Entries are keyed by storage path, upload time and DPI, so re-uploading a
/// template under the same path never serves a stale image.
#[derive(Clone)]
pub struct PreviewCache {
    cache: Cache<String, Vec<u8>>,
}

impl PreviewCache {
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    pub fn key(template: &Template, dpi: f32) -> String {
        format!(
            "{}@{}@{dpi}",
            template.storage_path,
            template.uploaded_at.timestamp_micros()
        )
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: String, value: Vec<u8>) {
        self.cache.insert(key, value).await;
    }
}

impl std::fmt::Debug for PreviewCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}
