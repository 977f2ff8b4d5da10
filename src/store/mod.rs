//! Durable record of materialized components.
//!
//! The cache remembers, per `(tag_name, identifier)`, whether a component was
//! fetched and written successfully and which sub-dependencies it declared. A
//! later build that finds `success = true` *and* the artifact on disk skips the
//! network entirely and walks the recorded dependencies instead.
//!
//! # Lifecycle
//!
//! 1. [`ComponentCache::load`] reads the cache document once at start-up.
//! 2. Resolution mutates the in-memory map through [`ensure`](ComponentCache::ensure)
//!    and [`record_success`](ComponentCache::record_success). Nothing touches the
//!    disk per entry.
//! 3. [`ComponentCache::flush`] rewrites the document once per transform that
//!    found at least one reference.
//!
//! Entries are never deleted.
//!
//! # Document format
//!
//! ```json
//! {
//!   "Widget": {
//!     "CloudComponentWidgetshop120_1a2b3c4d": {
//!       "success": true,
//!       "deps": [{ "namespace": "button", "version": "2.0.0" }]
//!     }
//!   }
//! }
//! ```
//!
//! # Concurrency
//!
//! The map is a [`DashMap`] behind an `Arc`, so clones of a [`ComponentCache`]
//! share state and concurrent resolution branches can record results without a
//! global lock. Across processes, [`flush`](ComponentCache::flush) holds a
//! [`CacheLock`] and merges with whatever another process wrote in the meantime.

mod lock;

pub use lock::CacheLock;

use crate::component::DependencyDescriptor;
use crate::core::CloudcomError;
use crate::utils::fs::write_if_changed_async;
use anyhow::{Context, Result};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cache key: the owning tag name and the derived identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    /// Tag name the component was referenced under
    pub tag_name: String,
    /// Derived component identifier
    pub identifier: String,
}

impl CacheKey {
    /// Creates a key.
    pub fn new(tag_name: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            identifier: identifier.into(),
        }
    }
}

/// Cached state of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Whether the component was fetched and its artifact written
    #[serde(default)]
    pub success: bool,
    /// Sub-dependencies declared by the fetched payload
    #[serde(default)]
    pub deps: Vec<DependencyDescriptor>,
}

type CacheDocument = BTreeMap<String, BTreeMap<String, CacheEntry>>;

/// Shared handle to the component cache.
#[derive(Debug, Clone)]
pub struct ComponentCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    entries: DashMap<CacheKey, CacheEntry>,
    document: Option<PathBuf>,
}

impl ComponentCache {
    /// Creates a cache that lives only in memory; [`flush`](Self::flush) is a no-op.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: DashMap::new(),
                document: None,
            }),
        }
    }

    /// Loads the cache document at `path`.
    ///
    /// A missing document yields an empty cache. An unreadable or corrupt
    /// document is logged and also yields an empty cache: the worst outcome is
    /// refetching components, never a failed build.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = read_document(&path).await.unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable cache document {}: {e:#}", path.display());
            CacheDocument::new()
        });

        let entries = DashMap::new();
        for (tag_name, components) in document {
            for (identifier, entry) in components {
                entries.insert(CacheKey::new(tag_name.clone(), identifier), entry);
            }
        }

        tracing::debug!("Loaded {} cache entries from {}", entries.len(), path.display());

        Ok(Self {
            inner: Arc::new(CacheInner {
                entries,
                document: Some(path),
            }),
        })
    }

    /// Path of the backing document, if any.
    pub fn document_path(&self) -> Option<&Path> {
        self.inner.document.as_deref()
    }

    /// Returns a copy of the entry for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.inner.entries.get(key).map(|e| e.value().clone())
    }

    /// Creates an unsuccessful entry for `key` unless one exists.
    pub fn ensure(&self, key: &CacheKey) {
        self.inner.entries.entry(key.clone()).or_default();
    }

    /// Marks `key` successful with its declared dependencies.
    pub fn record_success(&self, key: &CacheKey, deps: Vec<DependencyDescriptor>) {
        self.inner.entries.insert(
            key.clone(),
            CacheEntry {
                success: true,
                deps,
            },
        );
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// All entries, sorted by key.
    pub fn entries(&self) -> Vec<(CacheKey, CacheEntry)> {
        let mut entries: Vec<_> =
            self.inner.entries.iter().map(|e| (e.key().clone(), e.value().clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Writes the cache to its document.
    ///
    /// Under the document lock, the current on-disk document is read and merged
    /// with memory: on-disk keys missing from memory are adopted, and an on-disk
    /// `success = true` beats an in-memory `success = false`. The merged result
    /// becomes the new in-memory state too. The document is only rewritten when
    /// its serialized content changes.
    pub async fn flush(&self) -> Result<()> {
        let Some(path) = self.inner.document.clone() else {
            return Ok(());
        };

        let _lock = CacheLock::acquire(&path).await?;

        let on_disk = read_document(&path).await.unwrap_or_else(|e| {
            tracing::warn!("Overwriting unreadable cache document {}: {e:#}", path.display());
            CacheDocument::new()
        });

        for (tag_name, components) in on_disk {
            for (identifier, disk_entry) in components {
                let key = CacheKey::new(tag_name.clone(), identifier);
                let mut slot = self.inner.entries.entry(key).or_default();
                if disk_entry.success && !slot.success {
                    *slot = disk_entry;
                }
            }
        }

        let mut document = CacheDocument::new();
        for entry in &self.inner.entries {
            document
                .entry(entry.key().tag_name.clone())
                .or_default()
                .insert(entry.key().identifier.clone(), entry.value().clone());
        }

        let json = serde_json::to_string_pretty(&document)
            .context("Failed to serialize cache document")?;
        let written = write_if_changed_async(path.clone(), json).await.map_err(|e| {
            CloudcomError::CacheDocumentError {
                path: path.display().to_string(),
                reason: format!("{e:#}"),
            }
        })?;

        if written {
            tracing::debug!("Flushed {} cache entries to {}", self.len(), path.display());
        }

        Ok(())
    }
}

async fn read_document(path: &Path) -> Result<CacheDocument> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) if content.trim().is_empty() => Ok(CacheDocument::new()),
        Ok(content) => serde_json::from_str(&content)
            .with_context(|| format!("Invalid cache document: {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CacheDocument::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(id: &str) -> CacheKey {
        CacheKey::new("Widget", id)
    }

    #[test]
    fn test_ensure_creates_unsuccessful_entry_once() {
        let cache = ComponentCache::in_memory();
        cache.ensure(&key("A"));
        assert_eq!(cache.get(&key("A")), Some(CacheEntry::default()));

        cache.record_success(&key("A"), vec![DependencyDescriptor::new("d", "1")]);
        cache.ensure(&key("A"));
        assert!(cache.get(&key("A")).unwrap().success);
    }

    #[tokio::test]
    async fn test_load_missing_document_is_empty() {
        let temp = TempDir::new().unwrap();
        let cache = ComponentCache::load(temp.path().join("cache.json")).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_load_corrupt_document_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = ComponentCache::load(&path).await.unwrap();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_flush_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(".cloudcom/cache.json");

        let cache = ComponentCache::load(&path).await.unwrap();
        cache.ensure(&key("Failed"));
        cache.record_success(&key("Ok"), vec![DependencyDescriptor::new("dep", "2.0.0")]);
        cache.flush().await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["Widget"]["Ok"]["success"], true);
        assert_eq!(raw["Widget"]["Ok"]["deps"][0]["namespace"], "dep");
        assert_eq!(raw["Widget"]["Failed"]["success"], false);

        let reloaded = ComponentCache::load(&path).await.unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.get(&key("Ok")), cache.get(&key("Ok")));
    }

    #[tokio::test]
    async fn test_flush_merges_with_concurrent_writer() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let first = ComponentCache::load(&path).await.unwrap();
        let second = ComponentCache::load(&path).await.unwrap();

        first.record_success(&key("FromFirst"), vec![]);
        first.flush().await.unwrap();

        second.ensure(&key("FromFirst"));
        second.record_success(&key("FromSecond"), vec![]);
        second.flush().await.unwrap();

        let merged = ComponentCache::load(&path).await.unwrap();
        assert!(merged.get(&key("FromFirst")).unwrap().success);
        assert!(merged.get(&key("FromSecond")).unwrap().success);
        assert!(second.get(&key("FromFirst")).unwrap().success);
    }

    #[tokio::test]
    async fn test_in_memory_flush_is_noop() {
        let cache = ComponentCache::in_memory();
        cache.record_success(&key("A"), vec![]);
        cache.flush().await.unwrap();
        assert!(cache.document_path().is_none());
    }

    #[test]
    fn test_entry_deserializes_lenient_deps() {
        let entry: CacheEntry = serde_json::from_str(
            r#"{"success": true, "deps": [{"namespace": "a", "version": "1", "extra": 3}]}"#,
        )
        .unwrap();
        assert_eq!(entry.deps, vec![DependencyDescriptor::new("a", "1")]);

        let bare: CacheEntry = serde_json::from_str(r#"{"success": false}"#).unwrap();
        assert!(bare.deps.is_empty());
    }
}
