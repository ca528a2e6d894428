use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::entry::{EntryKind, EntryMetadata, ListOptions, Page, StoredEntry};
use crate::error::{StoreError, StoreResult};
use crate::listing::{fold_key, paginate};
use crate::traits::BlobStore;
use crate::DEFAULT_PAGE_SIZE;

type Containers = HashMap<String, BTreeMap<String, Bytes>>;

/// In-memory, map-based blob store (the `transient` provider).
///
/// Intended for tests and embedding. Containers live behind a `RwLock`;
/// payloads are `Bytes`, so reads are cheap reference-counted clones. Data is
/// lost when the store is dropped.
pub struct InMemoryBlobStore {
    containers: RwLock<Containers>,
    page_size: usize,
}

impl InMemoryBlobStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create a store that returns at most `page_size` entries per page.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            containers: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of leaf entries in `container` (0 if it does not exist).
    pub fn len(&self, container: &str) -> usize {
        self.read_lock()
            .ok()
            .and_then(|map| map.get(container).map(BTreeMap::len))
            .unwrap_or(0)
    }

    /// Returns `true` if `container` holds no entries.
    pub fn is_empty(&self, container: &str) -> bool {
        self.len(container) == 0
    }

    /// Sorted names of all containers.
    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read_lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, Containers>> {
        self.containers
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, Containers>> {
        self.containers
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn provider(&self) -> &'static str {
        "transient"
    }

    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        let mut map = self.write_lock()?;
        map.entry(container.to_string()).or_default();
        Ok(())
    }

    async fn write_entry(&self, container: &str, key: &str, payload: Bytes) -> StoreResult<()> {
        if key.is_empty() {
            return Err(StoreError::invalid_key(key, "key is empty"));
        }
        let mut map = self.write_lock()?;
        let entries = map
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        debug!(container, key, bytes = payload.len(), "memory write");
        entries.insert(key.to_string(), payload);
        Ok(())
    }

    async fn read_entry(&self, container: &str, key: &str) -> StoreResult<Option<StoredEntry>> {
        let map = self.read_lock()?;
        let entries = map
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        Ok(entries
            .get(key)
            .map(|payload| StoredEntry::leaf(key, payload.clone())))
    }

    async fn delete_entry(&self, container: &str, key: &str) -> StoreResult<()> {
        let mut map = self.write_lock()?;
        let entries = map
            .get_mut(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    async fn list_page(&self, container: &str, options: &ListOptions) -> StoreResult<Page> {
        let map = self.read_lock()?;
        let entries = map
            .get(container)
            .ok_or_else(|| StoreError::ContainerNotFound(container.to_string()))?;

        let candidates = entries
            .range(options.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(options.prefix.as_str()))
            .filter_map(|(key, payload)| {
                let (name, kind) = fold_key(key, options)?;
                Some(match kind {
                    EntryKind::Leaf => EntryMetadata::leaf(name, Some(payload.len() as u64)),
                    EntryKind::Directory => EntryMetadata::directory(name),
                })
            });
        let page = paginate(candidates, options, self.page_size);
        debug!(
            container,
            prefix = %options.prefix,
            entries = page.entries.len(),
            more = page.has_more(),
            "memory list page"
        );
        Ok(page)
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("containers", &self.container_names())
            .field("page_size", &self.page_size)
            .finish()
    }
}
