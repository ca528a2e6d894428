//! Local-disk blob store (the `filesystem` provider).
//!
//! Layout under the base directory:
//!
//! ```text
//! <basedir>/
//!   .staging/            in-flight writes, renamed into place when complete
//!   <container>/
//!     a/x                key "a/x"
//!     a/y                key "a/y"
//! ```
//!
//! Key segments map to path components, so a directory surfaces in listings
//! as a hierarchical marker and a file as a leaf.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entry::{EntryKind, EntryMetadata, ListOptions, Page, StoredEntry, DEFAULT_DELIMITER};
use crate::error::{StoreError, StoreResult};
use crate::listing::{fold_key, paginate};
use crate::traits::BlobStore;
use crate::DEFAULT_PAGE_SIZE;

const STAGING_DIR: &str = ".staging";

/// Rename attempts before a write gives up on a parent directory that keeps
/// disappearing under it.
const RENAME_ATTEMPTS: usize = 4;

/// Blob store keeping one directory per container on local disk.
#[derive(Debug, Clone)]
pub struct FileSystemBlobStore {
    root: PathBuf,
    page_size: usize,
    /// Shared while directories are created or walked, exclusive while empty
    /// ones are pruned. Clones share it.
    layout: Arc<RwLock<()>>,
}

impl FileSystemBlobStore {
    /// Create a store rooted at `root`. Nothing is touched on disk until
    /// `ensure_container` is called.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            layout: Arc::new(RwLock::new(())),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn container_dir(&self, container: &str) -> StoreResult<PathBuf> {
        let invalid = |reason: &str| StoreError::InvalidContainer {
            name: container.to_string(),
            reason: reason.to_string(),
        };
        if container.is_empty() {
            return Err(invalid("name is empty"));
        }
        if container.starts_with('.') {
            return Err(invalid("name must not start with '.'"));
        }
        if container.contains(|c| c == '/' || c == '\\') {
            return Err(invalid("name must be a single path segment"));
        }
        Ok(self.root.join(container))
    }

    /// Resolve the container directory, failing if it was never created.
    async fn existing_container(&self, container: &str) -> StoreResult<PathBuf> {
        let dir = self.container_dir(container)?;
        match fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(StoreError::ContainerNotFound(container.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::ContainerNotFound(container.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Move a staged file to `path`, recreating parents that a delete in
    /// another process may have pruned in between.
    async fn place(&self, temp: &Path, path: &Path) -> std::io::Result<()> {
        let _layout = self.layout.read().await;
        let mut attempt = 1;
        loop {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await?;
            }
            match fs::rename(temp, path).await {
                Err(e) if e.kind() == ErrorKind::NotFound && attempt < RENAME_ATTEMPTS => {
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Map a key onto a path below `dir`, rejecting anything that could escape it.
fn key_path(dir: &Path, key: &str) -> StoreResult<PathBuf> {
    if key.is_empty() {
        return Err(StoreError::invalid_key(key, "key is empty"));
    }
    let mut path = dir.to_path_buf();
    for segment in key.split(DEFAULT_DELIMITER) {
        match segment {
            "" => return Err(StoreError::invalid_key(key, "empty path segment")),
            "." | ".." => return Err(StoreError::invalid_key(key, "relative path segment")),
            s if s.contains('\\') => {
                return Err(StoreError::invalid_key(key, "backslash in path segment"))
            }
            s => path.push(s),
        }
    }
    Ok(path)
}

/// Whether some ancestor of `path` below `dir` is a regular file, i.e. the
/// key lives "inside" an existing leaf and therefore cannot exist.
async fn shadowed_by_file(dir: &Path, path: &Path) -> bool {
    for ancestor in path.ancestors().skip(1) {
        if ancestor == dir || !ancestor.starts_with(dir) {
            break;
        }
        if let Ok(meta) = fs::metadata(ancestor).await {
            if meta.is_file() {
                return true;
            }
        }
    }
    false
}

/// Directory to start a listing walk from: the part of the prefix up to and
/// including its last delimiter.
fn walk_base(prefix: &str) -> &str {
    match prefix.rfind(DEFAULT_DELIMITER) {
        Some(idx) => &prefix[..=idx],
        None => "",
    }
}

#[async_trait]
impl BlobStore for FileSystemBlobStore {
    fn provider(&self) -> &'static str {
        "filesystem"
    }

    async fn ensure_container(&self, container: &str) -> StoreResult<()> {
        let dir = self.container_dir(container)?;
        fs::create_dir_all(&dir).await?;
        fs::create_dir_all(self.staging_dir()).await?;
        debug!(container, dir = %dir.display(), "filesystem container ready");
        Ok(())
    }

    async fn write_entry(&self, container: &str, key: &str, payload: Bytes) -> StoreResult<()> {
        let dir = self.existing_container(container).await?;
        let path = key_path(&dir, key)?;
        if let Ok(meta) = fs::metadata(&path).await {
            if meta.is_dir() {
                return Err(StoreError::invalid_key(key, "a directory exists at this key"));
            }
        }

        // Write the full payload aside, then swap it in with a single rename.
        let staging = self.staging_dir();
        fs::create_dir_all(&staging).await?;
        let temp = staging.join(Uuid::now_v7().to_string());
        let staged = match fs::write(&temp, &payload).await {
            Ok(()) => self.place(&temp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        debug!(container, key, bytes = payload.len(), "filesystem write");
        Ok(())
    }

    async fn read_entry(&self, container: &str, key: &str) -> StoreResult<Option<StoredEntry>> {
        let dir = self.existing_container(container).await?;
        let path = key_path(&dir, key)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                if shadowed_by_file(&dir, &path).await {
                    return Ok(None);
                }
                return Err(e.into());
            }
        };
        if meta.is_dir() {
            return Ok(Some(StoredEntry::directory(format!("{key}{DEFAULT_DELIMITER}"))));
        }
        match fs::read(&path).await {
            Ok(data) => Ok(Some(StoredEntry::leaf(key, data))),
            // Deleted between the metadata call and the read.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_entry(&self, container: &str, key: &str) -> StoreResult<()> {
        let dir = self.existing_container(container).await?;
        let path = key_path(&dir, key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => return Ok(()),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                if shadowed_by_file(&dir, &path).await {
                    return Ok(());
                }
                return Err(e.into());
            }
        }
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        // Prune directories left empty so they stop showing up as markers.
        let _layout = self.layout.write().await;
        let mut current = path.parent().map(Path::to_path_buf);
        while let Some(parent) = current {
            if parent == dir || fs::remove_dir(&parent).await.is_err() {
                break;
            }
            current = parent.parent().map(Path::to_path_buf);
        }
        debug!(container, key, "filesystem delete");
        Ok(())
    }

    async fn list_page(&self, container: &str, options: &ListOptions) -> StoreResult<Page> {
        let dir = self.existing_container(container).await?;
        let base = walk_base(&options.prefix);
        let start = if base.is_empty() {
            dir.clone()
        } else {
            match key_path(&dir, &base[..base.len() - 1]) {
                Ok(path) => path,
                // A prefix no key can have.
                Err(_) => return Ok(Page::default()),
            }
        };

        let shallow = options.delimiter == Some(DEFAULT_DELIMITER);
        let _layout = self.layout.read().await;
        let mut candidates = Vec::new();
        let mut stack = vec![(start, base.to_string())];
        while let Some((abs, rel)) = stack.pop() {
            match fs::metadata(&abs).await {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => continue,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    if shadowed_by_file(&dir, &abs).await {
                        continue;
                    }
                    return Err(e.into());
                }
            }
            let mut reader = match fs::read_dir(&abs).await {
                Ok(reader) => reader,
                // Pruned by another process since the metadata call.
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(item) = reader.next_entry().await? {
                let Some(name) = item.file_name().to_str().map(str::to_string) else {
                    warn!(path = %item.path().display(), "skipping non UTF-8 file name");
                    continue;
                };
                let name = format!("{rel}{name}");
                let file_type = match item.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => return Err(e.into()),
                };
                if file_type.is_dir() {
                    let marker = format!("{name}{DEFAULT_DELIMITER}");
                    if shallow {
                        if marker.starts_with(options.prefix.as_str()) {
                            candidates.push(EntryMetadata::directory(marker));
                        }
                    } else if marker.starts_with(options.prefix.as_str())
                        || options.prefix.starts_with(marker.as_str())
                    {
                        stack.push((item.path(), marker));
                    }
                } else if let Some((folded, kind)) = fold_key(&name, options) {
                    candidates.push(match kind {
                        EntryKind::Leaf => {
                            let size = item.metadata().await.ok().map(|m| m.len());
                            EntryMetadata::leaf(folded, size)
                        }
                        EntryKind::Directory => EntryMetadata::directory(folded),
                    });
                }
            }
        }

        let page = paginate(candidates, options, self.page_size);
        debug!(
            container,
            prefix = %options.prefix,
            entries = page.entries.len(),
            more = page.has_more(),
            "filesystem list page"
        );
        Ok(page)
    }
}
