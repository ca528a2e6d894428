use async_trait::async_trait;
use bytes::Bytes;

use crate::entry::{ListOptions, Page, StoredEntry};
use crate::error::StoreResult;

/// Object storage backend.
///
/// All implementations must satisfy these invariants:
/// - `ensure_container` is idempotent.
/// - `write_entry` replaces the whole entry in one step; a failed write
///   leaves the previous entry intact or fully replaced.
/// - `delete_entry` on an absent key succeeds.
/// - `list_page` returns entries in lexicographic name order and resumes
///   strictly after the given cursor.
/// - The store never interprets payloads.
/// - All I/O errors are propagated, never silently ignored.
///
/// Every method is a suspension point; implementations must not hold a
/// blocking lock across an `.await`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short provider name, e.g. `"transient"`.
    fn provider(&self) -> &'static str;

    /// Create the container if it does not exist yet.
    async fn ensure_container(&self, container: &str) -> StoreResult<()>;

    /// Create or overwrite the leaf entry at `key`.
    async fn write_entry(&self, container: &str, key: &str, payload: Bytes) -> StoreResult<()>;

    /// Fetch one entry including its payload.
    ///
    /// Returns `Ok(None)` if nothing is stored at `key`.
    async fn read_entry(&self, container: &str, key: &str) -> StoreResult<Option<StoredEntry>>;

    /// Remove the entry at `key`. Absent keys are a no-op.
    async fn delete_entry(&self, container: &str, key: &str) -> StoreResult<()>;

    /// Fetch one page of entries matching `options`.
    async fn list_page(&self, container: &str, options: &ListOptions) -> StoreResult<Page>;
}
