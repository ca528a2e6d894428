use std::sync::Arc;

use blobkv_codec::{JsonCodec, ValueCodec};
use blobkv_store::{BlobStore, ListOptions, StoreError, StoredEntry, DEFAULT_DELIMITER};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::RepositoryConfig;
use crate::error::{RepoError, RepoResult};
use crate::provider::open_store;

/// Typed key-value repository over a single backend container.
///
/// A `BlobRepository` only exists once its container has been created, so
/// every operation can assume the container is there. It holds no mutable
/// state: the backend handle, the container name and the codec are fixed at
/// construction, which makes it safe to share across tasks (wrap it in an
/// `Arc`). Every operation round-trips to the backend; nothing is cached.
pub struct BlobRepository<C = JsonCodec> {
    store: Arc<dyn BlobStore>,
    container: String,
    codec: C,
}

impl BlobRepository<JsonCodec> {
    /// Select and open the configured provider, then create the container.
    pub async fn connect(config: &RepositoryConfig) -> RepoResult<Self> {
        let store = open_store(config)?;
        Self::new(store, config.container.clone()).await
    }

    /// Wrap an already-open backend, creating `container` if absent.
    pub async fn new(store: Arc<dyn BlobStore>, container: impl Into<String>) -> RepoResult<Self> {
        Self::with_codec(store, container, JsonCodec).await
    }
}

impl<C: ValueCodec> BlobRepository<C> {
    /// Like [`BlobRepository::new`] with a custom codec.
    pub async fn with_codec(
        store: Arc<dyn BlobStore>,
        container: impl Into<String>,
        codec: C,
    ) -> RepoResult<Self> {
        let container = container.into();
        store
            .ensure_container(&container)
            .await
            .map_err(|source| RepoError::ContainerInit {
                container: container.clone(),
                source,
            })?;
        info!(provider = store.provider(), container = %container, "container ready");
        Ok(Self {
            store,
            container,
            codec,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// The backend handle, for callers that need raw entry access.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Encode `value` and store it at `key`, replacing any existing entry.
    pub async fn put<T>(&self, key: &str, value: &T) -> RepoResult<()>
    where
        T: Serialize + ?Sized,
    {
        check_key(key)?;
        let payload = self
            .codec
            .encode(value)
            .map_err(|source| RepoError::Encoding {
                key: key.to_string(),
                source,
            })?;
        let bytes = payload.len();
        self.store
            .write_entry(&self.container, key, Bytes::from(payload))
            .await
            .map_err(|source| self.write_error(key, source))?;
        debug!(container = %self.container, key, bytes, "put");
        Ok(())
    }

    /// Fetch and decode the value at `key`.
    ///
    /// Returns `Ok(None)` when nothing is stored there, or when the entry
    /// carries no payload. A payload that does not decode into `T` is an
    /// error, never `None`.
    pub async fn get<T>(&self, key: &str) -> RepoResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        check_key(key)?;
        let entry = self.read(key).await?;
        let value = self.translate(key, entry)?;
        debug!(container = %self.container, key, found = value.is_some(), "get");
        Ok(value)
    }

    /// Whether a leaf with a payload is stored at `key`. Nothing is decoded.
    pub async fn exists(&self, key: &str) -> RepoResult<bool> {
        check_key(key)?;
        let entry = self.read(key).await?;
        Ok(entry.is_some_and(|e| e.is_leaf() && e.payload.is_some()))
    }

    /// Remove the entry at `key`. Removing an absent key succeeds.
    pub async fn delete(&self, key: &str) -> RepoResult<()> {
        check_key(key)?;
        self.store
            .delete_entry(&self.container, key)
            .await
            .map_err(|source| RepoError::BackendDelete {
                container: self.container.clone(),
                key: key.to_string(),
                source,
            })?;
        debug!(container = %self.container, key, "delete");
        Ok(())
    }

    /// Decode every leaf directly under `prefix`.
    ///
    /// `/` delimits hierarchy levels: deeper keys are reported by the
    /// backend as markers and skipped, so only direct children come back.
    /// Pages are fetched one after another following the backend's cursor,
    /// and values keep page-arrival order.
    ///
    /// The call is all-or-nothing. A failed page request, a failed entry
    /// read, or an undecodable payload aborts the listing and no partial
    /// result is returned. A leaf deleted between the page fetch and its
    /// read is skipped, as `get` would report it absent. A backend whose
    /// cursor fails to move strictly forward is reported as a list error
    /// rather than followed forever.
    pub async fn list<T>(&self, prefix: &str) -> RepoResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut values = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let options = ListOptions::new()
                .prefix(prefix)
                .delimiter(DEFAULT_DELIMITER)
                .after(cursor.clone());
            let page = self
                .store
                .list_page(&self.container, &options)
                .await
                .map_err(|source| self.list_error(prefix, source))?;
            pages += 1;

            for meta in page.leaves() {
                let entry = self.read(&meta.name).await?;
                match self.translate(&meta.name, entry)? {
                    Some(value) => values.push(value),
                    None => warn!(
                        container = %self.container,
                        key = %meta.name,
                        "listed entry has no payload; skipping"
                    ),
                }
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => {
                    if let Some(previous) = cursor.as_deref() {
                        if next.as_str() <= previous {
                            return Err(self.list_error(
                                prefix,
                                StoreError::Backend(format!(
                                    "cursor {next:?} does not advance past {previous:?}"
                                )),
                            ));
                        }
                    }
                    cursor = Some(next);
                }
                _ => break,
            }
        }

        debug!(
            container = %self.container,
            prefix,
            pages,
            values = values.len(),
            "list"
        );
        Ok(values)
    }

    async fn read(&self, key: &str) -> RepoResult<Option<StoredEntry>> {
        self.store
            .read_entry(&self.container, key)
            .await
            .map_err(|source| RepoError::BackendRead {
                container: self.container.clone(),
                key: key.to_string(),
                source,
            })
    }

    /// Turn a fetched entry into a value. Markers and payload-less entries
    /// are absent; decode failures propagate.
    fn translate<T: DeserializeOwned>(
        &self,
        key: &str,
        entry: Option<StoredEntry>,
    ) -> RepoResult<Option<T>> {
        let Some(entry) = entry else {
            return Ok(None);
        };
        if !entry.is_leaf() {
            return Ok(None);
        }
        let Some(payload) = entry.payload else {
            return Ok(None);
        };
        self.codec
            .decode(&payload)
            .map(Some)
            .map_err(|source| RepoError::Decoding {
                key: key.to_string(),
                source,
            })
    }

    fn write_error(&self, key: &str, source: StoreError) -> RepoError {
        RepoError::BackendWrite {
            container: self.container.clone(),
            key: key.to_string(),
            source,
        }
    }

    fn list_error(&self, prefix: &str, source: StoreError) -> RepoError {
        RepoError::BackendList {
            container: self.container.clone(),
            prefix: prefix.to_string(),
            source,
        }
    }
}

impl<C> std::fmt::Debug for BlobRepository<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobRepository")
            .field("provider", &self.store.provider())
            .field("container", &self.container)
            .finish()
    }
}

fn check_key(key: &str) -> RepoResult<()> {
    if key.is_empty() {
        return Err(RepoError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use blobkv_store::{FileSystemBlobStore, InMemoryBlobStore, Page, StoreResult};
    use serde::Deserialize;
    use serde_json::{json, Value};

    use crate::config::Provider;

    const C: &str = "bucket";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: i64,
    }

    async fn repo_with_page_size(page_size: usize) -> BlobRepository {
        let store = Arc::new(InMemoryBlobStore::with_page_size(page_size));
        BlobRepository::new(store, C).await.unwrap()
    }

    async fn repo() -> BlobRepository {
        repo_with_page_size(1000).await
    }

    // -----------------------------------------------------------------------
    // Test double: an in-memory store with injectable faults
    // -----------------------------------------------------------------------

    #[derive(Default)]
    struct Faults {
        ensure: bool,
        write: bool,
        read: bool,
        delete: bool,
        /// Fail the list call with this zero-based index.
        list_call: Option<usize>,
        /// Report every leaf without its payload.
        strip_payloads: bool,
        /// Always hand back the same cursor.
        stuck_cursor: bool,
        /// Alternate between two cursors forever.
        cycling_cursor: bool,
    }

    struct FaultyStore {
        inner: InMemoryBlobStore,
        faults: Faults,
        list_calls: AtomicUsize,
        read_calls: AtomicUsize,
    }

    impl FaultyStore {
        fn new(page_size: usize, faults: Faults) -> Self {
            Self {
                inner: InMemoryBlobStore::with_page_size(page_size),
                faults,
                list_calls: AtomicUsize::new(0),
                read_calls: AtomicUsize::new(0),
            }
        }
    }

    fn unavailable() -> StoreError {
        StoreError::Backend("service unavailable".into())
    }

    #[async_trait]
    impl BlobStore for FaultyStore {
        fn provider(&self) -> &'static str {
            "faulty"
        }

        async fn ensure_container(&self, container: &str) -> StoreResult<()> {
            if self.faults.ensure {
                return Err(unavailable());
            }
            self.inner.ensure_container(container).await
        }

        async fn write_entry(&self, container: &str, key: &str, payload: Bytes) -> StoreResult<()> {
            if self.faults.write {
                return Err(unavailable());
            }
            self.inner.write_entry(container, key, payload).await
        }

        async fn read_entry(&self, container: &str, key: &str) -> StoreResult<Option<StoredEntry>> {
            self.read_calls.fetch_add(1, Ordering::SeqCst);
            if self.faults.read {
                return Err(unavailable());
            }
            let entry = self.inner.read_entry(container, key).await?;
            if self.faults.strip_payloads {
                return Ok(entry.map(|mut e| {
                    e.payload = None;
                    e
                }));
            }
            Ok(entry)
        }

        async fn delete_entry(&self, container: &str, key: &str) -> StoreResult<()> {
            if self.faults.delete {
                return Err(unavailable());
            }
            self.inner.delete_entry(container, key).await
        }

        async fn list_page(&self, container: &str, options: &ListOptions) -> StoreResult<Page> {
            let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.faults.list_call == Some(call) {
                return Err(unavailable());
            }
            let mut page = self.inner.list_page(container, options).await?;
            if self.faults.stuck_cursor {
                page.next_cursor = Some("stuck".into());
            }
            if self.faults.cycling_cursor {
                let next = if call % 2 == 0 { "p/b" } else { "p/a" };
                page.next_cursor = Some(next.into());
            }
            Ok(page)
        }
    }

    /// A repository over a `FaultyStore` seeded with `keys` before faults apply.
    async fn faulty_repo(
        page_size: usize,
        keys: &[(&str, Value)],
        faults: Faults,
    ) -> (Arc<FaultyStore>, BlobRepository) {
        let store = Arc::new(FaultyStore::new(page_size, faults));
        store.inner.ensure_container(C).await.unwrap();
        for (key, value) in keys {
            let bytes = serde_json::to_vec(value).unwrap();
            store.inner.write_entry(C, key, Bytes::from(bytes)).await.unwrap();
        }
        let repo = BlobRepository::new(store.clone(), C).await.unwrap();
        (store, repo)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn construction_creates_container() {
        let store = Arc::new(InMemoryBlobStore::new());
        let repo = BlobRepository::new(store.clone(), "fresh").await.unwrap();
        assert_eq!(repo.container(), "fresh");
        assert_eq!(store.container_names(), vec!["fresh".to_string()]);
    }

    #[tokio::test]
    async fn construction_keeps_existing_entries() {
        let store = Arc::new(InMemoryBlobStore::new());
        let first = BlobRepository::new(store.clone(), C).await.unwrap();
        first.put("k", &Counter { n: 1 }).await.unwrap();
        let second = BlobRepository::new(store, C).await.unwrap();
        assert_eq!(second.get::<Counter>("k").await.unwrap(), Some(Counter { n: 1 }));
    }

    #[tokio::test]
    async fn container_init_failure_is_fatal() {
        let store = Arc::new(FaultyStore::new(10, Faults {
            ensure: true,
            ..Default::default()
        }));
        let err = BlobRepository::new(store, C).await.unwrap_err();
        assert!(matches!(err, RepoError::ContainerInit { ref container, .. } if container == C));
    }

    #[tokio::test]
    async fn connect_from_config() {
        let repo = BlobRepository::connect(&RepositoryConfig::default()).await.unwrap();
        assert_eq!(repo.container(), "blobkv");
        assert_eq!(repo.store().provider(), "transient");
    }

    #[tokio::test]
    async fn connect_filesystem_persists_across_repositories() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepositoryConfig {
            provider: Provider::Filesystem,
            basedir: dir.path().to_path_buf(),
            container: "durable".into(),
            ..Default::default()
        };
        let repo = BlobRepository::connect(&config).await.unwrap();
        repo.put("a/x", &json!({"n": 1})).await.unwrap();
        drop(repo);

        let reopened = BlobRepository::connect(&config).await.unwrap();
        let value: Option<Value> = reopened.get("a/x").await.unwrap();
        assert_eq!(value, Some(json!({"n": 1})));
        assert!(dir.path().join("durable").join("a").join("x").is_file());
    }

    #[test]
    fn debug_omits_internals() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let repo = rt.block_on(repo());
        assert_eq!(
            format!("{repo:?}"),
            r#"BlobRepository { provider: "transient", container: "bucket" }"#
        );
    }

    // -----------------------------------------------------------------------
    // put / get / delete
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn get_after_put_returns_value() {
        let repo = repo().await;
        repo.put("k", &Counter { n: 7 }).await.unwrap();
        assert_eq!(repo.get::<Counter>("k").await.unwrap(), Some(Counter { n: 7 }));
    }

    #[tokio::test]
    async fn put_stores_json_payload() {
        let repo = repo().await;
        repo.put("k", &Counter { n: 7 }).await.unwrap();
        let entry = repo.store().read_entry(C, "k").await.unwrap().unwrap();
        assert_eq!(entry.payload.as_deref(), Some(&br#"{"n":7}"#[..]));
    }

    #[tokio::test]
    async fn put_overwrites() {
        let repo = repo().await;
        repo.put("k", &Counter { n: 1 }).await.unwrap();
        repo.put("k", &Counter { n: 2 }).await.unwrap();
        assert_eq!(repo.get::<Counter>("k").await.unwrap(), Some(Counter { n: 2 }));
    }

    #[tokio::test]
    async fn put_twice_is_idempotent() {
        let repo = repo().await;
        let v = json!({"n": 3, "tags": ["a", "b"]});
        repo.put("k", &v).await.unwrap();
        repo.put("k", &v).await.unwrap();
        assert_eq!(repo.get::<Value>("k").await.unwrap(), Some(v));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let repo = repo().await;
        assert_eq!(repo.get::<Counter>("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_delete_get_is_none() {
        let repo = repo().await;
        repo.put("k", &json!({"n": 5})).await.unwrap();
        repo.delete("k").await.unwrap();
        assert_eq!(repo.get::<Value>("k").await.unwrap(), None);
        assert!(!repo.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn delete_missing_succeeds() {
        let repo = repo().await;
        repo.delete("never-written").await.unwrap();
    }

    #[tokio::test]
    async fn exists_tracks_puts() {
        let repo = repo().await;
        assert!(!repo.exists("k").await.unwrap());
        repo.put("k", "value").await.unwrap();
        assert!(repo.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn empty_key_rejected() {
        let repo = repo().await;
        assert!(matches!(
            repo.put("", &1).await.unwrap_err(),
            RepoError::InvalidKey { .. }
        ));
        assert!(matches!(
            repo.get::<Value>("").await.unwrap_err(),
            RepoError::InvalidKey { .. }
        ));
        assert!(matches!(
            repo.delete("").await.unwrap_err(),
            RepoError::InvalidKey { .. }
        ));
    }

    #[tokio::test]
    async fn same_payload_decodes_into_different_types() {
        let repo = repo().await;
        repo.put("k", &Counter { n: 9 }).await.unwrap();
        let typed: Option<Counter> = repo.get("k").await.unwrap();
        let untyped: Option<Value> = repo.get("k").await.unwrap();
        assert_eq!(typed, Some(Counter { n: 9 }));
        assert_eq!(untyped, Some(json!({"n": 9})));
    }

    // -----------------------------------------------------------------------
    // Codec failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unencodable_value_is_encoding_error() {
        let repo = repo().await;
        let mut map = std::collections::HashMap::new();
        map.insert((1, 2), "tuple keys are not JSON");
        let err = repo.put("k", &map).await.unwrap_err();
        assert!(matches!(err, RepoError::Encoding { ref key, .. } if key == "k"));
        // Nothing was written.
        assert!(!repo.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_payload_is_decoding_error() {
        let repo = repo().await;
        repo.store()
            .write_entry(C, "k", Bytes::from_static(b"{not json"))
            .await
            .unwrap();
        let err = repo.get::<Value>("k").await.unwrap_err();
        assert!(matches!(err, RepoError::Decoding { ref key, .. } if key == "k"));
    }

    #[tokio::test]
    async fn shape_mismatch_is_decoding_error() {
        let repo = repo().await;
        repo.put("k", &json!({"n": "not a number"})).await.unwrap();
        let err = repo.get::<Counter>("k").await.unwrap_err();
        assert!(err.is_codec());
    }

    // -----------------------------------------------------------------------
    // Backend failures
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_failure_is_backend_write_error() {
        let (_, repo) = faulty_repo(10, &[], Faults {
            write: true,
            ..Default::default()
        })
        .await;
        let err = repo.put("k", &1).await.unwrap_err();
        assert!(matches!(err, RepoError::BackendWrite { ref key, .. } if key == "k"));
    }

    #[tokio::test]
    async fn read_failure_is_backend_read_error() {
        let (_, repo) = faulty_repo(10, &[], Faults {
            read: true,
            ..Default::default()
        })
        .await;
        let err = repo.get::<Value>("k").await.unwrap_err();
        assert!(matches!(err, RepoError::BackendRead { .. }));
        assert!(repo.exists("k").await.is_err());
    }

    #[tokio::test]
    async fn delete_failure_is_backend_delete_error() {
        let (_, repo) = faulty_repo(10, &[], Faults {
            delete: true,
            ..Default::default()
        })
        .await;
        let err = repo.delete("k").await.unwrap_err();
        assert!(matches!(err, RepoError::BackendDelete { .. }));
    }

    #[tokio::test]
    async fn entry_without_payload_is_absent() {
        let (_, repo) = faulty_repo(10, &[("k", json!(1))], Faults {
            strip_payloads: true,
            ..Default::default()
        })
        .await;
        assert_eq!(repo.get::<Value>("k").await.unwrap(), None);
        assert!(!repo.exists("k").await.unwrap());
        assert!(repo.list::<Value>("").await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn list_scenario_by_prefix() {
        let repo = repo().await;
        repo.put("a/x", &json!({"n": 1})).await.unwrap();
        repo.put("a/y", &json!({"n": 2})).await.unwrap();
        repo.put("b/z", &json!({"n": 3})).await.unwrap();

        let a: Vec<Value> = repo.list("a/").await.unwrap();
        assert_eq!(a, vec![json!({"n": 1}), json!({"n": 2})]);
        let b: Vec<Value> = repo.list("b/").await.unwrap();
        assert_eq!(b, vec![json!({"n": 3})]);
    }

    #[tokio::test]
    async fn list_skips_deeper_levels() {
        let repo = repo().await;
        repo.put("a/x", &Counter { n: 1 }).await.unwrap();
        repo.put("a/sub/deep", &Counter { n: 2 }).await.unwrap();
        repo.put("a/sub/deeper/still", &Counter { n: 3 }).await.unwrap();

        let direct: Vec<Counter> = repo.list("a/").await.unwrap();
        assert_eq!(direct, vec![Counter { n: 1 }]);
        let sub: Vec<Counter> = repo.list("a/sub/").await.unwrap();
        assert_eq!(sub, vec![Counter { n: 2 }]);
        // Root has only markers.
        assert!(repo.list::<Counter>("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_empty_prefix_match() {
        let repo = repo().await;
        repo.put("a/x", &1).await.unwrap();
        assert!(repo.list::<i32>("nothing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_pagination_transparent() {
        let one = repo_with_page_size(1000).await;
        let three = repo_with_page_size(3).await;
        for repo in [&one, &three] {
            for n in 0..8 {
                repo.put(&format!("p/{n}"), &Counter { n }).await.unwrap();
            }
            repo.put("p/nested/skip", &Counter { n: 99 }).await.unwrap();
        }
        let a: Vec<Counter> = one.list("p/").await.unwrap();
        let b: Vec<Counter> = three.list("p/").await.unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn list_follows_every_page() {
        let keys: Vec<(String, Value)> = (0..7).map(|n| (format!("p/{n}"), json!(n))).collect();
        let seeded: Vec<(&str, Value)> = keys.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let (store, repo) = faulty_repo(3, &seeded, Faults::default()).await;

        let values: Vec<i64> = repo.list("p/").await.unwrap();
        assert_eq!(values, vec![0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.read_calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn list_mid_pagination_failure_returns_nothing() {
        let keys: Vec<(String, Value)> = (0..7).map(|n| (format!("p/{n}"), json!(n))).collect();
        let seeded: Vec<(&str, Value)> = keys.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();
        let (_, repo) = faulty_repo(3, &seeded, Faults {
            list_call: Some(1),
            ..Default::default()
        })
        .await;

        let err = repo.list::<i64>("p/").await.unwrap_err();
        assert!(matches!(err, RepoError::BackendList { ref prefix, .. } if prefix == "p/"));
    }

    #[tokio::test]
    async fn list_read_failure_is_backend_read_error() {
        let (_, repo) = faulty_repo(10, &[("p/1", json!(1))], Faults {
            read: true,
            ..Default::default()
        })
        .await;
        let err = repo.list::<i64>("p/").await.unwrap_err();
        assert!(matches!(err, RepoError::BackendRead { ref key, .. } if key == "p/1"));
    }

    #[tokio::test]
    async fn list_decode_failure_propagates() {
        let repo = repo().await;
        repo.put("p/1", &Counter { n: 1 }).await.unwrap();
        repo.store()
            .write_entry(C, "p/2", Bytes::from_static(b"garbage"))
            .await
            .unwrap();
        repo.put("p/3", &Counter { n: 3 }).await.unwrap();

        let err = repo.list::<Counter>("p/").await.unwrap_err();
        assert!(matches!(err, RepoError::Decoding { ref key, .. } if key == "p/2"));
    }

    #[tokio::test]
    async fn list_rejects_stuck_cursor() {
        let (_, repo) = faulty_repo(10, &[("p/1", json!(1))], Faults {
            stuck_cursor: true,
            ..Default::default()
        })
        .await;
        let err = repo.list::<i64>("p/").await.unwrap_err();
        assert!(matches!(err, RepoError::BackendList { .. }));
    }

    #[tokio::test]
    async fn list_rejects_cycling_cursor() {
        let (store, repo) = faulty_repo(10, &[("p/1", json!(1))], Faults {
            cycling_cursor: true,
            ..Default::default()
        })
        .await;
        let err = repo.list::<i64>("p/").await.unwrap_err();
        assert!(matches!(err, RepoError::BackendList { .. }));
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn filesystem_list_matches_single_page_listing() {
        let dir = tempfile::tempdir().unwrap();
        let paged = Arc::new(FileSystemBlobStore::new(dir.path()).with_page_size(2));
        let paged = BlobRepository::new(paged, C).await.unwrap();
        let single = repo_with_page_size(1000).await;

        for repo in [&paged, &single] {
            for n in 0..5 {
                repo.put(&format!("p/{n}"), &Counter { n }).await.unwrap();
            }
            repo.put("p/nested/deep", &Counter { n: 99 }).await.unwrap();
            repo.put("p/nested/deeper/still", &Counter { n: 98 }).await.unwrap();
        }

        let from_disk: Vec<Counter> = paged.list("p/").await.unwrap();
        let from_memory: Vec<Counter> = single.list("p/").await.unwrap();
        assert_eq!(from_disk, from_memory);
        assert_eq!(from_disk.iter().map(|c| c.n).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);

        let nested: Vec<Counter> = paged.list("p/nested/").await.unwrap();
        assert_eq!(nested, vec![Counter { n: 99 }]);
    }

    #[tokio::test]
    async fn list_never_returns_markers() {
        let repo = repo().await;
        repo.put("m/leaf", &json!("leaf")).await.unwrap();
        repo.put("m/dir/child", &json!("child")).await.unwrap();
        let values: Vec<Value> = repo.list("m/").await.unwrap();
        assert_eq!(values, vec![json!("leaf")]);
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_repository() {
        let repo = Arc::new(repo().await);
        let mut handles = Vec::new();
        for n in 0..16i64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let key = format!("c/{n:02}");
                repo.put(&key, &Counter { n }).await?;
                repo.get::<Counter>(&key).await
            }));
        }
        for (n, handle) in handles.into_iter().enumerate() {
            let value = handle.await.unwrap().unwrap();
            assert_eq!(value, Some(Counter { n: n as i64 }));
        }
        let all: Vec<Counter> = repo.list("c/").await.unwrap();
        assert_eq!(all.len(), 16);
    }
}
