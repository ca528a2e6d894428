//! Typed key-value repository over an object-storage backend.
//!
//! [`BlobRepository`] stores application values under string keys in a
//! single container, encoding them through a [`ValueCodec`] and reaching the
//! storage medium only through the [`BlobStore`] capability trait.
//!
//! ```no_run
//! # async fn demo() -> blobkv_repo::RepoResult<()> {
//! use blobkv_repo::{BlobRepository, RepositoryConfig};
//! use serde_json::{json, Value};
//!
//! let repo = BlobRepository::connect(&RepositoryConfig::from_env()?).await?;
//! repo.put("users/alice", &json!({"visits": 3})).await?;
//! let alice: Option<Value> = repo.get("users/alice").await?;
//! let everyone: Vec<Value> = repo.list("users/").await?;
//! # let _ = (alice, everyone);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`config`] -- bootstrap settings read from the environment or TOML
//! - [`provider`] -- provider selection, turning a config into a store
//! - [`repository`] -- the put/get/delete/list operations
//! - [`error`] -- the repository error taxonomy

pub mod config;
pub mod error;
pub mod provider;
pub mod repository;

pub use config::{ConfigError, Provider, RepositoryConfig, Secret};
pub use error::{RepoError, RepoResult};
pub use provider::open_store;
pub use repository::BlobRepository;

// Re-export the collaborating crates' primary types.
pub use blobkv_codec::{CodecError, JsonCodec, ValueCodec};
pub use blobkv_store::{
    BlobStore, EntryKind, FileSystemBlobStore, InMemoryBlobStore, ListOptions, Page, StoreError,
    StoredEntry,
};
