use blobkv_codec::CodecError;
use blobkv_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by [`BlobRepository`](crate::BlobRepository) operations.
///
/// Nothing is retried or swallowed inside the repository: every variant
/// means the operation did not complete. After a failed `put` the previous
/// value's status is unknown until re-read.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The key cannot address an entry.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// The value could not be serialized.
    #[error("failed to encode value for {key:?}: {source}")]
    Encoding {
        key: String,
        #[source]
        source: CodecError,
    },

    /// A stored payload could not be deserialized into the requested type.
    #[error("failed to decode value at {key:?}: {source}")]
    Decoding {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to write {key:?} in {container:?}: {source}")]
    BackendWrite {
        container: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read {key:?} in {container:?}: {source}")]
    BackendRead {
        container: String,
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to delete {key:?} in {container:?}: {source}")]
    BackendDelete {
        container: String,
        key: String,
        #[source]
        source: StoreError,
    },

    /// A page request failed; the whole listing is abandoned.
    #[error("failed to list {prefix:?} in {container:?}: {source}")]
    BackendList {
        container: String,
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// The container could not be created at construction time. Fatal.
    #[error("failed to initialize container {container:?}: {source}")]
    ContainerInit {
        container: String,
        #[source]
        source: StoreError,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RepoError {
    /// Returns `true` if the failure came from the storage backend.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Self::BackendWrite { .. }
                | Self::BackendRead { .. }
                | Self::BackendDelete { .. }
                | Self::BackendList { .. }
                | Self::ContainerInit { .. }
        )
    }

    /// Returns `true` if the failure came from the codec.
    pub fn is_codec(&self) -> bool {
        matches!(self, Self::Encoding { .. } | Self::Decoding { .. })
    }
}

pub type RepoResult<T> = Result<T, RepoError>;
