/// Errors from backend store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The container has not been created.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// The container name cannot be used by this backend.
    #[error("invalid container name {name:?}: {reason}")]
    InvalidContainer { name: String, reason: String },

    /// The key cannot be stored by this backend.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure (connectivity, poisoned state, ...).
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn invalid_key(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
