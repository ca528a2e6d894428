use std::sync::Arc;

use blobkv_store::{BlobStore, FileSystemBlobStore, InMemoryBlobStore};
use tracing::{debug, info};

use crate::config::{ConfigError, Provider, RepositoryConfig};

/// Build the backend selected by `config`.
///
/// The returned handle is the single backend resource a repository owns;
/// clone the `Arc` to share it. Neither bundled provider authenticates, so
/// the credentials are only recorded in the log.
pub fn open_store(config: &RepositoryConfig) -> Result<Arc<dyn BlobStore>, ConfigError> {
    config.validate()?;
    let store: Arc<dyn BlobStore> = match config.provider {
        Provider::Transient => Arc::new(InMemoryBlobStore::with_page_size(config.page_size)),
        Provider::Filesystem => Arc::new(
            FileSystemBlobStore::new(config.basedir.clone()).with_page_size(config.page_size),
        ),
    };
    info!(
        provider = %config.provider,
        identity = %config.identity,
        basedir = %config.basedir.display(),
        "opened blob store"
    );
    debug!(secret_set = !config.secret.is_empty(), "credentials loaded");
    Ok(store)
}
