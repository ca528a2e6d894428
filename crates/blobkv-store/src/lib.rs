//! Backend capability interface for blobkv.
//!
//! A backend is an object store organised as named containers holding
//! entries addressed by string keys. This crate defines the minimal contract
//! the repository layer needs from such a store, plus two adapters.
//!
//! # Entries
//!
//! - [`StoredEntry`] -- one key with its type tag and optional payload
//! - [`EntryKind`] -- leaf value or hierarchical marker
//! - [`EntryMetadata`] -- listing view of an entry (no payload)
//! - [`Page`] -- one page of a listing plus the continuation cursor
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- map-based store for tests and ephemeral use
//! - [`FileSystemBlobStore`] -- one directory per container on local disk
//!
//! # Design Rules
//!
//! 1. Containers are created idempotently and never deleted by this layer.
//! 2. Writes replace the whole entry; readers never observe a torn payload.
//! 3. Deleting an absent key is a no-op.
//! 4. Listings are lexicographic by name; a cursor is the name of the last
//!    entry returned and the next page starts strictly after it.
//! 5. The store never interprets payloads.

pub mod entry;
pub mod error;
pub mod filesystem;
pub mod listing;
pub mod memory;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use entry::{EntryKind, EntryMetadata, ListOptions, Page, StoredEntry, DEFAULT_DELIMITER};
pub use error::{StoreError, StoreResult};
pub use filesystem::FileSystemBlobStore;
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;

/// Page size used by the bundled backends when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 1000;
