use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Hierarchy delimiter used when none is given explicitly.
pub const DEFAULT_DELIMITER: char = '/';

/// Type tag of a stored entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A key holding an actual payload.
    Leaf,
    /// A hierarchical marker (a common prefix ending in the delimiter).
    Directory,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Leaf => write!(f, "leaf"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// One entry as returned by `read_entry`.
///
/// Only leaves carry a payload. A backend may still report a leaf with no
/// payload (e.g. an object whose body could not be opened); callers treat
/// that as absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub name: String,
    pub kind: EntryKind,
    pub payload: Option<Bytes>,
}

impl StoredEntry {
    /// A leaf entry carrying `payload`.
    pub fn leaf(name: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Leaf,
            payload: Some(payload.into()),
        }
    }

    /// A hierarchical marker. Markers never carry a payload.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            payload: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == EntryKind::Leaf
    }

    /// Payload size in bytes, if there is a payload.
    pub fn size(&self) -> Option<u64> {
        self.payload.as_ref().map(|p| p.len() as u64)
    }
}

/// Listing view of an entry: name and type tag, no payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    pub kind: EntryKind,
    /// Payload size for leaves when the backend knows it cheaply.
    pub size: Option<u64>,
}

impl EntryMetadata {
    pub fn leaf(name: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Leaf,
            size,
        }
    }

    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.kind == EntryKind::Leaf
    }
}

/// Parameters of a single `list_page` call.
///
/// Built fluently:
///
/// ```
/// use blobkv_store::ListOptions;
///
/// let opts = ListOptions::new()
///     .prefix("users/")
///     .delimiter('/')
///     .after(Some("users/alice".to_string()));
/// assert_eq!(opts.prefix, "users/");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only names starting with this prefix are returned.
    pub prefix: String,
    /// Hierarchy delimiter. `None` lists recursively (leaves only).
    pub delimiter: Option<char>,
    /// Resume strictly after this name.
    pub cursor: Option<String>,
    /// Upper bound on entries per page. The backend may return fewer.
    pub max_results: Option<usize>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn recursive(mut self) -> Self {
        self.delimiter = None;
        self
    }

    /// Resume after `cursor`. `None` and the empty string both mean "from the start".
    pub fn after(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor.filter(|c| !c.is_empty());
        self
    }

    pub fn max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }
}

/// One page of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub entries: Vec<EntryMetadata>,
    /// Cursor for the next page. `None` marks the end of the listing.
    pub next_cursor: Option<String>,
}

impl Page {
    /// Whether another page follows. An empty cursor counts as the end.
    pub fn has_more(&self) -> bool {
        self.next_cursor.as_deref().is_some_and(|c| !c.is_empty())
    }

    /// Iterate over the leaf entries only.
    pub fn leaves(&self) -> impl Iterator<Item = &EntryMetadata> {
        self.entries.iter().filter(|e| e.is_leaf())
    }
}
