//! Delimiter folding and cursor pagination shared by the bundled backends.
//!
//! Backends collect candidate entries however suits their medium, then hand
//! them to [`paginate`] so every backend pages identically.

use std::collections::BTreeMap;

use crate::entry::{EntryKind, EntryMetadata, ListOptions, Page};

/// Map a stored key to the entry a listing should report for it.
///
/// Returns `None` when the key does not start with the prefix. When the
/// remainder after the prefix contains the delimiter, the key is folded into
/// a directory marker ending at the first delimiter.
pub fn fold_key(key: &str, options: &ListOptions) -> Option<(String, EntryKind)> {
    let rest = key.strip_prefix(options.prefix.as_str())?;
    if let Some(delimiter) = options.delimiter {
        if let Some(idx) = rest.find(delimiter) {
            let end = options.prefix.len() + idx + delimiter.len_utf8();
            return Some((key[..end].to_string(), EntryKind::Directory));
        }
    }
    Some((key.to_string(), EntryKind::Leaf))
}

/// Sort, dedupe, and cut one page out of `candidates`.
///
/// Entries at or before the cursor are dropped. If entries remain after the
/// page, the name of the last returned entry becomes the next cursor.
pub fn paginate<I>(candidates: I, options: &ListOptions, default_page_size: usize) -> Page
where
    I: IntoIterator<Item = EntryMetadata>,
{
    let limit = options.max_results.unwrap_or(default_page_size).max(1);

    // BTreeMap gives lexicographic order and collapses duplicate markers.
    let mut sorted: BTreeMap<String, EntryMetadata> = BTreeMap::new();
    for entry in candidates {
        if let Some(cursor) = options.cursor.as_deref() {
            if entry.name.as_str() <= cursor {
                continue;
            }
        }
        sorted.entry(entry.name.clone()).or_insert(entry);
    }

    let has_more = sorted.len() > limit;
    let entries: Vec<EntryMetadata> = sorted.into_values().take(limit).collect();
    let next_cursor = if has_more {
        entries.last().map(|e| e.name.clone())
    } else {
        None
    };
    Page {
        entries,
        next_cursor,
    }
}
