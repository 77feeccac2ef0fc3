//! Naming conventions for containers, record entries, and bag identifiers

use crate::config::LayoutConfig;
use crate::error::{Error, Result};
use std::path::Path;

/// Base name of an archive entry path (`a/b/c.zip` → `c.zip`)
pub fn base_name(entry: &str) -> &str {
    entry.rsplit('/').next().unwrap_or(entry)
}

/// Container name: file name without the archive extension
///
/// Returns `None` when the file does not carry the extension
/// (compared case-insensitively).
pub fn container_name(path: &Path, extension: &str) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let suffix_len = extension.len() + 1;
    if file_name.len() <= suffix_len || !file_name.is_char_boundary(file_name.len() - suffix_len)
    {
        return None;
    }
    let (stem, ext) = file_name.split_at(file_name.len() - suffix_len);
    if ext.starts_with('.') && ext[1..].eq_ignore_ascii_case(extension) {
        Some(stem.to_string())
    } else {
        None
    }
}

/// Whether an archive entry is a record archive under the layout conventions
pub fn is_record_entry(entry: &str, layout: &LayoutConfig) -> bool {
    !entry.ends_with('/')
        && entry.contains(&layout.record_prefix)
        && entry.ends_with(&layout.record_suffix)
}

/// Record name of a record archive entry (`.../islandora_42_foxml_atomzip.zip` → `islandora_42`)
pub fn record_name(entry: &str, record_suffix: &str) -> String {
    let base = base_name(entry);
    base.strip_suffix(record_suffix).unwrap_or(base).to_string()
}

/// Turn `COLLECTION_IDENTIFIER` into the `COLLECTION:IDENTIFIER` bag identifier
///
/// Splits on the last underscore, since collection names may contain
/// underscores themselves.
pub fn bag_identifier(record_name: &str) -> Result<String> {
    match record_name.rsplit_once('_') {
        Some((collection, identifier)) if !collection.is_empty() && !identifier.is_empty() => {
            Ok(format!("{collection}:{identifier}"))
        }
        _ => Err(Error::InvalidRecordName(record_name.to_string())),
    }
}
