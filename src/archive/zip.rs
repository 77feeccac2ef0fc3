use crate::config::LayoutConfig;
use crate::error::{ArchiveError, Error, Result};
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::naming::{base_name, container_name, is_record_entry, record_name};

/// Maximum depth of archives nested inside archives that lookups descend into
const MAX_NESTING_DEPTH: u32 = 3;

/// Upper bound on the buffer reserved from an entry's declared size
const MAX_PREALLOCATION: u64 = 64 << 20;

/// A record archive entry found inside a container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordEntry {
    /// Entry path inside the container
    pub entry: String,
    /// Record name derived from the entry (`COLLECTION_IDENTIFIER`)
    pub name: String,
}

/// A container archive on disk
///
/// Every operation opens its own read-only handle, so a container can be
/// shared between tasks without coordination.
#[derive(Clone, Debug)]
pub struct ContainerArchive {
    path: PathBuf,
    name: String,
}

impl ContainerArchive {
    /// Detect container archives in a directory, sorted by path
    pub fn detect(input_dir: &Path, extension: &str) -> Result<Vec<ContainerArchive>> {
        debug!(?input_dir, "detecting container archives");

        let entries = std::fs::read_dir(input_dir).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to read input directory {}: {}", input_dir.display(), e),
            ))
        })?;

        let mut containers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                continue;
            }
            if let Some(name) = container_name(&path, extension) {
                containers.push(ContainerArchive { path, name });
            }
        }
        containers.sort_by(|a, b| a.path.cmp(&b.path));

        debug!("found {} container archive(s)", containers.len());
        Ok(containers)
    }

    /// Wrap a container path; `None` if it lacks the archive extension
    pub fn from_path(path: impl Into<PathBuf>, extension: &str) -> Option<Self> {
        let path = path.into();
        let name = container_name(&path, extension)?;
        Some(Self { path, name })
    }

    /// Container name (`COLLECTION_IDENTIFIER`)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container path on disk
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<zip::ZipArchive<std::fs::File>> {
        let file = std::fs::File::open(&self.path).map_err(|e| ArchiveError::OpenFailed {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        zip::ZipArchive::new(file).map_err(|e| {
            Error::from(ArchiveError::OpenFailed {
                path: self.path.clone(),
                reason: format!("failed to read ZIP archive: {}", e),
            })
        })
    }

    /// Enumerate record archive entries in archive order
    pub fn record_entries(&self, layout: &LayoutConfig) -> Result<Vec<RecordEntry>> {
        let mut archive = self.open()?;
        let records = entry_listing(&mut archive, &self.path)?
            .into_iter()
            .filter(|(name, is_dir)| !is_dir && is_record_entry(name, layout))
            .map(|(entry, _)| RecordEntry {
                name: record_name(&entry, &layout.record_suffix),
                entry,
            })
            .collect();
        Ok(records)
    }

    /// Read one entry's full contents
    pub fn read_entry(&self, entry: &str) -> Result<Vec<u8>> {
        let mut archive = self.open()?;
        read_named(&mut archive, entry, &self.path)
    }

    /// Locate `file_name` for one of this container's records
    ///
    /// Top-level entries of the container are checked first. Failing that,
    /// only the record's own nested archive is searched, so metadata belonging
    /// to a sibling record is never returned.
    pub fn find_record_file(&self, file_name: &str, record: &RecordEntry) -> Result<Vec<u8>> {
        let mut archive = self.open()?;
        let matches = |entry: &str| base_name(entry) == file_name;

        // At the depth limit only top-level entries are checked.
        if let Some((_, bytes)) =
            find_in_archive(&mut archive, &self.path, &matches, MAX_NESTING_DEPTH)?
        {
            return Ok(bytes);
        }

        let nested = read_named(&mut archive, &record.entry, &self.path)?;
        let label = format!("{}!{}", self.path.display(), record.entry);
        RecordArchive::from_bytes(label, nested)?.find_file_named(file_name)
    }
}

/// A record archive held in memory
pub struct RecordArchive {
    label: PathBuf,
    archive: zip::ZipArchive<Cursor<Vec<u8>>>,
}

impl RecordArchive {
    /// Open an archive from its bytes; `label` identifies it in errors
    pub fn from_bytes(label: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self> {
        let label = label.into();
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ArchiveError::OpenFailed {
            path: label.clone(),
            reason: format!("failed to read ZIP archive: {}", e),
        })?;
        Ok(Self { label, archive })
    }

    /// Read an archive file from disk into memory
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| ArchiveError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Label used in error messages
    pub fn label(&self) -> &Path {
        &self.label
    }

    /// Entry names in archive order (directories included)
    pub fn entry_names(&mut self) -> Result<Vec<String>> {
        Ok(entry_listing(&mut self.archive, &self.label)?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }

    /// Find the first file whose entry path satisfies `matches`
    ///
    /// Top-level entries are checked before archives nested in this one.
    /// Returns the matching entry path and its contents.
    pub fn find_file(&mut self, matches: &dyn Fn(&str) -> bool) -> Result<Option<(String, Vec<u8>)>> {
        find_in_archive(&mut self.archive, &self.label, matches, 0)
    }

    /// Locate a file by base name (see [`RecordArchive::find_file`])
    pub fn find_file_named(&mut self, file_name: &str) -> Result<Vec<u8>> {
        let matches = |entry: &str| base_name(entry) == file_name;
        self.find_file(&matches)?
            .map(|(_, bytes)| bytes)
            .ok_or_else(|| {
                Error::from(ArchiveError::EntryNotFound {
                    archive: self.label.clone(),
                    entry: file_name.to_string(),
                })
            })
    }
}

fn is_nested_archive(entry: &str) -> bool {
    entry
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("zip"))
}

/// `(entry name, is directory)` for every entry, in archive order
fn entry_listing<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    label: &Path,
) -> Result<Vec<(String, bool)>> {
    (0..archive.len())
        .map(|index| {
            archive
                .by_index(index)
                .map(|file| (file.name().to_string(), file.is_dir()))
                .map_err(|e| {
                    Error::from(ArchiveError::ReadFailed {
                        archive: label.to_path_buf(),
                        entry: format!("#{index}"),
                        reason: e.to_string(),
                    })
                })
        })
        .collect()
}

fn read_named<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    entry: &str,
    label: &Path,
) -> Result<Vec<u8>> {
    let mut file = archive.by_name(entry).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => Error::from(ArchiveError::EntryNotFound {
            archive: label.to_path_buf(),
            entry: entry.to_string(),
        }),
        other => Error::from(ArchiveError::ReadFailed {
            archive: label.to_path_buf(),
            entry: entry.to_string(),
            reason: other.to_string(),
        }),
    })?;

    let mut bytes = Vec::with_capacity(file.size().min(MAX_PREALLOCATION) as usize);
    file.read_to_end(&mut bytes).map_err(|e| ArchiveError::ReadFailed {
        archive: label.to_path_buf(),
        entry: entry.to_string(),
        reason: e.to_string(),
    })?;
    Ok(bytes)
}

fn find_in_archive<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    label: &Path,
    matches: &dyn Fn(&str) -> bool,
    depth: u32,
) -> Result<Option<(String, Vec<u8>)>> {
    let listing = entry_listing(archive, label)?;

    for (entry, is_dir) in &listing {
        if !is_dir && matches(entry) {
            let bytes = read_named(archive, entry, label)?;
            return Ok(Some((entry.clone(), bytes)));
        }
    }

    if depth >= MAX_NESTING_DEPTH {
        return Ok(None);
    }

    for (entry, is_dir) in &listing {
        if *is_dir || !is_nested_archive(entry) {
            continue;
        }
        let nested_label = PathBuf::from(format!("{}!{}", label.display(), entry));
        let bytes = read_named(archive, entry, label)?;
        let mut nested = match zip::ZipArchive::new(Cursor::new(bytes)) {
            Ok(nested) => nested,
            Err(e) => {
                warn!(archive = %nested_label.display(), error = %e, "skipping unreadable nested archive");
                continue;
            }
        };
        if let Some((nested_entry, bytes)) =
            find_in_archive(&mut nested, &nested_label, matches, depth + 1)?
        {
            return Ok(Some((format!("{entry}!{nested_entry}"), bytes)));
        }
    }

    Ok(None)
}
