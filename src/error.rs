//! Error types for foxml-inliner
//!
//! Errors are grouped by the stage that produces them:
//! - [`ArchiveError`] for container and record archive access
//! - [`InlineError`] for datastream rewriting
//! - top-level [`Error`] variants for configuration, XML, and external tools
//!
//! No error is fatal to a conversion run. The pipeline converts every error
//! into a per-record or per-container outcome plus a log line.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for foxml-inliner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for foxml-inliner
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "workers")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive access error (container or record archive)
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// XML could not be parsed or serialized
    #[error("XML error: {0}")]
    Xml(String),

    /// Managed datastream could not be inlined
    #[error("inline error: {0}")]
    Inline(#[from] InlineError),

    /// External tool execution failed (bag generator, formatter)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// The bag generator finished without reporting a bag path
    #[error("bag generator reported no bag path for {identifier}")]
    BagNotCreated {
        /// The `COLLECTION:IDENTIFIER` pair passed to the generator
        identifier: String,
    },

    /// An external tool did not finish within its time budget
    #[error("{tool} timed out after {elapsed:?}")]
    Timeout {
        /// Name of the tool that timed out
        tool: String,
        /// Time budget that was exceeded
        elapsed: Duration,
    },

    /// Operation not supported (missing binary, disabled tool)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A record name cannot be split into collection and identifier
    #[error("invalid record name {0:?}: expected COLLECTION_IDENTIFIER")]
    InvalidRecordName(String),

    /// Serialization error (configuration files)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Self::Xml(e.to_string())
    }
}

/// Archive-related errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Archive file could not be opened or its directory could not be read
    #[error("failed to open archive {path}: {reason}")]
    OpenFailed {
        /// The archive that could not be opened
        path: PathBuf,
        /// The reason opening failed
        reason: String,
    },

    /// An entry exists but could not be read
    #[error("failed to read entry {entry} from {archive}: {reason}")]
    ReadFailed {
        /// The archive holding the entry
        archive: PathBuf,
        /// The entry path inside the archive
        entry: String,
        /// The reason reading failed
        reason: String,
    },

    /// An expected entry is not present in the archive
    #[error("no entry named {entry} in {archive}")]
    EntryNotFound {
        /// The archive that was searched
        archive: PathBuf,
        /// The entry (or file name) that was looked up
        entry: String,
    },
}

/// Datastream inlining errors
#[derive(Debug, Error)]
pub enum InlineError {
    /// The file a managed datastream points to is not in the record archive
    #[error("payload for datastream {datastream} version {version} not found (ref {reference:?})")]
    MissingPayload {
        /// The datastream ID
        datastream: String,
        /// The datastream version ID
        version: String,
        /// The content location reference, if the version carried one
        reference: Option<String>,
    },

    /// A managed datastream is structurally unusable
    #[error("malformed datastream {datastream}: {reason}")]
    MalformedDatastream {
        /// The datastream ID (or "<unnamed>")
        datastream: String,
        /// What was wrong with it
        reason: String,
    },
}
