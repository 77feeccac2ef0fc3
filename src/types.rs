//! Core types and events for foxml-inliner

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One ledger row: the result of processing a single record archive
///
/// Exactly one of these is produced for every record whose metadata document
/// was acquired, whether or not the conversion succeeded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Record name (`COLLECTION_IDENTIFIER`)
    pub record_name: String,
    /// Where the record's metadata document was written
    pub output_path: PathBuf,
    /// Whether the written document is the converted one (false = original bytes)
    pub converted: bool,
}

/// What happened to one dispatched record archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Converted document written, ledger row appended
    Converted(ConversionOutcome),
    /// Original document written, ledger row appended with `converted = false`
    FellBack {
        /// The ledger row that was appended
        outcome: ConversionOutcome,
        /// Why conversion failed
        reason: String,
    },
    /// No document could be acquired; nothing written, no ledger row
    Dropped {
        /// Record name
        record_name: String,
        /// Why acquisition failed
        reason: String,
    },
}

impl RecordOutcome {
    /// Record name regardless of outcome
    pub fn record_name(&self) -> &str {
        match self {
            Self::Converted(outcome) | Self::FellBack { outcome, .. } => &outcome.record_name,
            Self::Dropped { record_name, .. } => record_name,
        }
    }

    /// The ledger row, if one was appended
    pub fn ledger_row(&self) -> Option<&ConversionOutcome> {
        match self {
            Self::Converted(outcome) | Self::FellBack { outcome, .. } => Some(outcome),
            Self::Dropped { .. } => None,
        }
    }
}

/// Result of dispatching one container archive
#[derive(Clone, Debug, Default)]
pub struct ContainerReport {
    /// Container name
    pub container: String,
    /// One entry per record archive found in the container
    pub records: Vec<RecordOutcome>,
}

/// Totals for a finished run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run output directory
    pub output_dir: PathBuf,
    /// Ledger file path
    pub ledger_path: PathBuf,
    /// Containers whose records were enumerated
    pub containers_processed: usize,
    /// Containers that could not be opened or enumerated
    pub containers_failed: usize,
    /// Records written in converted form
    pub converted: usize,
    /// Records written with their original bytes
    pub fell_back: usize,
    /// Records with no output and no ledger row
    pub dropped: usize,
}

impl RunSummary {
    /// Fold one container's report into the totals
    pub fn record_container(&mut self, report: &ContainerReport) {
        self.containers_processed += 1;
        for record in &report.records {
            match record {
                RecordOutcome::Converted(_) => self.converted += 1,
                RecordOutcome::FellBack { .. } => self.fell_back += 1,
                RecordOutcome::Dropped { .. } => self.dropped += 1,
            }
        }
    }

    /// Number of ledger rows written during the run
    pub fn ledger_rows(&self) -> usize {
        self.converted + self.fell_back
    }
}

/// Progress events emitted during a run
///
/// Events are informational only. A run behaves the same whether or not
/// anyone is subscribed.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Containers enumerated, ledger initialized
    RunStarted {
        /// Number of containers found
        containers: usize,
        /// Run output directory
        output_dir: PathBuf,
    },

    /// A container is about to be enumerated
    ContainerStarted {
        /// Container name
        container: String,
    },

    /// A record finished processing
    RecordFinished {
        /// Container name
        container: String,
        /// Record name
        record: String,
        /// Converted (true), fell back (false), or dropped (None)
        converted: Option<bool>,
    },

    /// A container could not be opened or enumerated
    ContainerFailed {
        /// Container name
        container: String,
        /// Error message
        error: String,
    },

    /// A container finished, successfully or not
    ContainerFinished {
        /// Container name
        container: String,
        /// Containers finished so far
        completed: usize,
        /// Total number of containers in the run
        total: usize,
    },

    /// All containers finished
    RunFinished {
        /// Run totals
        summary: RunSummary,
    },
}
