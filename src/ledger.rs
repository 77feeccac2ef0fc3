//! Append-only CSV ledger of conversion outcomes
//!
//! One row per record whose metadata document was written:
//!
//! ```text
//! record_name,output_path,converted
//! islandora_42,/tmp/foxml_…/islandora_42/islandora_42/foxml.xml,true
//! ```
//!
//! Rows are appended under a single lock, each with one write and a flush,
//! so concurrent record tasks never interleave partial lines.

use crate::error::Result;
use crate::types::ConversionOutcome;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Header line written when a ledger is created
pub const LEDGER_HEADER: &str = "record_name,output_path,converted";

/// Handle to a run's ledger file
pub struct Ledger {
    path: PathBuf,
    file: Mutex<File>,
}

impl Ledger {
    /// Create (or truncate) the ledger file and write the header
    pub async fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .await?;
        file.write_all(format!("{LEDGER_HEADER}\n").as_bytes())
            .await?;
        file.flush().await?;

        debug!(path = %path.display(), "ledger created");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Ledger file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row
    pub async fn append(&self, outcome: &ConversionOutcome) -> Result<()> {
        let line = format_row(outcome);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn format_row(outcome: &ConversionOutcome) -> String {
    format!(
        "{},{},{}\n",
        escape_field(&outcome.record_name),
        escape_field(&outcome.output_path.to_string_lossy()),
        outcome.converted
    )
}

/// Quote a CSV field if it contains a separator, quote, or line break
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
