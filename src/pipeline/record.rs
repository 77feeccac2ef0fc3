//! Per-record processing: convert, or fall back to the original bytes

use super::acquire::{DocumentSource, acquire_document};
use super::{PipelineContext, run_blocking};
use crate::archive::{ContainerArchive, RecordArchive, RecordEntry};
use crate::document::MetadataDocument;
use crate::error::Result;
use crate::inline::inline_managed_datastreams;
use crate::types::{ConversionOutcome, Event, RecordOutcome};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Process one record archive into exactly one outcome
///
/// Records whose document cannot be acquired are dropped. Every other
/// record ends with an output file and a ledger row, converted or not.
pub(crate) async fn process_record(
    ctx: &PipelineContext,
    container: &ContainerArchive,
    record: &RecordEntry,
    container_dir: &Path,
) -> RecordOutcome {
    let outcome = match acquire_document(ctx, container, record).await {
        Ok(acquired) => {
            match &acquired.source {
                DocumentSource::Container => {
                    debug!(record = %record.name, "document read from container")
                }
                DocumentSource::Bag(bag) => {
                    debug!(record = %record.name, bag = %bag.display(), "document read from bag")
                }
            }
            convert_or_fall_back(ctx, container, record, container_dir, acquired.bytes).await
        }
        Err(e) => {
            warn!(
                record = %record.name,
                container = %container.name(),
                error = %e,
                "could not acquire metadata document, skipping record"
            );
            RecordOutcome::Dropped {
                record_name: record.name.clone(),
                reason: e.to_string(),
            }
        }
    };

    ctx.event_tx
        .send(Event::RecordFinished {
            container: container.name().to_string(),
            record: record.name.clone(),
            converted: outcome.ledger_row().map(|row| row.converted),
        })
        .ok();

    outcome
}

async fn convert_or_fall_back(
    ctx: &PipelineContext,
    container: &ContainerArchive,
    record: &RecordEntry,
    container_dir: &Path,
    original: Vec<u8>,
) -> RecordOutcome {
    let output_path = container_dir
        .join(&record.name)
        .join(&ctx.config.layout.metadata_file_name);

    let outcome = match convert(ctx, container, record, &original, &output_path).await {
        Ok(()) => {
            info!(record = %record.name, path = %output_path.display(), "record converted");
            RecordOutcome::Converted(ConversionOutcome {
                record_name: record.name.clone(),
                output_path,
                converted: true,
            })
        }
        Err(reason) => {
            warn!(
                record = %record.name,
                container = %container.name(),
                error = %reason,
                "conversion failed, writing original document"
            );
            if let Err(e) = write_output(&output_path, &original).await {
                error!(
                    record = %record.name,
                    path = %output_path.display(),
                    error = %e,
                    "failed to write original document"
                );
            }
            RecordOutcome::FellBack {
                outcome: ConversionOutcome {
                    record_name: record.name.clone(),
                    output_path,
                    converted: false,
                },
                reason: reason.to_string(),
            }
        }
    };

    if let Some(row) = outcome.ledger_row()
        && let Err(e) = ctx.ledger.append(row).await
    {
        error!(record = %record.name, error = %e, "failed to append ledger row");
    }

    outcome
}

/// Parse, inline, format, and write; any error leaves the fallback to the caller
async fn convert(
    ctx: &PipelineContext,
    container: &ContainerArchive,
    record: &RecordEntry,
    original: &[u8],
    output_path: &Path,
) -> Result<()> {
    let container = container.clone();
    let entry = record.entry.clone();
    let inline_config = ctx.config.inline.clone();
    let bytes = original.to_vec();
    let label = PathBuf::from(format!("{}!{}", container.path().display(), entry));

    let xml = run_blocking(label.clone(), move || {
        let mut document = MetadataDocument::parse(&bytes)?;
        let mut archive = RecordArchive::from_bytes(label, container.read_entry(&entry)?)?;
        let report = inline_managed_datastreams(&mut document, &mut archive, &inline_config)?;
        debug!(
            datastreams = report.inlined.len(),
            versions = report.versions,
            "document rewritten"
        );
        document.to_xml_string()
    })
    .await?;

    let formatted = ctx.formatter.format(xml).await?;
    write_output(output_path, formatted.as_bytes()).await
}

async fn write_output(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}
