//! Document acquisition: obtain a record's original metadata bytes

use super::{PipelineContext, run_blocking};
use crate::archive::{ContainerArchive, RecordArchive, RecordEntry, bag_identifier};
use crate::error::Result;
use std::path::PathBuf;
use tracing::debug;

/// Where a record's metadata document came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DocumentSource {
    /// Read straight from the container (the distinguished record)
    Container,
    /// Read from a bag produced by the bag generator
    Bag(PathBuf),
}

/// A metadata document as acquired, before any parsing
#[derive(Debug)]
pub(crate) struct AcquiredDocument {
    pub(crate) bytes: Vec<u8>,
    pub(crate) source: DocumentSource,
}

/// Obtain the original metadata bytes for `record`
///
/// The record named after its container carries its metadata inside the
/// container itself. Every other record is exported through the bag
/// generator first.
///
/// Any error here means there are no original bytes to fall back on; the
/// caller drops the record.
pub(crate) async fn acquire_document(
    ctx: &PipelineContext,
    container: &ContainerArchive,
    record: &RecordEntry,
) -> Result<AcquiredDocument> {
    let metadata_file = ctx.config.layout.metadata_file_name.clone();

    if record.name == container.name() {
        debug!(record = %record.name, "reading metadata from container");
        let container = container.clone();
        let record = record.clone();
        let bytes = run_blocking(container.path().to_path_buf(), move || {
            container.find_record_file(&metadata_file, &record)
        })
        .await?;
        return Ok(AcquiredDocument {
            bytes,
            source: DocumentSource::Container,
        });
    }

    let identifier = bag_identifier(&record.name)?;
    let bag_path = ctx.bag_generator.generate(&identifier).await?;
    debug!(record = %record.name, bag = %bag_path.display(), "bag generated");

    let open_path = bag_path.clone();
    let bytes = run_blocking(bag_path.clone(), move || {
        RecordArchive::open(&open_path)?.find_file_named(&metadata_file)
    })
    .await?;

    Ok(AcquiredDocument {
        bytes,
        source: DocumentSource::Bag(bag_path),
    })
}
