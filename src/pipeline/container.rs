//! Container dispatch: enumerate record archives and fan them out

use super::record::process_record;
use super::{PipelineContext, run_blocking};
use crate::archive::ContainerArchive;
use crate::error::Result;
use crate::types::{ContainerReport, Event};
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::info;

/// Dispatch every record of one container with at most `record_workers` in flight
///
/// An error return means the container could not be prepared or enumerated,
/// and none of its records were processed.
pub(crate) async fn dispatch_container(
    ctx: &PipelineContext,
    container: &ContainerArchive,
    output_dir: &Path,
    record_workers: usize,
) -> Result<ContainerReport> {
    ctx.event_tx
        .send(Event::ContainerStarted {
            container: container.name().to_string(),
        })
        .ok();

    let container_dir = output_dir.join(container.name());
    tokio::fs::create_dir_all(&container_dir).await?;

    let layout = ctx.config.layout.clone();
    let enumerated = container.clone();
    let entries = run_blocking(container.path().to_path_buf(), move || {
        enumerated.record_entries(&layout)
    })
    .await?;

    info!(
        container = %container.name(),
        records = entries.len(),
        workers = record_workers,
        "dispatching records"
    );

    let container_dir = container_dir.as_path();
    let records = stream::iter(entries)
        .map(move |entry| async move { process_record(ctx, container, &entry, container_dir).await })
        .buffer_unordered(record_workers.max(1))
        .collect::<Vec<_>>()
        .await;

    Ok(ContainerReport {
        container: container.name().to_string(),
        records,
    })
}
