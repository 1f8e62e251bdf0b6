//! The batch jobs: each pairs a source with a destination for `run_batch`.

pub mod backfill;
pub mod download;
pub mod index;
pub mod upload;

pub use backfill::DescriptionBackfill;
pub use download::UrlDownload;
pub use index::StorageIndex;
pub use upload::LocalUpload;

use crate::{
    errors::SyncError,
    pacing::Pacer,
    reconciler::{run_batch, BatchSummary},
};

/// Backfills descriptions, then indexes new bucket objects.
///
/// New objects are indexed even when the backfill could not enumerate the
/// table; that backfill error is still returned once indexing is done.
pub async fn run_sync(
    backfill: &DescriptionBackfill,
    index: &StorageIndex,
    pacer: &mut Pacer,
) -> Result<BatchSummary, SyncError> {
    tracing::info!("Updating existing entries...");
    let backfilled = run_batch(backfill, pacer).await;
    if let Err(e) = &backfilled {
        tracing::error!(error = %e, "Backfill aborted, continuing with new files");
    }

    tracing::info!("Checking for new files...");
    let indexed = run_batch(index, pacer).await?;

    let mut summary = backfilled?;
    summary.merge(indexed);
    tracing::info!("Sync complete: {}", summary);
    Ok(summary)
}
